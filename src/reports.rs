//! Browse the mirror: flat report listings with simple filters.
//!
//! Reads the SQLite mirror (run `landings mirror` first), not the JSON
//! store — filtering on flat columns is what the mirror is for.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

/// List reports, optionally filtered by vessel ADF&G number or species
/// code, newest landing date first.
pub async fn run_reports(
    pool: &SqlitePool,
    vessel: Option<String>,
    species: Option<String>,
    limit: i64,
) -> Result<()> {
    let rows = if let Some(species_code) = species {
        sqlx::query(
            r#"
            SELECT r.id, r.date_of_landing, r.vessel_name, r.port_name,
                   r.status_desc, r.fish_ticket_number
            FROM landing_reports r
            JOIN landing_report_items i ON i.landing_report_id = r.id
            WHERE i.species_code = ?
            GROUP BY r.id
            ORDER BY r.date_of_landing DESC
            LIMIT ?
            "#,
        )
        .bind(species_code)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else if let Some(adfg_number) = vessel {
        sqlx::query(
            r#"
            SELECT id, date_of_landing, vessel_name, port_name,
                   status_desc, fish_ticket_number
            FROM landing_reports
            WHERE vessel_adfg_number = ?
            ORDER BY date_of_landing DESC
            LIMIT ?
            "#,
        )
        .bind(adfg_number)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query(
            r#"
            SELECT id, date_of_landing, vessel_name, port_name,
                   status_desc, fish_ticket_number
            FROM landing_reports
            ORDER BY date_of_landing DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?
    };

    if rows.is_empty() {
        println!("No reports.");
        return Ok(());
    }

    println!(
        "{:>8}  {:<10}  {:<24}  {:<16}  {:<28}  {}",
        "id", "landed", "vessel", "port", "status", "fish ticket"
    );
    for row in &rows {
        let id: i64 = row.get("id");
        let landed: Option<String> = row.get("date_of_landing");
        let vessel_name: String = row.get("vessel_name");
        let port_name: String = row.get("port_name");
        let status_desc: String = row.get("status_desc");
        let fish_ticket: String = row.get("fish_ticket_number");
        println!(
            "{:>8}  {:<10}  {:<24}  {:<16}  {:<28}  {}",
            id,
            landed.unwrap_or_default(),
            vessel_name,
            port_name,
            status_desc,
            fish_ticket
        );
    }
    println!("{} report(s)", rows.len());
    Ok(())
}
