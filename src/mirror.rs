//! Relational mirror of the document store.
//!
//! `landings mirror` walks every stored report and projects it into
//! SQLite: one `landing_reports` row (flat columns + the full document
//! as `raw_json`) and replaced child rows in `landing_report_items` and
//! `landing_report_stat_areas`. Children are always deleted and
//! re-inserted rather than patched — the simplest way to guarantee the
//! mirror never keeps stale rows when a report's item count shrinks.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::document::Node;
use crate::flatten::{flatten_report, line_items, stat_areas};
use crate::migrate;
use crate::state::SyncStateStore;
use crate::store::ReportStore;

/// Project the whole document store into the mirror database.
///
/// Per-report projection failures are reported and skipped, mirroring
/// the sync engine's soft-failure discipline.
pub async fn run_mirror(
    pool: &SqlitePool,
    store: &ReportStore,
    state_store: &SyncStateStore,
) -> Result<()> {
    migrate::run_migrations(pool).await?;

    let ids = store.list_ids()?;
    let mut mirrored = 0u64;
    let mut failed = 0u64;

    for id in &ids {
        let document = match store.load(id) {
            Ok(Some(doc)) => doc,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Warning: failed to load report {}: {}", id, e);
                failed += 1;
                continue;
            }
        };
        match mirror_report(pool, &document).await {
            Ok(()) => mirrored += 1,
            Err(e) => {
                eprintln!("Warning: failed to mirror report {}: {}", id, e);
                failed += 1;
            }
        }
    }

    // Copy the file-based watermark so database-only consumers see it.
    let state = state_store.load()?;
    sqlx::query(
        r#"
        INSERT INTO sync_state (id, last_sync) VALUES (1, ?)
        ON CONFLICT(id) DO UPDATE SET last_sync = excluded.last_sync
        "#,
    )
    .bind(&state.last_sync)
    .execute(pool)
    .await?;

    println!("mirror");
    println!("  reports mirrored: {}", mirrored);
    println!("  failed: {}", failed);
    println!("ok");
    Ok(())
}

/// Upsert one report and replace its child rows, in a single transaction.
pub async fn mirror_report(pool: &SqlitePool, document: &Node) -> Result<()> {
    let row = flatten_report(document)?;
    let items = line_items(document);
    let areas = stat_areas(document);
    let raw_json =
        serde_json::to_string(document).context("failed to serialize report document")?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO landing_reports (
            id, report_type, report_type_name, status, status_desc,
            vessel_adfg_number, vessel_name, port_code, port_name,
            gear_code, gear_name, date_of_landing, date_fishing_began,
            crew_size, processor_code, processor_name, fish_ticket_number,
            data_entry_user, data_entry_date, last_change_user,
            last_change_date, raw_json
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            report_type = excluded.report_type,
            report_type_name = excluded.report_type_name,
            status = excluded.status,
            status_desc = excluded.status_desc,
            vessel_adfg_number = excluded.vessel_adfg_number,
            vessel_name = excluded.vessel_name,
            port_code = excluded.port_code,
            port_name = excluded.port_name,
            gear_code = excluded.gear_code,
            gear_name = excluded.gear_name,
            date_of_landing = excluded.date_of_landing,
            date_fishing_began = excluded.date_fishing_began,
            crew_size = excluded.crew_size,
            processor_code = excluded.processor_code,
            processor_name = excluded.processor_name,
            fish_ticket_number = excluded.fish_ticket_number,
            data_entry_user = excluded.data_entry_user,
            data_entry_date = excluded.data_entry_date,
            last_change_user = excluded.last_change_user,
            last_change_date = excluded.last_change_date,
            raw_json = excluded.raw_json
        "#,
    )
    .bind(row.id)
    .bind(&row.report_type)
    .bind(&row.report_type_name)
    .bind(&row.status)
    .bind(&row.status_desc)
    .bind(&row.vessel_adfg_number)
    .bind(&row.vessel_name)
    .bind(&row.port_code)
    .bind(&row.port_name)
    .bind(&row.gear_code)
    .bind(&row.gear_name)
    .bind(&row.date_of_landing)
    .bind(&row.date_fishing_began)
    .bind(row.crew_size)
    .bind(&row.processor_code)
    .bind(&row.processor_name)
    .bind(&row.fish_ticket_number)
    .bind(&row.data_entry_user)
    .bind(&row.data_entry_date)
    .bind(&row.last_change_user)
    .bind(&row.last_change_date)
    .bind(&raw_json)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM landing_report_items WHERE landing_report_id = ?")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM landing_report_stat_areas WHERE landing_report_id = ?")
        .bind(row.id)
        .execute(&mut *tx)
        .await?;

    for item in &items {
        sqlx::query(
            r#"
            INSERT INTO landing_report_items (
                landing_report_id, item_number, species_code, species_name,
                weight, condition_code, condition_name, disposition_code,
                disposition_name, fish_ticket_number
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.landing_report_id)
        .bind(item.item_number)
        .bind(&item.species_code)
        .bind(&item.species_name)
        .bind(item.weight)
        .bind(&item.condition_code)
        .bind(&item.condition_name)
        .bind(&item.disposition_code)
        .bind(&item.disposition_name)
        .bind(&item.fish_ticket_number)
        .execute(&mut *tx)
        .await?;
    }

    for area in &areas {
        sqlx::query(
            r#"
            INSERT INTO landing_report_stat_areas (
                landing_report_id, item_number, stat_area, fed_area,
                iphc_area, percent
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(area.landing_report_id)
        .bind(area.item_number)
        .bind(&area.stat_area)
        .bind(&area.fed_area)
        .bind(&area.iphc_area)
        .bind(area.percent)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
