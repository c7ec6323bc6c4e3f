use anyhow::Result;
use sqlx::SqlitePool;

/// Create the mirror schema. Idempotent; `landings init` runs this and
/// `landings mirror` runs it defensively before projecting.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Parent table: flat scalar columns for browsing plus the full
    // document for lossless re-reads.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS landing_reports (
            id INTEGER PRIMARY KEY,
            report_type TEXT NOT NULL DEFAULT '',
            report_type_name TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT '',
            status_desc TEXT NOT NULL DEFAULT '',
            vessel_adfg_number TEXT NOT NULL DEFAULT '',
            vessel_name TEXT NOT NULL DEFAULT '',
            port_code TEXT NOT NULL DEFAULT '',
            port_name TEXT NOT NULL DEFAULT '',
            gear_code TEXT NOT NULL DEFAULT '',
            gear_name TEXT NOT NULL DEFAULT '',
            date_of_landing TEXT,
            date_fishing_began TEXT,
            crew_size INTEGER,
            processor_code TEXT NOT NULL DEFAULT '',
            processor_name TEXT NOT NULL DEFAULT '',
            fish_ticket_number TEXT NOT NULL DEFAULT '',
            data_entry_user TEXT NOT NULL DEFAULT '',
            data_entry_date TEXT,
            last_change_user TEXT NOT NULL DEFAULT '',
            last_change_date TEXT,
            raw_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS landing_report_items (
            landing_report_id INTEGER NOT NULL,
            item_number INTEGER NOT NULL,
            species_code TEXT NOT NULL DEFAULT '',
            species_name TEXT NOT NULL DEFAULT '',
            weight REAL,
            condition_code TEXT NOT NULL DEFAULT '',
            condition_name TEXT NOT NULL DEFAULT '',
            disposition_code TEXT NOT NULL DEFAULT '',
            disposition_name TEXT NOT NULL DEFAULT '',
            fish_ticket_number TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (landing_report_id) REFERENCES landing_reports(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS landing_report_stat_areas (
            landing_report_id INTEGER NOT NULL,
            item_number INTEGER NOT NULL,
            stat_area TEXT NOT NULL DEFAULT '',
            fed_area TEXT NOT NULL DEFAULT '',
            iphc_area TEXT NOT NULL DEFAULT '',
            percent INTEGER,
            FOREIGN KEY (landing_report_id) REFERENCES landing_reports(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Single-row copy of the file-based sync state, for dashboards that
    // only see the database.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_sync TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_species ON landing_report_items(species_code)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_reports_vessel ON landing_reports(vessel_adfg_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
