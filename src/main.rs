//! # Landings Sync CLI (`landings`)
//!
//! The `landings` binary is the primary interface for Landings Sync. It
//! provides commands for syncing landing reports from the eLandings SOAP
//! service, inspecting stored reports, and mirroring them into SQLite.
//!
//! ## Usage
//!
//! ```bash
//! landings --config ./config/landings.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `landings sync` | Fetch new or modified landing reports |
//! | `landings get <id>` | Print a stored landing report |
//! | `landings init` | Create the SQLite mirror database |
//! | `landings mirror` | Load stored reports into the mirror |
//! | `landings reports` | List mirrored reports with filters |
//! | `landings operations` | Show operations visible to the account |
//!
//! ## Examples
//!
//! ```bash
//! # Incremental sync from the saved watermark
//! landings sync --config ./config/landings.toml
//!
//! # Re-fetch everything, including reports already on disk
//! landings sync --full --fetch-existing
//!
//! # Sync one operation's reports modified since a date
//! landings sync --operation 3347 --since 2017-01-01
//!
//! # Mirror and browse
//! landings init && landings mirror
//! landings reports --vessel 55921 --limit 20
//! ```

mod client;
mod config;
mod db;
mod document;
mod flatten;
mod get;
mod migrate;
mod mirror;
mod normalize;
mod progress;
mod reports;
mod state;
mod store;
mod sync;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::client::ElandingsClient;
use crate::state::SyncStateStore;
use crate::store::ReportStore;
use crate::sync::{SyncEngine, SyncOptions};

/// Landings Sync CLI — an incremental sync client for Alaska eLandings
/// landing reports.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/landings.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "landings",
    about = "Landings Sync — incremental sync client for Alaska eLandings landing reports",
    version,
    long_about = "Landings Sync fetches landing reports from the eLandings report management \
    SOAP service, normalizes each report's XML into a nested JSON document stored one file per \
    report, and can mirror the stored reports into a flat relational SQLite database."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/landings.toml`. Service credentials, the
    /// report storage directory, and the mirror database path are read
    /// from this file. Credentials may also come from the
    /// `ELANDINGS_USER` / `ELANDINGS_PASSWORD` environment variables.
    #[arg(long, global = true, default_value = "./config/landings.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch new or modified landing reports.
    ///
    /// Searches the service for reports modified since the saved
    /// watermark (or `--since`), fetches each one, and writes it to the
    /// report directory as `landing_report_<id>.json`. The watermark and
    /// the set of synced report IDs are kept in `.sync_state.json`
    /// alongside the reports. A JSON summary of the run is printed to
    /// stdout.
    Sync {
        /// Only fetch reports modified on or after this date (YYYY-MM-DD).
        /// Overrides the saved watermark.
        #[arg(long)]
        since: Option<String>,

        /// Restrict the search to a single operation ID.
        #[arg(long)]
        operation: Option<String>,

        /// Ignore the saved watermark — search with no date filter.
        #[arg(long)]
        full: bool,

        /// Re-fetch reports that already exist on disk.
        #[arg(long)]
        fetch_existing: bool,

        /// Write reports to this directory instead of the configured one.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress reporting: `off`, `human`, or `json`.
        /// Defaults to `human` when stderr is a terminal, `off` otherwise.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print a stored landing report.
    ///
    /// Prints a short header (vessel, port, landing date) followed by
    /// the full report document as pretty JSON.
    Get {
        /// Landing report ID.
        id: String,
    },

    /// Initialize the mirror database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (landing_reports, landing_report_items, landing_report_stat_areas,
    /// sync_state). This command is idempotent — running it multiple
    /// times is safe.
    Init,

    /// Load stored reports into the SQLite mirror.
    ///
    /// Walks every `landing_report_<id>.json` file in the report
    /// directory, flattens it into relational rows, and upserts them.
    /// Child rows (line items, stat areas) are replaced on each run.
    Mirror,

    /// List mirrored reports.
    ///
    /// Queries the SQLite mirror and prints a table of reports, newest
    /// landing date first.
    Reports {
        /// Only show reports for this vessel ADF&G number.
        #[arg(long)]
        vessel: Option<String>,

        /// Only show reports containing this species code.
        #[arg(long)]
        species: Option<String>,

        /// Maximum number of reports to list.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Show the operations visible to the configured account.
    ///
    /// Calls the service's getOperations method and prints the result
    /// as JSON. Useful for finding operation IDs to pass to
    /// `sync --operation`.
    Operations,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync {
            since,
            operation,
            full,
            fetch_existing,
            output,
            progress,
        } => {
            let since = since
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()
                .context("--since must be a date in YYYY-MM-DD format")?;
            let reports_dir = output.unwrap_or_else(|| cfg.storage.reports_dir.clone());
            let mode = match progress {
                Some(ref value) => progress::ProgressMode::parse(value)?,
                None => progress::ProgressMode::default_for_tty(),
            };
            let reporter = mode.reporter();

            let client = ElandingsClient::new(&cfg.service)?;
            let engine = SyncEngine::new(&client, &reports_dir);
            let options = SyncOptions {
                since,
                operation_id: operation.unwrap_or_default(),
                full_refresh: full,
                skip_existing: !fetch_existing,
            };
            let outcome = engine.sync(&options, reporter.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Get { id } => {
            let store = ReportStore::new(&cfg.storage.reports_dir);
            get::run_get(&store, &id)?;
        }
        Commands::Init => {
            let pool = db::connect(&cfg.mirror.db_path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Mirror database initialized successfully.");
        }
        Commands::Mirror => {
            let pool = db::connect(&cfg.mirror.db_path).await?;
            let store = ReportStore::new(&cfg.storage.reports_dir);
            let state_store = SyncStateStore::new(&cfg.storage.reports_dir);
            mirror::run_mirror(&pool, &store, &state_store).await?;
            pool.close().await;
        }
        Commands::Reports {
            vessel,
            species,
            limit,
        } => {
            let pool = db::connect(&cfg.mirror.db_path).await?;
            reports::run_reports(&pool, vessel, species, limit).await?;
            pool.close().await;
        }
        Commands::Operations => {
            let client = ElandingsClient::new(&cfg.service)?;
            match client.get_operations().await? {
                Some(xml) => {
                    let doc = normalize::parse_document(&xml)?;
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
                None => println!("No operations returned."),
            }
        }
    }

    Ok(())
}
