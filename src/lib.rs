//! # Landings Sync
//!
//! An incremental sync client for Alaska eLandings landing reports.
//!
//! Landings Sync talks to the eLandings report management SOAP service,
//! normalizes each report's XML into a nested JSON document, stores one
//! JSON file per report, and can mirror the stored reports into a flat
//! relational SQLite database for querying.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  eLandings  │──▶│ Sync Engine │──▶│ JSON store  │
//! │ SOAP (XML)  │   │ (watermark) │   │ 1 file/rpt  │
//! └─────────────┘   └─────────────┘   └──────┬──────┘
//!                                            │ mirror
//!                                            ▼
//!                                     ┌─────────────┐
//!                                     │   SQLite    │
//!                                     │ flat tables │
//!                                     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! landings sync                 # incremental sync (last watermark)
//! landings sync --full          # re-fetch everything
//! landings get 304327           # print a stored report
//! landings init                 # create the mirror database
//! landings mirror               # load stored reports into SQLite
//! landings reports --species 710
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`document`] | Nested document model |
//! | [`normalize`] | XML to document conversion |
//! | [`client`] | eLandings SOAP client |
//! | [`sync`] | Incremental sync engine |
//! | [`state`] | Sync watermark persistence |
//! | [`store`] | JSON file report store |
//! | [`flatten`] | Document to relational rows |
//! | [`mirror`] | SQLite mirror loader |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod client;
pub mod config;
pub mod db;
pub mod document;
pub mod flatten;
pub mod get;
pub mod migrate;
pub mod mirror;
pub mod normalize;
pub mod progress;
pub mod reports;
pub mod state;
pub mod store;
pub mod sync;
