//! The sync engine.
//!
//! One run is a single pass through a fixed sequence:
//!
//! ```text
//! ComputeWatermark → Search → Reconcile → FetchLoop → Finalize
//! ```
//!
//! The watermark ("modified since" boundary) resolves in strict priority
//! order: full refresh (unbounded) beats an explicit `--since` date,
//! which beats the persisted `last_sync`, which beats the first-run
//! default of thirty days back. Search failures are fatal and leave the
//! sync state untouched; everything after a successful search is a soft
//! per-record failure that is recorded and skipped over, so one bad
//! report never blocks the rest of a batch.
//!
//! On Finalize the new watermark is the run's **start** time, not its
//! end time. A record modified while the run was executing would be
//! missed by an end-time watermark; with a start-time watermark it is
//! re-seen next run instead, and re-fetching is harmless because storage
//! is an idempotent overwrite.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::client::{ReportService, SearchFilters};
use crate::normalize::{parse_document, parse_summaries};
use crate::progress::{SyncAction, SyncProgressReporter};
use crate::state::{SyncState, SyncStateStore};
use crate::store::ReportStore;

/// First-run lookback window when no watermark exists yet.
const DEFAULT_LOOKBACK_DAYS: i64 = 30;

/// Timestamp format used for the watermark and the outcome's
/// `sync_date`, matching the state files the sync has always written.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Caller-tunable knobs for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Explicit "modified since" date; overrides the persisted watermark.
    pub since: Option<NaiveDate>,
    /// Restrict the search to one operation (fishing business).
    pub operation_id: String,
    /// Ignore every watermark and pull all reports.
    pub full_refresh: bool,
    /// Skip reports already present in the document store.
    pub skip_existing: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            since: None,
            operation_id: String::new(),
            full_refresh: false,
            skip_existing: true,
        }
    }
}

/// One successfully stored report.
#[derive(Debug, Clone, Serialize)]
pub struct SyncedReport {
    pub report_id: String,
    pub file: String,
}

/// One soft per-record failure.
#[derive(Debug, Clone, Serialize)]
pub struct SyncError {
    pub report_id: String,
    pub error: String,
}

/// Structured result of one sync run. Printed as JSON by the CLI;
/// never persisted by the engine itself.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub sync_date: String,
    pub date_filter: String,
    pub reports_found: usize,
    pub reports_synced: usize,
    pub reports_skipped: usize,
    pub reports_failed: usize,
    pub synced: Vec<SyncedReport>,
    pub errors: Vec<SyncError>,
}

impl SyncOutcome {
    fn empty(sync_date: String, date_filter: String) -> Self {
        Self {
            sync_date,
            date_filter,
            reports_found: 0,
            reports_synced: 0,
            reports_skipped: 0,
            reports_failed: 0,
            synced: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Orchestrates search, reconciliation, fetch, and state advancement.
///
/// Owns the document and state stores rooted at one reports directory;
/// the remote service comes in as a trait object so runs are testable
/// without a network. Strictly sequential: one call in flight at a time.
pub struct SyncEngine<'a> {
    service: &'a dyn ReportService,
    store: ReportStore,
    state_store: SyncStateStore,
}

impl<'a> SyncEngine<'a> {
    pub fn new(service: &'a dyn ReportService, reports_dir: &Path) -> Self {
        Self {
            service,
            store: ReportStore::new(reports_dir),
            state_store: SyncStateStore::new(reports_dir),
        }
    }

    /// Run one sync pass.
    ///
    /// Fatal errors (transport failure, malformed search response, and —
    /// by decision — a failed state save at the end) propagate; anything
    /// that goes wrong with an individual report lands in the outcome's
    /// `errors` list instead.
    pub async fn sync(
        &self,
        options: &SyncOptions,
        progress: &dyn SyncProgressReporter,
    ) -> Result<SyncOutcome> {
        let state = self.state_store.load()?;
        let sync_start = Local::now().naive_local();
        let date_filter = resolve_date_filter(options, &state, sync_start);
        let sync_date = sync_start.format(TIMESTAMP_FORMAT).to_string();

        let filters = SearchFilters {
            operation_id: options.operation_id.clone(),
            date_modified_start: date_filter.clone(),
            ..Default::default()
        };
        let response = self
            .service
            .find_landing_reports(&filters)
            .await
            .context("landing report search failed")?;

        let Some(response_xml) = response else {
            // Hard stop: no response is not "zero results". The watermark
            // stays where it was so nothing is lost.
            eprintln!("No response from server; sync state left untouched");
            return Ok(SyncOutcome::empty(sync_date, date_filter));
        };

        let summaries =
            parse_summaries(&response_xml).context("failed to parse search response")?;
        let total = summaries.len();

        let existing = if options.skip_existing {
            self.store.list_ids()?
        } else {
            BTreeSet::new()
        };

        let mut synced: Vec<SyncedReport> = Vec::new();
        let mut errors: Vec<SyncError> = Vec::new();
        let mut skipped = 0usize;

        for (index, summary) in summaries.iter().enumerate() {
            let current = index + 1;
            let report_id = summary.report_id().unwrap_or_default();

            if options.skip_existing && !report_id.is_empty() && existing.contains(&report_id) {
                skipped += 1;
                progress.report(current, total, &report_id, SyncAction::Skipped);
                continue;
            }

            progress.report(current, total, &report_id, SyncAction::Fetching);

            match self.fetch_and_store(&report_id).await {
                Ok(path) => synced.push(SyncedReport {
                    report_id,
                    file: path.display().to_string(),
                }),
                Err(e) => errors.push(SyncError {
                    report_id,
                    error: e.to_string(),
                }),
            }
        }

        // Finalize: advance the watermark to the run's start time and
        // union in the newly synced ids.
        let mut new_state = state;
        new_state.last_sync = Some(sync_date.clone());
        new_state
            .synced_reports
            .extend(synced.iter().map(|s| s.report_id.clone()));
        self.state_store
            .save(&new_state)
            .context("sync completed but saving sync state failed")?;

        Ok(SyncOutcome {
            sync_date,
            date_filter,
            reports_found: total,
            reports_synced: synced.len(),
            reports_skipped: skipped,
            reports_failed: errors.len(),
            synced,
            errors,
        })
    }

    async fn fetch_and_store(&self, report_id: &str) -> Result<PathBuf> {
        if report_id.is_empty() {
            bail!("summary has no landing_report_id");
        }
        let Some(xml) = self.service.get_landing_report(report_id).await? else {
            bail!("Empty response");
        };
        let document = parse_document(&xml)?;
        self.store.save(&document)
    }
}

/// Resolve the effective "modified since" boundary.
///
/// Priority is a hard contract: full refresh first (short-circuits the
/// rest, yielding the unbounded empty boundary), then an explicit
/// caller-supplied date, then the persisted watermark, then the
/// first-run default of `now - 30 days`.
pub fn resolve_date_filter(
    options: &SyncOptions,
    state: &SyncState,
    now: NaiveDateTime,
) -> String {
    if options.full_refresh {
        return String::new();
    }
    if let Some(since) = options.since {
        return format!("{}T00:00:00", since.format("%Y-%m-%d"));
    }
    if let Some(last_sync) = &state.last_sync {
        return last_sync.clone();
    }
    (now - Duration::days(DEFAULT_LOOKBACK_DAYS))
        .format("%Y-%m-%dT00:00:00")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Service double with a canned search response and per-id fetch
    /// behavior; records every call it receives.
    struct ScriptedService {
        search_response: Option<String>,
        reports: HashMap<String, String>,
        failing_ids: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(search_ids: &[&str]) -> Self {
            let mut reports = HashMap::new();
            for id in search_ids {
                reports.insert(id.to_string(), report_xml(id));
            }
            Self {
                search_response: Some(summaries_xml(search_ids)),
                reports,
                failing_ids: HashSet::new(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn no_response() -> Self {
            Self {
                search_response: None,
                reports: HashMap::new(),
                failing_ids: HashSet::new(),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn fetched_ids(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReportService for ScriptedService {
        async fn find_landing_reports(
            &self,
            _filters: &SearchFilters,
        ) -> Result<Option<String>> {
            Ok(self.search_response.clone())
        }

        async fn get_landing_report(&self, report_id: &str) -> Result<Option<String>> {
            self.fetched.lock().unwrap().push(report_id.to_string());
            if self.failing_ids.contains(report_id) {
                bail!("connection reset by peer");
            }
            Ok(self.reports.get(report_id).cloned())
        }
    }

    /// Records every progress callback for assertion.
    struct RecordingProgress {
        events: Mutex<Vec<(usize, usize, String, SyncAction)>>,
    }

    impl RecordingProgress {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl SyncProgressReporter for RecordingProgress {
        fn report(&self, current: usize, total: usize, report_id: &str, action: SyncAction) {
            self.events
                .lock()
                .unwrap()
                .push((current, total, report_id.to_string(), action));
        }
    }

    fn summaries_xml(ids: &[&str]) -> String {
        let mut body = String::from("<report_search_result>");
        for id in ids {
            body.push_str(&format!(
                "<landing_report_summary><landing_report_id>{}</landing_report_id></landing_report_summary>",
                id
            ));
        }
        body.push_str("</report_search_result>");
        body
    }

    fn report_xml(id: &str) -> String {
        format!(
            "<landing_report><landing_report_id>{}</landing_report_id><status>05</status></landing_report>",
            id
        )
    }

    fn seed_store(dir: &Path, ids: &[&str]) {
        let store = ReportStore::new(dir);
        for id in ids {
            store.save(&parse_document(&report_xml(id)).unwrap()).unwrap();
        }
    }

    fn state(last_sync: Option<&str>) -> SyncState {
        SyncState {
            last_sync: last_sync.map(str::to_string),
            synced_reports: BTreeSet::new(),
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn full_refresh_overrides_everything() {
        let options = SyncOptions {
            full_refresh: true,
            since: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            ..Default::default()
        };
        let filter = resolve_date_filter(&options, &state(Some("2026-06-01T00:00:00")), noon());
        assert_eq!(filter, "");
    }

    #[test]
    fn explicit_since_beats_persisted_watermark() {
        let options = SyncOptions {
            since: Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            ..Default::default()
        };
        let filter = resolve_date_filter(&options, &state(Some("2026-06-01T00:00:00")), noon());
        assert_eq!(filter, "2026-01-01T00:00:00");
    }

    #[test]
    fn persisted_watermark_is_used_when_no_override() {
        let options = SyncOptions::default();
        let filter = resolve_date_filter(&options, &state(Some("2026-06-01T09:15:00")), noon());
        assert_eq!(filter, "2026-06-01T09:15:00");
    }

    #[test]
    fn first_run_defaults_to_thirty_days_back() {
        let filter = resolve_date_filter(&SyncOptions::default(), &state(None), noon());
        assert_eq!(filter, "2026-07-31T00:00:00");
    }

    #[tokio::test]
    async fn reconciliation_fetches_only_missing_reports() {
        let tmp = TempDir::new().unwrap();
        seed_store(tmp.path(), &["1", "2", "3"]);

        let service = ScriptedService::new(&["2", "3", "4", "5"]);
        let engine = SyncEngine::new(&service, tmp.path());
        let progress = RecordingProgress::new();

        let outcome = engine
            .sync(&SyncOptions::default(), &progress)
            .await
            .unwrap();

        assert_eq!(service.fetched_ids(), vec!["4", "5"]);
        assert_eq!(outcome.reports_found, 4);
        assert_eq!(outcome.reports_synced, 2);
        assert_eq!(outcome.reports_skipped, 2);
        assert_eq!(outcome.reports_failed, 0);
        assert!(ReportStore::new(tmp.path()).exists("4"));
        assert!(ReportStore::new(tmp.path()).exists("5"));

        let events = progress.events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], (1, 4, "2".to_string(), SyncAction::Skipped));
        assert_eq!(events[1], (2, 4, "3".to_string(), SyncAction::Skipped));
        assert_eq!(events[2], (3, 4, "4".to_string(), SyncAction::Fetching));
        assert_eq!(events[3], (4, 4, "5".to_string(), SyncAction::Fetching));
    }

    #[tokio::test]
    async fn per_record_failures_do_not_block_the_run() {
        let tmp = TempDir::new().unwrap();
        let mut service = ScriptedService::new(&["4", "5"]);
        service.failing_ids.insert("4".to_string());

        let engine = SyncEngine::new(&service, tmp.path());
        let outcome = engine
            .sync(&SyncOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(outcome.reports_synced, 1);
        assert_eq!(outcome.reports_failed, 1);
        assert_eq!(outcome.synced[0].report_id, "5");
        assert_eq!(outcome.errors[0].report_id, "4");
        assert!(outcome.errors[0].error.contains("connection reset"));

        // Finalize still ran: the watermark advanced and id 5 is recorded.
        let saved = SyncStateStore::new(tmp.path()).load().unwrap();
        assert_eq!(saved.last_sync.as_deref(), Some(outcome.sync_date.as_str()));
        assert!(saved.synced_reports.contains("5"));
        assert!(!saved.synced_reports.contains("4"));
    }

    #[tokio::test]
    async fn empty_fetch_response_is_a_soft_failure() {
        let tmp = TempDir::new().unwrap();
        let mut service = ScriptedService::new(&["6", "7"]);
        service.reports.remove("6");

        let engine = SyncEngine::new(&service, tmp.path());
        let outcome = engine
            .sync(&SyncOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(outcome.reports_synced, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].report_id, "6");
        assert_eq!(outcome.errors[0].error, "Empty response");
    }

    #[tokio::test]
    async fn empty_search_response_leaves_state_untouched() {
        let tmp = TempDir::new().unwrap();
        let state_store = SyncStateStore::new(tmp.path());
        let mut prior = SyncState::default();
        prior.last_sync = Some("2026-06-01T00:00:00".to_string());
        prior.synced_reports.insert("9".to_string());
        state_store.save(&prior).unwrap();

        let service = ScriptedService::no_response();
        let engine = SyncEngine::new(&service, tmp.path());
        let outcome = engine
            .sync(&SyncOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(outcome.reports_found, 0);
        assert_eq!(outcome.reports_synced, 0);
        assert!(service.fetched_ids().is_empty());
        assert_eq!(state_store.load().unwrap(), prior);
    }

    #[tokio::test]
    async fn malformed_search_response_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut service = ScriptedService::new(&[]);
        service.search_response = Some("<broken <".to_string());

        let engine = SyncEngine::new(&service, tmp.path());
        assert!(engine.sync(&SyncOptions::default(), &NoProgress).await.is_err());
        // Fatal before Finalize: no state file was created.
        assert_eq!(SyncStateStore::new(tmp.path()).load().unwrap(), SyncState::default());
    }

    #[tokio::test]
    async fn watermark_is_run_start_and_id_set_only_grows() {
        let tmp = TempDir::new().unwrap();
        let state_store = SyncStateStore::new(tmp.path());
        let mut prior = SyncState::default();
        prior.synced_reports.insert("9".to_string());
        state_store.save(&prior).unwrap();

        let service = ScriptedService::new(&["10"]);
        let engine = SyncEngine::new(&service, tmp.path());
        let before = Local::now().naive_local();
        let outcome = engine
            .sync(&SyncOptions::default(), &NoProgress)
            .await
            .unwrap();
        let after = Local::now().naive_local();

        let saved = state_store.load().unwrap();
        let watermark =
            NaiveDateTime::parse_from_str(saved.last_sync.as_deref().unwrap(), TIMESTAMP_FORMAT)
                .unwrap();
        // Run start, to second precision, bounded by the test's own clock.
        assert!(watermark >= before - Duration::seconds(1));
        assert!(watermark <= after);
        assert_eq!(saved.last_sync.as_deref(), Some(outcome.sync_date.as_str()));
        assert!(saved.synced_reports.contains("9"));
        assert!(saved.synced_reports.contains("10"));
    }

    #[tokio::test]
    async fn duplicate_ids_in_one_response_are_fetched_twice() {
        let tmp = TempDir::new().unwrap();
        let service = ScriptedService::new(&["7", "7"]);
        let engine = SyncEngine::new(&service, tmp.path());

        let outcome = engine
            .sync(&SyncOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(service.fetched_ids(), vec!["7", "7"]);
        assert_eq!(outcome.reports_found, 2);
        assert_eq!(outcome.reports_synced, 2);
    }

    #[tokio::test]
    async fn fetch_existing_mode_refetches_stored_reports() {
        let tmp = TempDir::new().unwrap();
        seed_store(tmp.path(), &["2"]);

        let service = ScriptedService::new(&["2"]);
        let engine = SyncEngine::new(&service, tmp.path());
        let options = SyncOptions {
            skip_existing: false,
            ..Default::default()
        };

        let outcome = engine.sync(&options, &NoProgress).await.unwrap();
        assert_eq!(service.fetched_ids(), vec!["2"]);
        assert_eq!(outcome.reports_skipped, 0);
        assert_eq!(outcome.reports_synced, 1);
    }

    #[tokio::test]
    async fn stub_without_id_is_recorded_as_error() {
        let tmp = TempDir::new().unwrap();
        let mut service = ScriptedService::new(&[]);
        service.search_response = Some(
            "<r><landing_report_summary><status>05</status></landing_report_summary></r>"
                .to_string(),
        );

        let engine = SyncEngine::new(&service, tmp.path());
        let outcome = engine
            .sync(&SyncOptions::default(), &NoProgress)
            .await
            .unwrap();

        assert_eq!(outcome.reports_found, 1);
        assert_eq!(outcome.reports_failed, 1);
        assert!(service.fetched_ids().is_empty());
    }
}
