//! Sync progress reporting.
//!
//! Reports per-record progress during `landings sync` so users see which
//! report is being fetched and how much is left. Progress is emitted on
//! **stderr** so stdout stays parseable (the sync outcome is printed
//! there as JSON).
//!
//! The reporter is a side channel only: the engine calls it after every
//! record and never depends on it for correctness.

use std::io::Write;

/// What the engine did with one search stub.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SyncAction {
    /// Full report is being fetched from the service.
    Fetching,
    /// Report already stored locally; fetch skipped.
    Skipped,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Fetching => "fetching",
            SyncAction::Skipped => "skipped",
        }
    }
}

/// Receives per-record sync progress. Implementations write to stderr.
pub trait SyncProgressReporter: Send + Sync {
    /// Called once per search stub: 1-based index, total stub count,
    /// report id, and the action taken.
    fn report(&self, current: usize, total: usize, report_id: &str, action: SyncAction);
}

/// Human-friendly progress: "  [3/12] fetching 304327".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, current: usize, total: usize, report_id: &str, action: SyncAction) {
        let line = format!(
            "  [{}/{}] {} {}\n",
            current,
            total,
            action.as_str(),
            report_id
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, current: usize, total: usize, report_id: &str, action: SyncAction) {
        let obj = serde_json::json!({
            "event": "progress",
            "n": current,
            "total": total,
            "report_id": report_id,
            "action": action.as_str(),
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _current: usize, _total: usize, _report_id: &str, _action: SyncAction) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => anyhow::bail!(
                "Unknown progress mode: '{}'. Must be off, human, or json.",
                other
            ),
        }
    }

    /// Build a reporter for this mode. Caller passes it to the engine.
    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!(ProgressMode::parse("off").unwrap(), ProgressMode::Off);
        assert_eq!(ProgressMode::parse("human").unwrap(), ProgressMode::Human);
        assert_eq!(ProgressMode::parse("json").unwrap(), ProgressMode::Json);
        assert!(ProgressMode::parse("loud").is_err());
    }

    #[test]
    fn action_tags() {
        assert_eq!(SyncAction::Fetching.as_str(), "fetching");
        assert_eq!(SyncAction::Skipped.as_str(), "skipped");
    }
}
