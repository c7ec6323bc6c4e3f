//! Document store: one JSON file per landing report.
//!
//! Reports are keyed by their id and named `landing_report_<id>.json`
//! inside a single flat directory. Saving is a full overwrite, so
//! re-fetching an already stored report is always safe.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::document::Node;

const FILE_PREFIX: &str = "landing_report_";
const FILE_SUFFIX: &str = ".json";

/// File-backed store of normalized landing report documents.
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn report_path(&self, report_id: &str) -> PathBuf {
        self.root
            .join(format!("{}{}{}", FILE_PREFIX, report_id, FILE_SUFFIX))
    }

    /// Whether a report with this id has been stored.
    pub fn exists(&self, report_id: &str) -> bool {
        self.report_path(report_id).exists()
    }

    /// Persist a report document, deriving the file name from the
    /// document's own `landing_report_id` (decorated ids are unwrapped).
    /// Creates the store directory on first use. Returns the destination
    /// path.
    pub fn save(&self, document: &Node) -> Result<PathBuf> {
        let report_id = match document.report_id() {
            Some(id) => id,
            None => bail!("document has no landing_report_id"),
        };

        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create report store: {}", self.root.display()))?;

        let path = self.report_path(&report_id);
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        Ok(path)
    }

    /// Load a stored report, `None` if it was never synced.
    pub fn load(&self, report_id: &str) -> Result<Option<Node>> {
        let path = self.report_path(report_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read report: {}", path.display()))?;
        let document = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report: {}", path.display()))?;
        Ok(Some(document))
    }

    /// Ids of every stored report, from a directory scan.
    pub fn list_ids(&self) -> Result<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        if !self.root.exists() {
            return Ok(ids);
        }
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to scan report store: {}", self.root.display()))?
        {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|s| s.strip_suffix(FILE_SUFFIX))
            {
                ids.insert(stem.to_string());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::parse_document;
    use tempfile::TempDir;

    fn sample_report(id: &str) -> Node {
        parse_document(&format!(
            "<landing_report><landing_report_id>{}</landing_report_id><status>05</status></landing_report>",
            id
        ))
        .unwrap()
    }

    #[test]
    fn save_derives_filename_from_id_and_creates_dir() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(&tmp.path().join("reports"));

        let path = store.save(&sample_report("304327")).unwrap();
        assert!(path.ends_with("landing_report_304327.json"));
        assert!(store.exists("304327"));
        assert!(!store.exists("304328"));
    }

    #[test]
    fn save_unwraps_decorated_id() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(tmp.path());

        let doc = parse_document(
            r#"<landing_report><landing_report_id seq="1">88</landing_report_id></landing_report>"#,
        )
        .unwrap();
        let path = store.save(&doc).unwrap();
        assert!(path.ends_with("landing_report_88.json"));
    }

    #[test]
    fn save_without_id_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(tmp.path());
        let doc = parse_document("<landing_report><status>05</status></landing_report>").unwrap();
        assert!(store.save(&doc).is_err());
    }

    #[test]
    fn saving_twice_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(tmp.path());
        let doc = sample_report("42");

        store.save(&doc).unwrap();
        let first = store.load("42").unwrap().unwrap();
        store.save(&doc).unwrap();
        let second = store.load("42").unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn list_ids_scans_report_files_only() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(tmp.path());
        store.save(&sample_report("2")).unwrap();
        store.save(&sample_report("10")).unwrap();
        // State file and strangers are ignored.
        std::fs::write(tmp.path().join(".sync_state.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let ids = store.list_ids().unwrap();
        assert_eq!(ids, ["2", "10"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn load_missing_is_none_and_empty_store_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = ReportStore::new(&tmp.path().join("never_created"));
        assert!(store.load("1").unwrap().is_none());
        assert!(store.list_ids().unwrap().is_empty());
    }
}
