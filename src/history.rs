//! Submission history, kept as a pretty-printed JSON array on disk.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::assembler::MissingFragment;
use crate::error::HistoryError;

/// One generated proposal, as it was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub customer: String,
    pub project: String,
    /// Original file name of the uploaded logo.
    pub logo: Option<String>,
    /// Original file name of the uploaded topology diagram.
    pub topology: Option<String>,
    pub technologies: Vec<String>,
    pub models: Vec<String>,
    pub design_description: String,
    pub filename: String,
    #[serde(default)]
    pub missing: Vec<MissingFragment>,
}

/// Append-only store of [`SubmissionRecord`]s.
///
/// Every append reads the whole file and writes it back through a temporary
/// file in the same directory, so a crash mid-write leaves the old history
/// intact. Only one writer may use a file at a time.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        HistoryStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<SubmissionRecord>, HistoryError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Add `record` at the end of the history.
    ///
    /// # Returns
    /// * `Err(HistoryError::Json)` - The existing file is corrupt; it is left as is
    pub fn append(&self, record: SubmissionRecord) -> Result<(), HistoryError> {
        let mut records = self.load()?;
        records.push(record);
        let json = serde_json::to_string_pretty(&records)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        debug!("history {} now holds {} record(s)", self.path.display(), records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(customer: &str) -> SubmissionRecord {
        SubmissionRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            customer: customer.to_string(),
            project: "NetUpgrade".to_string(),
            logo: Some("logo.png".to_string()),
            topology: None,
            technologies: vec!["NGFW".to_string()],
            models: vec!["FG-601F".to_string()],
            design_description: "Two sites".to_string(),
            filename: format!("{customer}_NetUpgrade_Technical Proposal ver 1.0.docx"),
            missing: vec![],
        }
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("submissions.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn appends_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested").join("submissions.json"));
        store.append(record("Acme")).unwrap();
        store.append(record("Globex")).unwrap();

        let customers: Vec<String> = store.load().unwrap().into_iter().map(|r| r.customer).collect();
        assert_eq!(customers, vec!["Acme", "Globex"]);
    }

    #[test]
    fn corrupt_file_is_reported_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submissions.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = HistoryStore::new(&path);
        assert!(matches!(store.append(record("Acme")), Err(HistoryError::Json(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn records_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("submissions.json"));
        let mut original = record("Acme");
        original.missing.push(MissingFragment {
            id: "SASE".to_string(),
            reason: "not found".to_string(),
        });
        store.append(original.clone()).unwrap();
        assert_eq!(store.load().unwrap(), vec![original]);
    }
}
