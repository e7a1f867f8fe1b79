use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Persisted set of already-emitted track ids, one per line.
///
/// The file is append-only; ids are never removed. It is the sole
/// mechanism keeping later runs from re-fetching or re-emitting an item,
/// and it is only appended to after a snapshot has fully landed on disk.
#[derive(Debug, Clone)]
pub struct SeenLedger {
    path: PathBuf,
}

impl SeenLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every id in the ledger. An absent file is an empty set, not
    /// an error.
    pub fn load(&self) -> Result<HashSet<String>, PipelineError> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Append ids, one per line. No-op for an empty set.
    pub fn append(&self, ids: &HashSet<String>) -> Result<(), PipelineError> {
        if ids.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for id in ids {
            writeln!(file, "{id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SeenLedger::new(dir.path().join("seen.txt"));
        assert!(ledger.load().unwrap().is_empty());
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_append_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SeenLedger::new(dir.path().join("seen.txt"));

        let ids: HashSet<String> = ["a1", "b2", "c3"].iter().map(|s| s.to_string()).collect();
        ledger.append(&ids).unwrap();
        assert_eq!(ledger.load().unwrap(), ids);
    }

    #[test]
    fn test_append_accumulates_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SeenLedger::new(dir.path().join("seen.txt"));

        let first: HashSet<String> = ["a"].iter().map(|s| s.to_string()).collect();
        let second: HashSet<String> = ["b"].iter().map(|s| s.to_string()).collect();
        ledger.append(&first).unwrap();
        ledger.append(&second).unwrap();

        let loaded = ledger.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("a") && loaded.contains("b"));
    }

    #[test]
    fn test_empty_append_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SeenLedger::new(dir.path().join("seen.txt"));
        ledger.append(&HashSet::new()).unwrap();
        assert!(!ledger.path().exists());
    }

    #[test]
    fn test_blank_lines_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.txt");
        fs::write(&path, "a1\n\n  \nb2\n").unwrap();
        let loaded = SeenLedger::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
