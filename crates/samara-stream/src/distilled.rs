use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One sidecar index row. Presence marks the event as distilled; the
/// stored stream flag is legacy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistilledEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub distilled_at: String,
}

/// Append-only JSONL sidecar listing distilled event IDs. Absence of
/// the file means "no events distilled yet".
#[derive(Debug, Clone)]
pub struct DistilledIndex {
    path: PathBuf,
}

impl DistilledIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the distilled ID set. Malformed rows are skipped.
    pub fn load(&self) -> Result<HashSet<String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HashSet::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut ids = HashSet::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<DistilledEntry>(trimmed) {
                Ok(entry) if !entry.id.is_empty() => {
                    ids.insert(entry.id);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(
                        component = "distilled-index",
                        error = %err,
                        "skipping malformed index row"
                    );
                }
            }
        }
        Ok(ids)
    }

    /// Append entries under an exclusive lock, one commit for the
    /// whole batch.
    pub fn append(&self, entries: &[DistilledEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut payload = String::new();
        for entry in entries {
            payload.push_str(&serde_json::to_string(entry).map_err(std::io::Error::other)?);
            payload.push('\n');
        }
        samara_core::locked_append(&self.path, payload.as_bytes())?;
        Ok(())
    }

    /// Replace the index atomically (temp file + rename). Used only by
    /// full rebuilds.
    pub fn rewrite(&self, entries: &[DistilledEntry]) -> Result<()> {
        let mut payload = String::new();
        for entry in entries {
            payload.push_str(&serde_json::to_string(entry).map_err(std::io::Error::other)?);
            payload.push('\n');
        }
        samara_core::atomic_write(&self.path, payload.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> DistilledEntry {
        DistilledEntry {
            id: id.to_string(),
            timestamp: Some("2026-01-17T10:00:00Z".to_string()),
            distilled_at: "2026-01-18T03:00:00Z".to_string(),
        }
    }

    #[test]
    fn missing_index_means_nothing_distilled() {
        let dir = tempfile::tempdir().unwrap();
        let index = DistilledIndex::new(dir.path().join("distilled-index.jsonl"));
        assert!(index.load().unwrap().is_empty());
    }

    #[test]
    fn append_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index = DistilledIndex::new(dir.path().join("distilled-index.jsonl"));
        index.append(&[entry("evt_1_a"), entry("evt_2_b")]).unwrap();
        let ids = index.load().unwrap();
        assert!(ids.contains("evt_1_a"));
        assert!(ids.contains("evt_2_b"));
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn load_skips_malformed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distilled-index.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"evt_1_a\",\"distilled_at\":\"2026-01-18T03:00:00Z\"}\n{broken\n",
        )
        .unwrap();
        let ids = DistilledIndex::new(path).load().unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn rewrite_replaces_previous_entries() {
        let dir = tempfile::tempdir().unwrap();
        let index = DistilledIndex::new(dir.path().join("distilled-index.jsonl"));
        index.append(&[entry("evt_1_a")]).unwrap();
        index.rewrite(&[entry("evt_9_z")]).unwrap();
        let ids = index.load().unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("evt_9_z"));
    }

    #[test]
    fn entry_without_timestamp_omits_field() {
        let entry = DistilledEntry {
            id: "evt_1_a".to_string(),
            timestamp: None,
            distilled_at: "2026-01-18T03:00:00Z".to_string(),
        };
        let line = serde_json::to_string(&entry).unwrap();
        assert!(!line.contains("timestamp"));
    }
}
