use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{thread_id_for_title, CLOSED_THREAD_STATUSES};

/// Where a thread was last referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSource {
    pub handoff_path: String,
    pub session_id: Option<String>,
}

/// One record in `threads.json`. Unknown fields written by other
/// tools are preserved through the `extra` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ThreadSource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreadRecord {
    /// Title for ID derivation, falling back to legacy `summary` /
    /// `name` fields carried in `extra`.
    pub fn effective_title(&self) -> String {
        if !self.title.trim().is_empty() {
            return self.title.trim().to_string();
        }
        for key in ["summary", "name"] {
            if let Some(value) = self.extra.get(key).and_then(Value::as_str) {
                if !value.trim().is_empty() {
                    return value.trim().to_string();
                }
            }
        }
        String::new()
    }

    pub fn is_open(&self) -> bool {
        let status = self.status.trim().to_lowercase();
        !CLOSED_THREAD_STATUSES.contains(&status.as_str())
    }
}

/// The `threads.json` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadsFile {
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

/// Load `threads.json`, tolerating missing or malformed files as an
/// empty list. A bare top-level array is accepted as a legacy shape.
pub fn load_threads(path: &Path) -> ThreadsFile {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return ThreadsFile::default(),
    };

    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                component = "threads",
                path = %path.display(),
                error = %err,
                "malformed threads.json, treating as empty"
            );
            return ThreadsFile::default();
        }
    };

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("threads") {
            Some(Value::Array(entries)) => entries,
            _ => return ThreadsFile::default(),
        },
        _ => return ThreadsFile::default(),
    };

    let threads = entries
        .into_iter()
        .filter(|entry| entry.is_object())
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    ThreadsFile { threads }
}

/// Write `threads.json` atomically (temp file + rename).
pub fn write_threads(path: &Path, file: &ThreadsFile) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut payload = serde_json::to_string_pretty(file).map_err(std::io::Error::other)?;
    payload.push('\n');
    samara_core::atomic_write(path, payload.as_bytes()).map_err(|err| match err {
        samara_core::FsError::Io(err) => err,
        other => std::io::Error::other(other.to_string()),
    })
}

/// Titles of the open threads in `threads.json`, for the digest
/// prologue. Records whose status is a closed variant are dropped.
pub fn open_thread_titles(path: &Path) -> Vec<String> {
    load_threads(path)
        .threads
        .iter()
        .filter(|record| record.is_open())
        .map(|record| record.effective_title())
        .filter(|title| !title.is_empty())
        .collect()
}

/// Ensure every record carries an ID, deriving one from the title for
/// legacy rows.
pub(crate) fn assign_missing_ids(threads: &mut [ThreadRecord]) {
    for record in threads {
        if record.id.trim().is_empty() {
            let title = record.effective_title();
            if !title.is_empty() {
                record.id = thread_id_for_title(&title);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_empty() {
        assert!(load_threads(Path::new("/nonexistent/threads.json"))
            .threads
            .is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.json");
        std::fs::write(&path, "{oops").unwrap();
        assert!(load_threads(&path).threads.is_empty());
    }

    #[test]
    fn bare_array_shape_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.json");
        std::fs::write(
            &path,
            r#"[{"id": "thread_0000000001", "title": "Legacy", "status": "open"}]"#,
        )
        .unwrap();
        let file = load_threads(&path);
        assert_eq!(file.threads.len(), 1);
        assert_eq!(file.threads[0].title, "Legacy");
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.json");
        std::fs::write(
            &path,
            r#"{"threads": [{"id": "thread_0000000001", "title": "T", "status": "open", "priority": "high"}]}"#,
        )
        .unwrap();

        let file = load_threads(&path);
        write_threads(&path, &file).unwrap();

        let reloaded = load_threads(&path);
        assert_eq!(
            reloaded.threads[0].extra.get("priority"),
            Some(&Value::String("high".to_string()))
        );
    }

    #[test]
    fn open_titles_exclude_closed_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.json");
        std::fs::write(
            &path,
            r#"{"threads": [
                {"id": "a", "title": "Open one", "status": "open"},
                {"id": "b", "title": "Shouting open", "status": "OPEN"},
                {"id": "c", "title": "Done one", "status": "done"},
                {"id": "d", "title": "Closed one", "status": "Closed"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            open_thread_titles(&path),
            vec!["Open one".to_string(), "Shouting open".to_string()]
        );
    }
}
