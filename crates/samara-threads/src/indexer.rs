use std::path::Path;

use crate::parse::{parse_open_threads, parse_session_id};
use crate::store::{assign_missing_ids, load_threads, write_threads, ThreadRecord, ThreadSource};
use crate::thread_id_for_title;

/// Result of indexing one handoff.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    /// Total records in `threads.json` after the update.
    pub thread_count: usize,
    /// IDs referenced by this handoff (created or reopened).
    pub thread_ids: Vec<String>,
}

/// Parse a handoff's Open Threads section and fold it into
/// `threads.json`.
///
/// Referenced threads are created or reopened (title refreshed,
/// status set to `open`, source updated); records not referenced by
/// this handoff are preserved unchanged. The file is replaced
/// atomically.
pub fn index_handoff(handoff_path: &Path, threads_path: &Path) -> std::io::Result<IndexOutcome> {
    let text = std::fs::read_to_string(handoff_path)?;

    let open_titles = parse_open_threads(&text);
    let mut file = load_threads(threads_path);
    assign_missing_ids(&mut file.threads);

    if open_titles.is_empty() {
        return Ok(IndexOutcome {
            thread_count: file.threads.len(),
            thread_ids: Vec::new(),
        });
    }

    let session_id = parse_session_id(&text);
    let source = ThreadSource {
        handoff_path: handoff_path.display().to_string(),
        session_id,
    };

    let mut updated: Vec<ThreadRecord> = Vec::new();
    let mut updated_ids: Vec<String> = Vec::new();

    for title in &open_titles {
        let thread_id = thread_id_for_title(title);
        let mut record = file
            .threads
            .iter()
            .find(|record| record.id == thread_id)
            .cloned()
            .unwrap_or_else(|| ThreadRecord {
                id: thread_id.clone(),
                title: String::new(),
                status: String::new(),
                source: None,
                extra: Default::default(),
            });

        record.title = title.clone();
        record.status = "open".to_string();
        record.source = Some(source.clone());

        if !updated_ids.contains(&thread_id) {
            updated.push(record);
            updated_ids.push(thread_id);
        }
    }

    let remaining: Vec<ThreadRecord> = file
        .threads
        .into_iter()
        .filter(|record| !record.id.trim().is_empty() && !updated_ids.contains(&record.id))
        .collect();

    let mut threads = updated;
    threads.extend(remaining);
    file.threads = threads;

    write_threads(threads_path, &file)?;

    Ok(IndexOutcome {
        thread_count: file.threads.len(),
        thread_ids: updated_ids,
    })
}
