mod indexer;
mod parse;
mod store;

pub use indexer::{index_handoff, IndexOutcome};
pub use parse::{parse_open_threads, parse_session_id};
pub use store::{load_threads, open_thread_titles, ThreadRecord, ThreadSource, ThreadsFile};

use sha1::{Digest, Sha1};

/// Thread statuses treated as closed when listing open threads.
pub const CLOSED_THREAD_STATUSES: [&str; 6] = [
    "closed",
    "done",
    "resolved",
    "complete",
    "completed",
    "archived",
];

/// Normalize a thread title for stable ID generation: trim, collapse
/// internal whitespace, lowercase.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Derive the stable thread ID for a title. Identical normalized
/// titles produce identical IDs across processes and languages:
/// `thread_` + the first 10 hex chars of the SHA-1 of the normalized
/// title.
pub fn thread_id_for_title(title: &str) -> String {
    let normalized = normalize_title(title);
    let mut hasher = Sha1::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("thread_{}", &digest[..10])
}
