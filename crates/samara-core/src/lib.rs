mod clock;
mod config;
mod fsutil;
mod path;

pub use clock::{now_utc, now_with_override};
pub use config::{HotDigestConfig, MindConfig};
pub use fsutil::{atomic_write, locked_append, FsError, LOCK_WAIT_LIMIT};
pub use path::{expand_tilde, resolve_mind_path, Error, MindPaths, Result};
