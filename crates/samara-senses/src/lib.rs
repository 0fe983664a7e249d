mod watcher;

pub use watcher::{IngestReport, SenseEventFile, SensePriority, SenseWatcher};
