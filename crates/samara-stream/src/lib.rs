// NOTE: Stream layout rationale
//
// Why daily shards (not one growing file)?
// - Archiving becomes a rename instead of a rewrite
// - Readers touch only the files overlapping their window
// - A legacy single-file stream remains readable as a final catch-all
//   until `migrate-daily` splits it
//
// Why a sidecar distillation index (not rewriting the stored flag)?
// - The stream is append-only; no line is ever mutated in place
// - Marking is an idempotent append to the sidecar; re-marking adds
//   nothing
// - The index can always be rebuilt from stored flags atomically
//
// Why swallow per-line decode errors on reads?
// - One corrupt line must never take down a reasoning cycle
// - `validate` reports them, `query` skips them

mod distilled;
mod error;
mod metrics;
mod read;
mod stream;
mod validator;

pub use distilled::{DistilledEntry, DistilledIndex};
pub use error::{Error, Result};
pub use metrics::{
    compute_event_metrics, compute_velocity, count_events_in_window, rate_per_hour, EventMetrics,
    MetricWindows, VELOCITY_RATE_FLOOR,
};
pub use stream::{EventStream, QueryFilter, StreamStats};
pub use validator::{validate_event, validate_stream_file, ValidationIssue};
