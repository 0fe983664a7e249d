mod audit;
mod digest;
mod narrative;

pub use audit::{
    audit_stream, AuditCounts, AuditOptions, AuditReport, GapReport, InclusionReport,
    InclusionStats,
};
pub use digest::{
    build_digest, select_window_hours, DigestBuilder, DigestMetadata, DigestOptions, WindowSpec,
};
pub use narrative::{build_narrative, summarize_events, Summarizer, DEFAULT_MAX_PER_SURFACE};
