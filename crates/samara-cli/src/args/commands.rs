use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Read and write the unified event stream")]
    Stream {
        #[command(subcommand)]
        command: StreamCommand,
    },

    #[command(
        about = "Build the hot digest of recent activity",
        long_about = "Compress recent stream events into a bounded markdown digest.

The window is a number of hours or 'auto', which adapts to stream
velocity: busy periods shrink the window, quiet days expand it.
With --output and --cache-ttl, a fresh enough prior digest is
returned unchanged."
    )]
    Digest {
        #[arg(long, default_value = "12", help = "Window in hours, or 'auto'")]
        hours: String,

        #[arg(long, default_value = "3000")]
        max_tokens: usize,

        #[arg(long, help = "Collapse sections into a narrative summary")]
        summarize: bool,

        #[arg(long, help = "Write the digest to this path")]
        output: Option<PathBuf>,

        #[arg(long, help = "Reuse a prior output younger than this many seconds")]
        cache_ttl: Option<u64>,
    },

    #[command(about = "Audit stream coverage and digest inclusion")]
    Audit {
        #[arg(long, default_value = "168", help = "Coverage window in hours")]
        hours: f64,

        #[arg(long, default_value = "12", help = "Digest window in hours")]
        digest_hours: f64,

        #[arg(long, help = "Write the audit report to a file")]
        output: Option<PathBuf>,
    },

    #[command(about = "Maintain the open-threads index")]
    Threads {
        #[command(subcommand)]
        command: ThreadsCommand,
    },

    #[command(about = "Adaptive wake scheduling")]
    Wake {
        #[command(subcommand)]
        command: WakeCommand,
    },

    #[command(about = "Proactive-engagement trigger evaluation")]
    Triggers {
        #[command(subcommand)]
        command: TriggersCommand,
    },

    #[command(about = "Ingest satellite sense-event drops")]
    Senses {
        #[command(subcommand)]
        command: SensesCommand,
    },
}

#[derive(Subcommand)]
pub enum StreamCommand {
    #[command(about = "Append an event to the stream")]
    Write {
        #[arg(long)]
        surface: String,

        #[arg(long = "type")]
        event_type: String,

        #[arg(long)]
        direction: String,

        #[arg(long)]
        summary: String,

        #[arg(long)]
        session_id: Option<String>,

        #[arg(long)]
        content: Option<String>,

        #[arg(long, help = "Metadata as a JSON object")]
        metadata: Option<String>,
    },

    #[command(about = "Query events")]
    Query {
        #[arg(long, help = "Only events from the last N hours")]
        hours: Option<f64>,

        #[arg(long)]
        surface: Option<String>,

        #[arg(long = "type")]
        event_type: Option<String>,

        #[arg(long)]
        include_distilled: bool,
    },

    #[command(about = "Mark events as distilled")]
    MarkDistilled {
        event_ids: Vec<String>,

        #[arg(long, help = "Mark all undistilled events before this date (YYYY-MM-DD)")]
        before: Option<String>,
    },

    #[command(about = "Move old events into the archive")]
    Archive {
        #[arg(long, default_value = "30", help = "Archive events older than N days")]
        days: i64,
    },

    #[command(about = "Show stream statistics")]
    Stats,

    #[command(about = "Validate stream events against the schema")]
    Validate,

    #[command(about = "Rebuild the distilled sidecar index from stored flags")]
    RebuildDistilledIndex,

    #[command(about = "Split the legacy events.jsonl into daily shards")]
    MigrateDaily {
        #[arg(long, help = "Keep events.jsonl in place after migration")]
        keep_legacy: bool,
    },

    #[command(about = "Show undistilled events (dream-cycle input)")]
    Undistilled {
        #[arg(long, help = "Filter by exact date (YYYY-MM-DD)")]
        date: Option<String>,

        #[arg(long, help = "Only events before this date (YYYY-MM-DD)")]
        before: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ThreadsCommand {
    #[command(about = "Index a handoff's Open Threads into threads.json")]
    Index {
        #[arg(long)]
        handoff: PathBuf,

        #[arg(long, help = "Override the threads.json path")]
        threads_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum WakeCommand {
    #[command(about = "Decide whether to wake right now")]
    Check,

    #[command(about = "Show the next scheduled wake")]
    Next,

    #[command(about = "Show full scheduler status")]
    Status,

    #[command(about = "Record that a wake occurred")]
    Record {
        #[arg(default_value = "full", help = "Wake type: full, light, or none")]
        wake_type: String,
    },
}

#[derive(Subcommand)]
pub enum TriggersCommand {
    #[command(about = "Run a full trigger evaluation")]
    Evaluate,

    #[command(about = "Check safeguards only")]
    Safeguards,

    #[command(about = "Summarize recent evaluations")]
    Summary,

    #[command(about = "Record a proactive engagement (starts cooldown)")]
    RecordEngagement,
}

#[derive(Subcommand)]
pub enum SensesCommand {
    #[command(about = "Ingest deposited sense-event files once")]
    Ingest,

    #[command(about = "Watch the senses directory and ingest continuously")]
    Watch {
        #[arg(long, default_value = "15", help = "Sweep interval in seconds")]
        interval: u64,
    },
}
