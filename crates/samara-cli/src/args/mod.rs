mod commands;
mod enums;

pub use commands::*;
pub use enums::*;

use clap::Parser;

#[derive(Parser)]
#[command(name = "samara")]
#[command(about = "Unified event stream, hot digests, and wake scheduling", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Mind root (default: $SAMARA_MIND_PATH, $MIND_PATH, then ~/.claude-mind)
    #[arg(long, global = true)]
    pub mind_path: Option<String>,

    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
