use anyhow::Result;
use serde_json::json;

use samara_core::MindPaths;
use samara_threads::index_handoff;

use crate::args::{OutputFormat, ThreadsCommand};

pub fn handle(paths: &MindPaths, command: ThreadsCommand, format: OutputFormat) -> Result<()> {
    match command {
        ThreadsCommand::Index {
            handoff,
            threads_path,
        } => {
            let threads_path = threads_path.unwrap_or_else(|| paths.threads_file());
            let outcome = index_handoff(&handoff, &threads_path)?;

            match format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({
                        "threads_path": threads_path.display().to_string(),
                        "thread_ids": outcome.thread_ids,
                        "thread_count": outcome.thread_count,
                    })
                ),
                OutputFormat::Text => println!(
                    "Indexed {} thread(s) ({} total)",
                    outcome.thread_ids.len(),
                    outcome.thread_count
                ),
            }
            Ok(())
        }
    }
}
