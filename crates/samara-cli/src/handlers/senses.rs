use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use samara_core::MindPaths;
use samara_senses::SenseWatcher;
use samara_stream::EventStream;

use crate::args::{OutputFormat, SensesCommand};

pub fn handle(paths: &MindPaths, command: SensesCommand, format: OutputFormat) -> Result<()> {
    let stream = EventStream::new(paths.stream_dir())?;
    let watcher = SenseWatcher::new(paths.senses_dir(), stream)?;

    match command {
        SensesCommand::Ingest => {
            let report = watcher.ingest_once()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
                OutputFormat::Text => println!(
                    "Ingested {} sense event(s), rejected {}",
                    report.ingested, report.rejected
                ),
            }
        }
        SensesCommand::Watch { interval } => {
            let stop = Arc::new(AtomicBool::new(false));
            let stop_signal = Arc::clone(&stop);
            ctrlc::set_handler(move || {
                stop_signal.store(true, Ordering::SeqCst);
            })?;

            if format == OutputFormat::Text {
                println!(
                    "Watching {} (every {}s, Ctrl-C to stop)",
                    watcher.senses_dir().display(),
                    interval
                );
            }
            watcher.watch(Duration::from_secs(interval), stop)?;

            if format == OutputFormat::Json {
                println!("{}", json!({"stopped": true}));
            }
        }
    }
    Ok(())
}
