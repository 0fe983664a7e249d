use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::json;

use samara_core::{now_with_override, MindConfig, MindPaths};
use samara_engine::{DigestBuilder, DigestOptions, WindowSpec};
use samara_stream::EventStream;

use crate::args::OutputFormat;

pub fn handle(
    paths: &MindPaths,
    hours: &str,
    max_tokens: usize,
    summarize: bool,
    output: Option<PathBuf>,
    cache_ttl: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let window: WindowSpec = hours.parse().map_err(|err: String| anyhow!(err))?;
    let stream = EventStream::new(paths.stream_dir())?;
    let config = MindConfig::load(&paths.config_file());

    let opts = DigestOptions {
        window,
        max_tokens,
        summarize,
        now: now_with_override("HOT_DIGEST_NOW"),
        output,
        cache_ttl: cache_ttl.map(Duration::from_secs),
    };

    let builder = DigestBuilder::new(&stream)
        .with_config(config.hot_digest().clone())
        .with_threads_path(paths.threads_file());
    let (digest, metadata) = builder.build(&opts)?;

    match format {
        OutputFormat::Json => {
            let result = json!({
                "digest": digest,
                "window_hours": metadata.window_hours,
                "event_count": metadata.event_count,
                "section_counts": metadata.section_counts,
                "cached": metadata.cached,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => print!("{}", digest),
    }
    Ok(())
}
