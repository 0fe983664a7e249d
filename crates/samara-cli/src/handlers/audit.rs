use std::path::PathBuf;

use anyhow::Result;

use samara_core::{now_with_override, MindConfig, MindPaths};
use samara_engine::{audit_stream, AuditOptions, DigestBuilder, DigestOptions, WindowSpec};
use samara_stream::{EventStream, QueryFilter};

use crate::args::OutputFormat;

pub fn handle(
    paths: &MindPaths,
    hours: f64,
    digest_hours: f64,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let stream = EventStream::new(paths.stream_dir())?;
    let config = MindConfig::load(&paths.config_file());
    let now = now_with_override("STREAM_AUDIT_NOW");

    let events = stream.query(
        &QueryFilter::default()
            .include_distilled(true)
            .hours(hours)
            .now(now),
    )?;

    // The digest clock follows its own override when set, else the
    // audit clock, so one env var pins both in tests.
    let digest_now = if std::env::var("HOT_DIGEST_NOW").is_ok() {
        now_with_override("HOT_DIGEST_NOW")
    } else {
        now
    };
    let digest_opts = DigestOptions {
        window: WindowSpec::Hours(digest_hours),
        now: digest_now,
        ..DigestOptions::new(digest_now)
    };
    let (digest_text, _) = DigestBuilder::new(&stream)
        .with_config(config.hot_digest().clone())
        .with_threads_path(paths.threads_file())
        .build(&digest_opts)?;

    let mut opts = AuditOptions::new(now);
    opts.window_hours = hours;
    opts.digest_hours = digest_hours;
    opts.disabled_services = config.disabled_services();

    let report = audit_stream(&events, &digest_text, &opts);

    if let Some(output) = &output {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut payload = serde_json::to_string_pretty(&report)?;
        payload.push('\n');
        std::fs::write(output, payload)?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Stream audit ({}h window)", report.counts.window_hours);
            println!("Total events: {}", report.counts.total_events);
            println!("Undistilled total: {}", report.counts.undistilled_total);
            let total = &report.digest_inclusion.total;
            match total.rate {
                Some(rate) => println!(
                    "Digest inclusion rate: {:.1}% ({}/{})",
                    rate * 100.0,
                    total.included,
                    total.eligible
                ),
                None => println!("Digest inclusion rate: n/a"),
            }
            if !report.gaps.missing_surfaces.is_empty() {
                println!(
                    "Missing surfaces: {}",
                    report.gaps.missing_surfaces.join(", ")
                );
            }
            if report.gaps.handoff_stale {
                println!("Handoff events are stale or missing");
            }
        }
    }

    Ok(())
}
