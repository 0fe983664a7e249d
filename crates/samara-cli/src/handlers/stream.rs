use anyhow::{anyhow, bail, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use serde_json::json;

use samara_core::MindPaths;
use samara_stream::{validate_stream_file, EventStream, QueryFilter, ValidationIssue};
use samara_types::{sort_key, Direction, Event, EventRecord, EventType, Surface};

use crate::args::{OutputFormat, StreamCommand};

pub fn handle(paths: &MindPaths, command: StreamCommand, format: OutputFormat) -> Result<()> {
    let stream = EventStream::new(paths.stream_dir())?;

    match command {
        StreamCommand::Write {
            surface,
            event_type,
            direction,
            summary,
            session_id,
            content,
            metadata,
        } => write(
            &stream, &surface, &event_type, &direction, &summary, session_id, content, metadata,
            format,
        ),
        StreamCommand::Query {
            hours,
            surface,
            event_type,
            include_distilled,
        } => query(&stream, hours, surface, event_type, include_distilled, format),
        StreamCommand::MarkDistilled { event_ids, before } => {
            mark_distilled(&stream, event_ids, before, format)
        }
        StreamCommand::Archive { days } => archive(&stream, days, format),
        StreamCommand::Stats => stats(&stream, format),
        StreamCommand::Validate => validate(&stream, format),
        StreamCommand::RebuildDistilledIndex => rebuild(&stream, format),
        StreamCommand::MigrateDaily { keep_legacy } => migrate(&stream, keep_legacy, format),
        StreamCommand::Undistilled { date, before } => undistilled(&stream, date, before, format),
    }
}

#[allow(clippy::too_many_arguments)]
fn write(
    stream: &EventStream,
    surface: &str,
    event_type: &str,
    direction: &str,
    summary: &str,
    session_id: Option<String>,
    content: Option<String>,
    metadata: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let surface: Surface = surface.parse().map_err(|err| anyhow!("{}", err))?;
    let event_type: EventType = event_type.parse().map_err(|err| anyhow!("{}", err))?;
    let direction: Direction = direction.parse().map_err(|err| anyhow!("{}", err))?;

    let metadata = match metadata {
        None => serde_json::Map::new(),
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => bail!("invalid metadata: expected a JSON object"),
            Err(err) => bail!("invalid metadata JSON: {}", err),
        },
    };

    let mut event = Event::new(surface, event_type, direction, summary);
    event.session_id = session_id;
    event.content = content;
    event.metadata = metadata;
    stream.append(&event)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({"id": event.id, "timestamp": event.timestamp})
        ),
        OutputFormat::Text => println!("Event written: {}", event.id),
    }
    Ok(())
}

fn query(
    stream: &EventStream,
    hours: Option<f64>,
    surface: Option<String>,
    event_type: Option<String>,
    include_distilled: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut filter = QueryFilter::default().include_distilled(include_distilled);
    filter.hours = hours;
    if let Some(surface) = surface {
        filter.surface = Some(surface.parse::<Surface>().map_err(|err| anyhow!("{}", err))?);
    }
    if let Some(event_type) = event_type {
        filter.event_type = Some(
            event_type
                .parse::<EventType>()
                .map_err(|err| anyhow!("{}", err))?,
        );
    }

    let mut results = stream.query(&filter)?;
    results.sort_by_key(sort_key);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No events found");
                return Ok(());
            }
            for event in &results {
                println!("{}", render_event_line(event));
            }
        }
    }
    Ok(())
}

fn render_event_line(event: &EventRecord) -> String {
    let ts = event
        .timestamp()
        .map(|ts| ts.chars().take(19).collect::<String>().replace('T', " "))
        .unwrap_or_else(|| "unknown time".to_string());
    let surface = event.surface().unwrap_or("unknown");
    let summary: String = event.summary().unwrap_or("").chars().take(80).collect();
    let distilled = if event.distilled() { " [distilled]" } else { "" };
    format!("[{}] ({}) {}{}", ts, surface, summary, distilled)
}

fn mark_distilled(
    stream: &EventStream,
    event_ids: Vec<String>,
    before: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let count = if let Some(before) = before {
        stream.mark_distilled_before_date(&before)?
    } else if !event_ids.is_empty() {
        stream.mark_distilled(&event_ids)?
    } else {
        bail!("Provide event IDs or --before date");
    };

    match format {
        OutputFormat::Json => println!("{}", json!({"marked": count})),
        OutputFormat::Text => println!("Marked {} event(s) as distilled", count),
    }
    Ok(())
}

fn archive(stream: &EventStream, days: i64, format: OutputFormat) -> Result<()> {
    let count = stream.archive(days, chrono::Utc::now())?;
    match format {
        OutputFormat::Json => println!("{}", json!({"archived": count})),
        OutputFormat::Text => println!("Archived {} event(s)", count),
    }
    Ok(())
}

fn stats(stream: &EventStream, format: OutputFormat) -> Result<()> {
    let stats = stream.stats()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Text => {
            println!("Total events: {}", stats.total_events);
            println!("Undistilled: {}", stats.undistilled);
            println!("Distilled: {}", stats.distilled);
            println!();
            println!("{}", heading("By surface:"));
            for (surface, count) in &stats.by_surface {
                println!("  {}: {}", surface, count);
            }
            println!();
            println!("{}", heading("By type:"));
            for (event_type, count) in &stats.by_type {
                println!("  {}: {}", event_type, count);
            }
            if let Some(oldest) = &stats.oldest_event {
                println!();
                println!("Oldest: {}", oldest);
                if let Some(newest) = &stats.newest_event {
                    println!("Newest: {}", newest);
                }
            }
        }
    }
    Ok(())
}

fn heading(text: &str) -> String {
    if std::io::stdout().is_terminal() {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

fn validate(stream: &EventStream, format: OutputFormat) -> Result<()> {
    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut total = 0;

    for file in stream.list_stream_files(None, chrono::Utc::now()) {
        let (mut file_issues, file_total) = validate_stream_file(&file)?;
        for issue in &mut file_issues {
            issue.file = Some(file.display().to_string());
        }
        issues.extend(file_issues);
        total += file_total;
    }

    let valid = issues.is_empty();
    match format {
        OutputFormat::Json => {
            let result = json!({
                "valid": valid,
                "total_events": total,
                "error_count": issues.len(),
                "errors": issues,
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Text => {
            if valid {
                println!("Stream valid ({} events)", total);
            } else {
                println!(
                    "{}",
                    heading(&format!(
                        "Stream invalid ({} issues across {} events)",
                        issues.len(),
                        total
                    ))
                );
                for issue in issues.iter().take(10) {
                    let id = issue.id.as_deref().unwrap_or("unknown");
                    let detail = issue
                        .error
                        .clone()
                        .unwrap_or_else(|| issue.errors.join("; "));
                    println!("  line {} [{}]: {}", issue.line, id, detail);
                }
            }
        }
    }

    // Findings are warnings, not failures: the command still exits 0.
    Ok(())
}

fn rebuild(stream: &EventStream, format: OutputFormat) -> Result<()> {
    let count = stream.rebuild_distilled_index()?;
    match format {
        OutputFormat::Json => println!("{}", json!({"rebuilt": count})),
        OutputFormat::Text => println!("Rebuilt distilled index ({} event(s))", count),
    }
    Ok(())
}

fn migrate(stream: &EventStream, keep_legacy: bool, format: OutputFormat) -> Result<()> {
    let count = stream.migrate_legacy_to_daily(!keep_legacy)?;
    match format {
        OutputFormat::Json => println!("{}", json!({"migrated": count})),
        OutputFormat::Text => println!("Migrated {} event(s) to daily shards", count),
    }
    Ok(())
}

fn undistilled(
    stream: &EventStream,
    date: Option<String>,
    before: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let mut results = stream.query_undistilled(date.as_deref(), before.as_deref())?;
    results.sort_by_key(sort_key);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No undistilled events");
                return Ok(());
            }
            for event in &results {
                let ts = event
                    .timestamp()
                    .map(|ts| ts.chars().take(19).collect::<String>().replace('T', " "))
                    .unwrap_or_else(|| "unknown time".to_string());
                println!(
                    "[{}] ({}) {}",
                    ts,
                    event.surface().unwrap_or("unknown"),
                    event.summary().unwrap_or("")
                );
                if let Some(content) = event.content() {
                    let mut preview: String = content.chars().take(200).collect();
                    if content.chars().count() > 200 {
                        preview.push_str("...");
                    }
                    println!("  Content: {}", preview);
                }
                println!();
            }
        }
    }
    Ok(())
}
