use anyhow::{anyhow, Result};
use chrono::Local;
use serde_json::json;

use samara_core::MindPaths;
use samara_policy::{WakeKind, WakeScheduler};

use crate::args::{OutputFormat, WakeCommand};

pub fn handle(paths: &MindPaths, command: WakeCommand, format: OutputFormat) -> Result<()> {
    let mut scheduler = WakeScheduler::open(&paths.state_dir());
    let now = Local::now();

    match command {
        WakeCommand::Check => {
            let decision = scheduler.should_wake_now_at(now);
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({
                        "should_wake": decision.should_wake,
                        "type": decision.wake_type.as_str(),
                        "reason": decision.reason,
                    })
                ),
                OutputFormat::Text => {
                    if decision.should_wake {
                        println!("Wake now ({}): {}", decision.wake_type.as_str(), decision.reason);
                    } else {
                        println!("No wake: {}", decision.reason);
                    }
                }
            }
        }
        WakeCommand::Next => {
            let next = scheduler.next_wake_at(now);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&next)?),
                OutputFormat::Text => {
                    println!(
                        "Next scheduled wake: {} (in {} min)",
                        next.next_scheduled, next.minutes_until
                    );
                    println!(
                        "Current confidence: {:.0}% ({})",
                        next.current_confidence * 100.0,
                        next.confidence_reason
                    );
                    if next.may_wake_early {
                        println!("May wake early");
                    }
                }
            }
        }
        WakeCommand::Status => {
            let status = scheduler.status_at(now);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Text => {
                    println!(
                        "Should wake: {} ({})",
                        status.should_wake,
                        status.wake_type.as_str()
                    );
                    println!("Reason: {}", status.reason);
                    println!("Wakes today: {}", status.wake_count_today);
                    if let Some(last_wake) = &status.last_wake {
                        println!(
                            "Last wake: {} ({})",
                            last_wake,
                            status.last_wake_type.as_deref().unwrap_or("unknown")
                        );
                    }
                    println!(
                        "Next scheduled: {} (in {} min)",
                        status.next_scheduled, status.minutes_until_next
                    );
                    println!(
                        "Queue: {} pending, {} high-priority",
                        status.queue_status.pending, status.queue_status.high_priority
                    );
                    println!("Upcoming events: {}", status.upcoming_events);
                }
            }
        }
        WakeCommand::Record { wake_type } => {
            let kind: WakeKind = wake_type.parse().map_err(|err: String| anyhow!(err))?;
            scheduler.record_wake_at(kind, now)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", json!({"recorded": true, "type": kind.as_str()}))
                }
                OutputFormat::Text => println!("Recorded {} wake", kind.as_str()),
            }
        }
    }
    Ok(())
}
