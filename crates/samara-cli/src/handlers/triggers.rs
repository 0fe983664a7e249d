use anyhow::Result;
use chrono::Local;
use serde_json::json;

use samara_core::MindPaths;
use samara_policy::TriggerEvaluator;

use crate::args::{OutputFormat, TriggersCommand};

pub fn handle(paths: &MindPaths, command: TriggersCommand, format: OutputFormat) -> Result<()> {
    std::fs::create_dir_all(paths.state_dir())?;
    let evaluator = TriggerEvaluator::new(paths.state_dir(), paths.episodes_dir());
    let now = Local::now();

    match command {
        TriggersCommand::Evaluate => {
            let decision = evaluator.evaluate_at(now);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decision)?),
                OutputFormat::Text => {
                    println!(
                        "Escalation: {} (confidence {:.2})",
                        decision.escalation_level.as_str(),
                        decision.confidence
                    );
                    println!("Reason: {}", decision.reason);
                    if let Some(message) = &decision.suggested_message {
                        println!("Suggested message: {}", message);
                    }
                }
            }
        }
        TriggersCommand::Safeguards => {
            let status = evaluator.check_safeguards(now);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
                OutputFormat::Text => {
                    if status.all_passed {
                        println!("All safeguards passed");
                    } else {
                        println!(
                            "Blocked: {}",
                            status.blocking_reason.as_deref().unwrap_or("unknown")
                        );
                    }
                    for (name, passed) in &status.checks {
                        println!("  {}: {}", name, if *passed { "ok" } else { "failed" });
                    }
                }
            }
        }
        TriggersCommand::Summary => {
            let summary = evaluator.escalation_summary();
            match format {
                OutputFormat::Json => println!("{}", json!({"summary": summary})),
                OutputFormat::Text => println!("{}", summary),
            }
        }
        TriggersCommand::RecordEngagement => {
            evaluator.record_engagement(now)?;
            match format {
                OutputFormat::Json => println!("{}", json!({"recorded": true})),
                OutputFormat::Text => println!("Engagement recorded"),
            }
        }
    }
    Ok(())
}
