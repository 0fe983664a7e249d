use std::collections::HashMap;

use once_cell::sync::Lazy;

use samara_types::{sort_key, EventRecord};

/// Summaries kept per surface by the narrative fallback.
pub const DEFAULT_MAX_PER_SURFACE: usize = 3;

static SURFACE_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("imessage", "iMessage"),
        ("cli", "CLI"),
        ("wake", "Wake"),
        ("dream", "Dream"),
        ("webhook", "Webhook"),
        ("x", "X"),
        ("bluesky", "Bluesky"),
        ("email", "Email"),
        ("calendar", "Calendar"),
        ("location", "Location"),
        ("sense", "Sense"),
        ("system", "System"),
    ])
});

/// Model-backed digest summarization. Implementations talk to an
/// external model; the deterministic [`build_narrative`] fallback is
/// used whenever they fail.
pub trait Summarizer {
    fn summarize(&self, events: &[EventRecord]) -> anyhow::Result<String>;
}

/// Summarize events through the model when one is configured and
/// reachable, degrading to the deterministic fallback without
/// raising.
pub fn summarize_events(events: &[EventRecord], summarizer: Option<&dyn Summarizer>) -> String {
    if let Some(summarizer) = summarizer {
        match summarizer.summarize(events) {
            Ok(text) if !text.trim().is_empty() => return text,
            Ok(_) => {
                tracing::warn!(
                    component = "summarizer",
                    operation = "summarize",
                    "model returned empty output, using fallback narrative"
                );
            }
            Err(err) => {
                tracing::warn!(
                    component = "summarizer",
                    operation = "summarize",
                    error = %err,
                    "model unreachable, using fallback narrative"
                );
            }
        }
    }
    build_narrative(events, DEFAULT_MAX_PER_SURFACE)
}

/// Deterministic narrative: group events by surface in first
/// appearance order, cap the summaries per surface, one paragraph per
/// surface of the form `"<Label> activity: a; b; c."`.
pub fn build_narrative(events: &[EventRecord], max_per_surface: usize) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut ordered: Vec<&EventRecord> = events.iter().collect();
    ordered.sort_by_key(|record| sort_key(record));

    let mut surface_order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for record in ordered {
        let surface = record
            .surface()
            .unwrap_or("unknown")
            .trim()
            .to_lowercase();
        let Some(summary) = best_summary(record) else {
            continue;
        };

        let entry = grouped.entry(surface.clone()).or_insert_with(|| {
            surface_order.push(surface.clone());
            Vec::new()
        });
        if entry.len() < max_per_surface {
            entry.push(summary);
        }
    }

    let mut paragraphs = Vec::new();
    for surface in surface_order {
        let summaries = &grouped[&surface];
        if summaries.is_empty() {
            continue;
        }
        let label = SURFACE_LABELS
            .get(surface.as_str())
            .map(|label| label.to_string())
            .unwrap_or_else(|| capitalize(&surface));
        paragraphs.push(format!("{} activity: {}.", label, summaries.join("; ")));
    }

    paragraphs.join("\n\n")
}

/// Best available summary text for an event: the summary field, then
/// the content field, whitespace-normalized with trailing periods
/// trimmed.
fn best_summary(record: &EventRecord) -> Option<String> {
    for text in [record.summary(), record.content()] {
        if let Some(text) = text {
            let cleaned = clean_text(text);
            if !cleaned.is_empty() {
                return Some(cleaned);
            }
        }
    }
    None
}

fn clean_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
