use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use samara_core::HotDigestConfig;
use samara_stream::{
    compute_event_metrics, EventMetrics, EventStream, MetricWindows, QueryFilter,
};
use samara_types::{format_time_ago, sort_key, EventRecord, Surface};

use crate::narrative::{summarize_events, Summarizer};

/// Token budget split across the three sections. Conversations carry
/// continuity and get the largest share.
const CONVERSATION_WEIGHT: f64 = 0.50;
const SESSION_WEIGHT: f64 = 0.35;
const SYSTEM_WEIGHT: f64 = 0.15;

/// Hard bullet cap on the System Events section.
const SYSTEM_EVENT_CAP: usize = 10;

const CONVERSATIONAL_SURFACES: [&str; 4] = ["imessage", "x", "bluesky", "email"];
const ACTIVITY_SURFACES: [&str; 3] = ["cli", "wake", "dream"];

const CONTENT_PREVIEW_CHARS: usize = 200;

/// Digest window: a fixed trailing span in hours, or adaptive
/// selection from stream rate metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowSpec {
    Auto,
    Hours(f64),
}

impl FromStr for WindowSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(WindowSpec::Auto);
        }
        s.parse::<f64>()
            .map(WindowSpec::Hours)
            .map_err(|_| format!("invalid window '{}' (expected hours or 'auto')", s))
    }
}

#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub window: WindowSpec,
    pub max_tokens: usize,
    /// Pass the windowed events through the summarizer seam instead
    /// of emitting structured sections.
    pub summarize: bool,
    pub now: DateTime<Utc>,
    pub output: Option<PathBuf>,
    pub cache_ttl: Option<Duration>,
}

impl DigestOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            window: WindowSpec::Hours(12.0),
            max_tokens: 3000,
            summarize: false,
            now,
            output: None,
            cache_ttl: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestMetadata {
    pub window_hours: f64,
    pub event_count: usize,
    pub section_counts: BTreeMap<String, usize>,
    pub cached: bool,
}

/// Select the digest window from rate metrics: high steady rates and
/// rising velocity shrink the window toward `min_hours`, quiet
/// periods expand it toward `max_hours` (a zero long rate clamps to
/// the max rather than dividing by zero).
pub fn select_window_hours(metrics: &EventMetrics, config: &HotDigestConfig) -> f64 {
    let raw = config.base_hours * config.target_rate
        / metrics.long_rate.max(0.1)
        / metrics.velocity.max(1.0);
    raw.clamp(config.min_hours, config.max_hours)
}

/// Builds bounded markdown digests of recent stream activity.
pub struct DigestBuilder<'a> {
    stream: &'a EventStream,
    config: HotDigestConfig,
    threads_path: Option<PathBuf>,
    summarizer: Option<&'a dyn Summarizer>,
}

impl<'a> DigestBuilder<'a> {
    pub fn new(stream: &'a EventStream) -> Self {
        Self {
            stream,
            config: HotDigestConfig::default(),
            threads_path: None,
            summarizer: None,
        }
    }

    pub fn with_config(mut self, config: HotDigestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_threads_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.threads_path = Some(path.into());
        self
    }

    pub fn with_summarizer(mut self, summarizer: &'a dyn Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn build(&self, opts: &DigestOptions) -> samara_stream::Result<(String, DigestMetadata)> {
        if let Some(cached) = self.cached_output(opts)? {
            return Ok((
                cached,
                DigestMetadata {
                    window_hours: 0.0,
                    event_count: 0,
                    section_counts: BTreeMap::new(),
                    cached: true,
                },
            ));
        }

        let window_hours = match opts.window {
            WindowSpec::Hours(hours) => hours,
            WindowSpec::Auto => {
                let trailing = self.stream.query(
                    &QueryFilter::default()
                        .include_distilled(true)
                        .hours(self.config.max_hours)
                        .now(opts.now),
                )?;
                let metrics =
                    compute_event_metrics(&trailing, opts.now, MetricWindows::default());
                select_window_hours(&metrics, &self.config)
            }
        };

        let mut events = self.stream.query(
            &QueryFilter::default()
                .include_distilled(true)
                .hours(window_hours)
                .now(opts.now),
        )?;
        // Newest first everywhere in the digest.
        events.sort_by_key(sort_key);
        events.reverse();

        let mut text = String::from("## Recent Activity\n");
        self.render_open_threads(&mut text);

        let mut section_counts = BTreeMap::new();
        if opts.summarize {
            let narrative = summarize_events(&events, self.summarizer);
            if !narrative.is_empty() {
                text.push('\n');
                text.push_str(&narrative);
                text.push('\n');
            }
        } else {
            self.render_sections(&mut text, &events, opts, &mut section_counts);
        }

        if let Some(output) = &opts.output {
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            samara_core::atomic_write(output, text.as_bytes())?;
        }

        let metadata = DigestMetadata {
            window_hours,
            event_count: events.len(),
            section_counts,
            cached: false,
        };
        Ok((text, metadata))
    }

    fn cached_output(&self, opts: &DigestOptions) -> samara_stream::Result<Option<String>> {
        let (Some(output), Some(ttl)) = (&opts.output, opts.cache_ttl) else {
            return Ok(None);
        };
        let Ok(metadata) = std::fs::metadata(output) else {
            return Ok(None);
        };
        let fresh = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age < ttl)
            .unwrap_or(false);
        if !fresh {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(output)?))
    }

    fn render_open_threads(&self, text: &mut String) {
        let Some(threads_path) = &self.threads_path else {
            return;
        };
        let titles = samara_threads::open_thread_titles(threads_path);
        if titles.is_empty() {
            return;
        }
        text.push_str("\n### Open Threads\n\n");
        for title in titles {
            text.push_str("- ");
            text.push_str(&title);
            text.push('\n');
        }
    }

    fn render_sections(
        &self,
        text: &mut String,
        events: &[EventRecord],
        opts: &DigestOptions,
        section_counts: &mut BTreeMap<String, usize>,
    ) {
        let sections: [(&str, Vec<&EventRecord>, f64, Option<usize>); 3] = [
            (
                "Conversations",
                select_surface_events(events, &CONVERSATIONAL_SURFACES),
                CONVERSATION_WEIGHT,
                None,
            ),
            (
                "Sessions",
                select_surface_events(events, &ACTIVITY_SURFACES),
                SESSION_WEIGHT,
                None,
            ),
            (
                "System Events",
                select_remaining_events(events),
                SYSTEM_WEIGHT,
                Some(SYSTEM_EVENT_CAP),
            ),
        ];

        for (title, section_events, weight, bullet_cap) in sections {
            if section_events.is_empty() {
                continue;
            }

            text.push_str("\n### ");
            text.push_str(title);
            text.push_str("\n\n");

            let budget = (opts.max_tokens as f64 * weight) as usize;
            let mut used = 0;
            let mut bullets = 0;

            for event in section_events {
                if let Some(cap) = bullet_cap {
                    if bullets >= cap {
                        break;
                    }
                }

                let bullet = format_bullet(event, opts.now);
                let bullet_tokens = estimate_tokens(&bullet);
                if used + bullet_tokens > budget && bullets > 0 {
                    break;
                }
                text.push_str(&bullet);
                text.push('\n');
                used += bullet_tokens;
                bullets += 1;

                if let Some(content) = event.content() {
                    let preview = content_preview(content);
                    if !preview.is_empty() {
                        let line = format!("  {}", preview);
                        let line_tokens = estimate_tokens(&line);
                        if used + line_tokens <= budget {
                            text.push_str(&line);
                            text.push('\n');
                            used += line_tokens;
                        }
                    }
                }
            }

            section_counts.insert(section_key(title), bullets);
        }
    }
}

/// Build a digest with default configuration and no threads prologue.
pub fn build_digest(
    stream: &EventStream,
    opts: &DigestOptions,
) -> samara_stream::Result<(String, DigestMetadata)> {
    DigestBuilder::new(stream).build(opts)
}

fn section_key(title: &str) -> String {
    title.to_lowercase().replace(' ', "_")
}

fn select_surface_events<'e>(
    events: &'e [EventRecord],
    surfaces: &[&str],
) -> Vec<&'e EventRecord> {
    events
        .iter()
        .filter(|event| {
            event
                .surface()
                .map(|surface| surfaces.contains(&surface))
                .unwrap_or(false)
        })
        .collect()
}

/// Everything outside the conversational and activity surfaces lands
/// in System Events, including unknown surfaces.
fn select_remaining_events(events: &[EventRecord]) -> Vec<&EventRecord> {
    events
        .iter()
        .filter(|event| {
            let surface = event.surface().unwrap_or("");
            !CONVERSATIONAL_SURFACES.contains(&surface) && !ACTIVITY_SURFACES.contains(&surface)
        })
        .collect()
}

fn format_bullet(event: &EventRecord, now: DateTime<Utc>) -> String {
    let ago = event
        .timestamp()
        .map(|ts| format_time_ago(ts, now))
        .unwrap_or_else(|| "recently".to_string());
    let label = event
        .surface()
        .and_then(|surface| surface.parse::<Surface>().ok())
        .map(|surface| surface.bullet_label().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "- **{} [{}]** {}",
        ago,
        label,
        event.summary().unwrap_or("")
    )
}

/// Flatten content to a single markdown-free preview line.
fn content_preview(content: &str) -> String {
    let stripped: String = content
        .chars()
        .filter(|c| !matches!(c, '*' | '#' | '`' | '>'))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= CONTENT_PREVIEW_CHARS {
        collapsed
    } else {
        collapsed.chars().take(CONTENT_PREVIEW_CHARS).collect::<String>() + "..."
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}
