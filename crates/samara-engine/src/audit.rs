use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use samara_types::{format_timestamp, EventRecord, Surface};

#[derive(Debug, Clone)]
pub struct AuditOptions {
    pub window_hours: f64,
    pub digest_hours: f64,
    pub now: DateTime<Utc>,
    /// Surfaces whose satellite service is disabled in config;
    /// excluded from the missing-surface report.
    pub disabled_services: Vec<String>,
}

impl AuditOptions {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            window_hours: 168.0,
            digest_hours: 12.0,
            now,
            disabled_services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditCounts {
    pub window_hours: f64,
    pub total_events: usize,
    pub by_surface: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_direction: BTreeMap<String, usize>,
    pub undistilled_total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InclusionStats {
    pub eligible: usize,
    pub included: usize,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InclusionReport {
    pub total: InclusionStats,
    pub by_surface: BTreeMap<String, InclusionStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapReport {
    pub missing_surfaces: Vec<String>,
    pub handoff_stale: bool,
    pub handoff_last_seen: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub generated_at: String,
    pub digest_window_hours: f64,
    pub counts: AuditCounts,
    pub digest_inclusion: InclusionReport,
    pub gaps: GapReport,
}

/// Compute coverage and digest-inclusion metrics over the stream.
/// `events` should span at least the coverage window (queried with
/// distilled events included).
pub fn audit_stream(events: &[EventRecord], digest_text: &str, opts: &AuditOptions) -> AuditReport {
    let window_events = filter_by_hours(events, opts.now, opts.window_hours);
    let digest_events = filter_by_hours(events, opts.now, opts.digest_hours);

    let counts = AuditCounts {
        window_hours: opts.window_hours,
        total_events: window_events.len(),
        by_surface: count_by(&window_events, |e| e.surface()),
        by_type: count_by(&window_events, |e| e.event_type()),
        by_direction: count_by(&window_events, |e| e.direction()),
        undistilled_total: events.iter().filter(|e| !e.distilled()).count(),
    };

    AuditReport {
        generated_at: format_timestamp(opts.now),
        digest_window_hours: opts.digest_hours,
        counts,
        digest_inclusion: compute_inclusion(&digest_events, digest_text),
        gaps: compute_gaps(&window_events, events, opts),
    }
}

fn filter_by_hours<'e>(
    events: &'e [EventRecord],
    now: DateTime<Utc>,
    hours: f64,
) -> Vec<&'e EventRecord> {
    let cutoff = now - Duration::seconds((hours * 3600.0) as i64);
    events
        .iter()
        .filter(|event| {
            event
                .parsed_timestamp()
                .map(|ts| ts >= cutoff)
                .unwrap_or(false)
        })
        .collect()
}

fn count_by<'e>(
    events: &[&'e EventRecord],
    field: impl Fn(&'e EventRecord) -> Option<&'e str>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for &event in events {
        if let Some(value) = field(event) {
            *counts.entry(value.to_string()).or_default() += 1;
        }
    }
    counts
}

fn summary_in_digest(summary: &str, digest: &str) -> bool {
    if summary.is_empty() || digest.is_empty() {
        return false;
    }
    digest.to_lowercase().contains(&summary.to_lowercase())
}

fn compute_inclusion(events: &[&EventRecord], digest: &str) -> InclusionReport {
    let eligible: Vec<&&EventRecord> = events
        .iter()
        .filter(|event| event.summary().map(|s| !s.is_empty()).unwrap_or(false))
        .collect();
    let included: Vec<&&EventRecord> = eligible
        .iter()
        .filter(|event| summary_in_digest(event.summary().unwrap_or(""), digest))
        .copied()
        .collect();

    let mut by_surface: BTreeMap<String, InclusionStats> = BTreeMap::new();
    for event in &eligible {
        let Some(surface) = event.surface() else {
            continue;
        };
        let entry = by_surface.entry(surface.to_string()).or_insert(InclusionStats {
            eligible: 0,
            included: 0,
            rate: None,
        });
        entry.eligible += 1;
        if summary_in_digest(event.summary().unwrap_or(""), digest) {
            entry.included += 1;
        }
    }
    for stats in by_surface.values_mut() {
        stats.rate = rate(stats.included, stats.eligible);
    }

    InclusionReport {
        total: InclusionStats {
            eligible: eligible.len(),
            included: included.len(),
            rate: rate(included.len(), eligible.len()),
        },
        by_surface,
    }
}

fn rate(included: usize, eligible: usize) -> Option<f64> {
    (eligible > 0).then(|| included as f64 / eligible as f64)
}

fn compute_gaps(
    window_events: &[&EventRecord],
    all_events: &[EventRecord],
    opts: &AuditOptions,
) -> GapReport {
    let seen: Vec<&str> = window_events.iter().filter_map(|e| e.surface()).collect();
    let mut missing_surfaces: Vec<String> = Surface::ALL
        .iter()
        .map(|surface| surface.as_str().to_string())
        .filter(|surface| !seen.contains(&surface.as_str()))
        .filter(|surface| !opts.disabled_services.contains(surface))
        .collect();
    missing_surfaces.sort();

    let last_handoff = all_events
        .iter()
        .filter(|event| event.event_type() == Some("handoff"))
        .filter_map(|event| event.parsed_timestamp())
        .max();

    let handoff_stale = match last_handoff {
        None => true,
        Some(ts) => {
            let age_hours = (opts.now - ts).num_seconds() as f64 / 3600.0;
            age_hours > opts.window_hours
        }
    };

    GapReport {
        missing_surfaces,
        handoff_stale,
        handoff_last_seen: last_handoff.map(format_timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samara_types::parse_timestamp;
    use serde_json::json;

    fn record(timestamp: &str, surface: &str, event_type: &str, summary: &str) -> EventRecord {
        EventRecord::from_value(json!({
            "id": format!("evt_{timestamp}_{surface}"),
            "timestamp": timestamp,
            "surface": surface,
            "type": event_type,
            "direction": "inbound",
            "summary": summary,
            "distilled": false,
        }))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        parse_timestamp("2026-01-17T12:00:00Z").unwrap()
    }

    #[test]
    fn counts_cover_window_only() {
        let events = vec![
            record("2026-01-17T11:00:00Z", "cli", "interaction", "in window"),
            record("2026-01-01T11:00:00Z", "cli", "interaction", "out of window"),
        ];
        let report = audit_stream(&events, "", &AuditOptions::new(now()));
        assert_eq!(report.counts.total_events, 1);
        assert_eq!(report.counts.by_surface.get("cli"), Some(&1));
        assert_eq!(report.counts.by_direction.get("inbound"), Some(&1));
        assert_eq!(report.counts.undistilled_total, 2);
    }

    #[test]
    fn inclusion_is_case_insensitive() {
        let events = vec![
            record("2026-01-17T11:00:00Z", "cli", "interaction", "Implemented digest"),
            record("2026-01-17T11:05:00Z", "webhook", "sense", "never mentioned"),
        ];
        let digest = "## Recent Activity\n- **1h ago [Cli]** implemented DIGEST\n";
        let report = audit_stream(&events, digest, &AuditOptions::new(now()));

        assert_eq!(report.digest_inclusion.total.eligible, 2);
        assert_eq!(report.digest_inclusion.total.included, 1);
        assert_eq!(report.digest_inclusion.total.rate, Some(0.5));
        let cli = &report.digest_inclusion.by_surface["cli"];
        assert_eq!(cli.rate, Some(1.0));
    }

    #[test]
    fn empty_window_has_no_rate() {
        let report = audit_stream(&[], "digest", &AuditOptions::new(now()));
        assert_eq!(report.digest_inclusion.total.rate, None);
        assert_eq!(report.digest_inclusion.total.eligible, 0);
    }

    #[test]
    fn gaps_report_missing_surfaces_and_stale_handoffs() {
        let events = vec![record(
            "2026-01-17T11:00:00Z",
            "cli",
            "interaction",
            "only cli",
        )];
        let report = audit_stream(&events, "", &AuditOptions::new(now()));
        assert!(report
            .gaps
            .missing_surfaces
            .contains(&"imessage".to_string()));
        assert!(!report.gaps.missing_surfaces.contains(&"cli".to_string()));
        assert!(report.gaps.handoff_stale);
        assert!(report.gaps.handoff_last_seen.is_none());
    }

    #[test]
    fn recent_handoff_is_not_stale() {
        let events = vec![record(
            "2026-01-16T12:00:00Z",
            "system",
            "handoff",
            "session boundary",
        )];
        let report = audit_stream(&events, "", &AuditOptions::new(now()));
        assert!(!report.gaps.handoff_stale);
        assert_eq!(
            report.gaps.handoff_last_seen.as_deref(),
            Some("2026-01-16T12:00:00Z")
        );
    }

    #[test]
    fn disabled_services_are_excluded_from_gaps() {
        let mut opts = AuditOptions::new(now());
        opts.disabled_services = vec!["x".to_string(), "bluesky".to_string()];
        let report = audit_stream(&[], "", &opts);
        assert!(!report.gaps.missing_surfaces.contains(&"x".to_string()));
        assert!(!report
            .gaps
            .missing_surfaces
            .contains(&"bluesky".to_string()));
        assert!(report
            .gaps
            .missing_surfaces
            .contains(&"imessage".to_string()));
    }
}
