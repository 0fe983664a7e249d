use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use samara_types::EventRecord;

/// Floor applied to the long-window rate when computing velocity, so
/// a quiet long window cannot blow the ratio up.
pub const VELOCITY_RATE_FLOOR: f64 = 0.5;

/// Trailing windows used by [`compute_event_metrics`], in hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricWindows {
    pub short_hours: f64,
    pub mid_hours: f64,
    pub long_hours: f64,
}

impl Default for MetricWindows {
    fn default() -> Self {
        Self {
            short_hours: 0.5,
            mid_hours: 2.0,
            long_hours: 12.0,
        }
    }
}

/// Rates, counts, and velocity over the trailing windows. Velocity is
/// the short-term rate over the (floored) long-term rate: above 1 the
/// stream is accelerating.
#[derive(Debug, Clone, Serialize)]
pub struct EventMetrics {
    pub short_count: usize,
    pub mid_count: usize,
    pub long_count: usize,
    pub short_rate: f64,
    pub mid_rate: f64,
    pub long_rate: f64,
    pub velocity: f64,
}

/// Count events whose timestamp falls within the trailing window.
/// Unparseable timestamps are ignored.
pub fn count_events_in_window(events: &[EventRecord], now: DateTime<Utc>, hours: f64) -> usize {
    if hours <= 0.0 {
        return 0;
    }
    let cutoff = now - Duration::seconds((hours * 3600.0) as i64);
    events
        .iter()
        .filter(|event| {
            event
                .parsed_timestamp()
                .map(|ts| ts >= cutoff)
                .unwrap_or(false)
        })
        .count()
}

/// Events per hour over a trailing window; 0 when the window is empty
/// or non-positive.
pub fn rate_per_hour(events: &[EventRecord], now: DateTime<Utc>, hours: f64) -> f64 {
    if hours <= 0.0 {
        return 0.0;
    }
    count_events_in_window(events, now, hours) as f64 / hours
}

/// Velocity as short-term rate over long-term rate, with the long
/// rate floored.
pub fn compute_velocity(short_rate: f64, long_rate: f64, floor: f64) -> f64 {
    short_rate / long_rate.max(floor)
}

/// Compute counts, rates, and velocity over the default (or given)
/// trailing windows.
pub fn compute_event_metrics(
    events: &[EventRecord],
    now: DateTime<Utc>,
    windows: MetricWindows,
) -> EventMetrics {
    let short_count = count_events_in_window(events, now, windows.short_hours);
    let mid_count = count_events_in_window(events, now, windows.mid_hours);
    let long_count = count_events_in_window(events, now, windows.long_hours);

    let short_rate = if windows.short_hours > 0.0 {
        short_count as f64 / windows.short_hours
    } else {
        0.0
    };
    let mid_rate = if windows.mid_hours > 0.0 {
        mid_count as f64 / windows.mid_hours
    } else {
        0.0
    };
    let long_rate = if windows.long_hours > 0.0 {
        long_count as f64 / windows.long_hours
    } else {
        0.0
    };

    EventMetrics {
        short_count,
        mid_count,
        long_count,
        short_rate,
        mid_rate,
        long_rate,
        velocity: compute_velocity(short_rate, long_rate, VELOCITY_RATE_FLOOR),
    }
}
