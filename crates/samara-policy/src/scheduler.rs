use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base wake schedule, local hours of day.
pub const BASE_WAKE_HOURS: [u32; 3] = [9, 14, 20];

/// Minimum interval between wakes, minutes.
pub const MIN_WAKE_INTERVAL_MIN: i64 = 60;

/// Confidence at or above which an off-schedule wake is a full cycle.
pub const EARLY_WAKE_THRESHOLD: f64 = 0.7;

const LIGHT_WAKE_THRESHOLD: f64 = 0.4;
const BASE_WAKE_SLACK_MIN: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeKind {
    Full,
    Light,
    None,
}

impl WakeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WakeKind::Full => "full",
            WakeKind::Light => "light",
            WakeKind::None => "none",
        }
    }
}

impl std::str::FromStr for WakeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(WakeKind::Full),
            "light" => Ok(WakeKind::Light),
            "none" => Ok(WakeKind::None),
            other => Err(format!("invalid wake type '{}'", other)),
        }
    }
}

/// Persisted scheduler state. `wake_count_today` resets when `date`
/// rolls over (local calendar day).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerState {
    pub last_wake: Option<String>,
    pub last_wake_type: Option<String>,
    pub wake_count_today: u32,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WakeDecision {
    pub should_wake: bool,
    pub wake_type: WakeKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextWake {
    pub next_scheduled: String,
    pub minutes_until: i64,
    pub current_confidence: f64,
    pub confidence_reason: String,
    pub may_wake_early: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub high_priority: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub should_wake: bool,
    pub wake_type: WakeKind,
    pub reason: String,
    pub last_wake: Option<String>,
    pub last_wake_type: Option<String>,
    pub wake_count_today: u32,
    pub next_scheduled: String,
    pub minutes_until_next: i64,
    pub queue_status: QueueStatus,
    pub upcoming_events: usize,
}

/// Decides whether a reasoning cycle should run now: base schedule
/// first, then a confidence score over queue, calendar, trigger, and
/// recency signals. Missing or malformed input files are treated as
/// empty.
#[derive(Debug)]
pub struct WakeScheduler {
    state_path: PathBuf,
    queue_path: PathBuf,
    triggers_path: PathBuf,
    calendar_path: PathBuf,
    base_hours: Vec<u32>,
    min_interval_min: i64,
    state: SchedulerState,
}

impl WakeScheduler {
    /// Open the scheduler over a state directory laid out as
    /// `state/scheduler-state.json`, `state/proactive-queue/queue.json`,
    /// `state/triggers/triggers.json`, `state/calendar-cache.json`.
    pub fn open(state_dir: &Path) -> Self {
        let state_path = state_dir.join("scheduler-state.json");
        let state = load_state(&state_path);
        Self {
            queue_path: state_dir.join("proactive-queue").join("queue.json"),
            triggers_path: state_dir.join("triggers").join("triggers.json"),
            calendar_path: state_dir.join("calendar-cache.json"),
            state_path,
            base_hours: BASE_WAKE_HOURS.to_vec(),
            min_interval_min: MIN_WAKE_INTERVAL_MIN,
            state,
        }
    }

    pub fn with_base_hours(mut self, hours: Vec<u32>) -> Self {
        self.base_hours = hours;
        self
    }

    pub fn with_min_interval(mut self, minutes: i64) -> Self {
        self.min_interval_min = minutes;
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Decide whether to wake right now (wall clock).
    pub fn should_wake_now(&mut self) -> WakeDecision {
        self.should_wake_now_at(Local::now())
    }

    pub fn should_wake_now_at(&mut self, now: DateTime<Local>) -> WakeDecision {
        self.reset_daily_counts(now);

        if let Some(minutes) = self.minutes_since_last_wake(now) {
            if minutes < self.min_interval_min as f64 {
                return WakeDecision {
                    should_wake: false,
                    wake_type: WakeKind::None,
                    reason: format!("Too soon since last wake ({} min ago)", minutes as i64),
                };
            }
        }

        for &hour in &self.base_hours {
            if let Some(wake_time) = local_at_hour(now.date_naive(), hour) {
                let diff = (now - wake_time).num_seconds().abs() / 60;
                if diff < BASE_WAKE_SLACK_MIN {
                    return WakeDecision {
                        should_wake: true,
                        wake_type: WakeKind::Full,
                        reason: format!("Scheduled {}:00 wake", hour),
                    };
                }
            }
        }

        let (confidence, reason) = self.wake_confidence(now);
        if confidence >= EARLY_WAKE_THRESHOLD {
            WakeDecision {
                should_wake: true,
                wake_type: WakeKind::Full,
                reason: format!("High confidence ({:.0}%): {}", confidence * 100.0, reason),
            }
        } else if confidence >= LIGHT_WAKE_THRESHOLD {
            WakeDecision {
                should_wake: true,
                wake_type: WakeKind::Light,
                reason: format!("Moderate confidence ({:.0}%): {}", confidence * 100.0, reason),
            }
        } else {
            WakeDecision {
                should_wake: false,
                wake_type: WakeKind::None,
                reason: format!("Low confidence ({:.0}%): {}", confidence * 100.0, reason),
            }
        }
    }

    /// Confidence in [0, 1] that an off-schedule wake is warranted,
    /// with a human-readable reason trail.
    pub fn wake_confidence(&self, now: DateTime<Local>) -> (f64, String) {
        let mut confidence: f64 = 0.0;
        let mut reasons: Vec<String> = Vec::new();

        let queue = self.queue_status();
        if queue.high_priority > 0 {
            confidence += 0.4;
            reasons.push(format!("{} high-priority messages", queue.high_priority));
        }

        let events = self.upcoming_calendar_events(now);
        if let Some(start) = events.first() {
            let minutes_until = (*start - now.with_timezone(&Utc)).num_seconds() / 60;
            if minutes_until < 30 {
                confidence += 0.5;
                reasons.push(format!("Event in {} minutes", minutes_until));
            } else if minutes_until < 60 {
                confidence += 0.3;
                reasons.push(format!("Event in {} minutes", minutes_until));
            }
        }

        if let Some(minutes) = self.minutes_since_last_wake(now) {
            if minutes > 180.0 {
                confidence += 0.2;
                reasons.push(format!("Last wake {} minutes ago", minutes as i64));
            }
        }

        let triggers = self.pending_triggers();
        if triggers >= 3 {
            confidence += 0.3;
            reasons.push(format!("{} pending triggers", triggers));
        }

        let reason = if reasons.is_empty() {
            "No urgent items".to_string()
        } else {
            reasons.join("; ")
        };
        (confidence.min(1.0), reason)
    }

    /// Record that a wake occurred and persist the state.
    pub fn record_wake(&mut self, wake_type: WakeKind) -> std::io::Result<()> {
        self.record_wake_at(wake_type, Local::now())
    }

    pub fn record_wake_at(
        &mut self,
        wake_type: WakeKind,
        now: DateTime<Local>,
    ) -> std::io::Result<()> {
        self.reset_daily_counts(now);
        self.state.last_wake = Some(now.to_rfc3339());
        self.state.last_wake_type = Some(wake_type.as_str().to_string());
        self.state.wake_count_today += 1;
        self.save_state()
    }

    pub fn next_wake_at(&self, now: DateTime<Local>) -> NextWake {
        let next = self.next_base_wake(now);
        let (confidence, reason) = self.wake_confidence(now);
        NextWake {
            next_scheduled: next.to_rfc3339(),
            minutes_until: (next - now).num_seconds() / 60,
            current_confidence: confidence,
            confidence_reason: reason,
            may_wake_early: confidence >= LIGHT_WAKE_THRESHOLD,
        }
    }

    pub fn status_at(&mut self, now: DateTime<Local>) -> SchedulerStatus {
        self.reset_daily_counts(now);
        let decision = self.should_wake_now_at(now);
        let next = self.next_wake_at(now);
        SchedulerStatus {
            should_wake: decision.should_wake,
            wake_type: decision.wake_type,
            reason: decision.reason,
            last_wake: self.state.last_wake.clone(),
            last_wake_type: self.state.last_wake_type.clone(),
            wake_count_today: self.state.wake_count_today,
            next_scheduled: next.next_scheduled,
            minutes_until_next: next.minutes_until,
            queue_status: self.queue_status(),
            upcoming_events: self.upcoming_calendar_events(now).len(),
        }
    }

    fn reset_daily_counts(&mut self, now: DateTime<Local>) {
        let today = now.format("%Y-%m-%d").to_string();
        if self.state.date != today {
            self.state.date = today;
            self.state.wake_count_today = 0;
            if let Err(err) = self.save_state() {
                tracing::warn!(
                    component = "wake-scheduler",
                    operation = "reset_daily_counts",
                    error = %err,
                    "failed to persist daily counter reset"
                );
            }
        }
    }

    fn save_state(&self) -> std::io::Result<()> {
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut payload =
            serde_json::to_string_pretty(&self.state).map_err(std::io::Error::other)?;
        payload.push('\n');
        samara_core::atomic_write(&self.state_path, payload.as_bytes())
            .map_err(|err| std::io::Error::other(err.to_string()))
    }

    fn minutes_since_last_wake(&self, now: DateTime<Local>) -> Option<f64> {
        let raw = self.state.last_wake.as_deref()?;
        let last = parse_local_timestamp(raw)?;
        Some((now - last).num_seconds() as f64 / 60.0)
    }

    fn next_base_wake(&self, now: DateTime<Local>) -> DateTime<Local> {
        for &hour in &self.base_hours {
            if let Some(wake_time) = local_at_hour(now.date_naive(), hour) {
                if wake_time > now {
                    return wake_time;
                }
            }
        }
        let first = self.base_hours.first().copied().unwrap_or(BASE_WAKE_HOURS[0]);
        local_at_hour(now.date_naive() + Duration::days(1), first).unwrap_or(now)
    }

    /// Queue state: pending items (no `sentAt`) and how many carry a
    /// `high` or `time_sensitive` priority.
    pub fn queue_status(&self) -> QueueStatus {
        let Some(items) = read_json_array(&self.queue_path) else {
            return QueueStatus::default();
        };
        let pending: Vec<&Value> = items
            .iter()
            .filter(|item| {
                item.get("sentAt")
                    .map(|sent| sent.is_null())
                    .unwrap_or(true)
            })
            .collect();
        let high_priority = pending
            .iter()
            .filter(|item| {
                matches!(
                    item.get("priority").and_then(Value::as_str),
                    Some("high") | Some("time_sensitive")
                )
            })
            .count();
        QueueStatus {
            pending: pending.len(),
            high_priority,
        }
    }

    fn pending_triggers(&self) -> usize {
        read_json_array(&self.triggers_path)
            .map(|items| items.len())
            .unwrap_or(0)
    }

    /// Calendar events starting within the next two hours, soonest
    /// first (UTC instants).
    fn upcoming_calendar_events(&self, now: DateTime<Local>) -> Vec<DateTime<Utc>> {
        let raw = match std::fs::read_to_string(&self.calendar_path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            return Vec::new();
        };
        let Some(events) = value.get("events").and_then(Value::as_array) else {
            return Vec::new();
        };

        let now_utc = now.with_timezone(&Utc);
        let horizon = now_utc + Duration::hours(2);
        let mut upcoming: Vec<DateTime<Utc>> = events
            .iter()
            .filter_map(|event| event.get("start").and_then(Value::as_str))
            .filter_map(|start| {
                DateTime::parse_from_rfc3339(start)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
            .filter(|start| *start > now_utc && *start < horizon)
            .collect();
        upcoming.sort();
        upcoming
    }
}

fn load_state(path: &Path) -> SchedulerState {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return default_state(),
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        tracing::warn!(
            component = "wake-scheduler",
            path = %path.display(),
            error = %err,
            "malformed scheduler state, starting fresh"
        );
        default_state()
    })
}

fn default_state() -> SchedulerState {
    SchedulerState {
        date: Local::now().format("%Y-%m-%d").to_string(),
        ..SchedulerState::default()
    }
}

fn read_json_array(path: &Path) -> Option<Vec<Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Clock parse failures on stored state are treated as "never woke".
fn parse_local_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local));
    }
    let naive = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).single()
}

fn local_at_hour(date: NaiveDate, hour: u32) -> Option<DateTime<Local>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .single()
        .or_else(|| Local.from_local_datetime(&naive).earliest())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn scheduler(dir: &Path) -> WakeScheduler {
        WakeScheduler::open(dir)
    }

    #[test]
    fn cooldown_blocks_even_at_base_hour() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path());
        let now = local(2026, 1, 16, 14, 5);
        sched
            .record_wake_at(WakeKind::Full, now - Duration::minutes(30))
            .unwrap();

        let decision = sched.should_wake_now_at(now);
        assert!(!decision.should_wake);
        assert_eq!(decision.wake_type, WakeKind::None);
        assert!(decision.reason.starts_with("Too soon"));
    }

    #[test]
    fn base_schedule_wakes_after_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path());
        let now = local(2026, 1, 16, 14, 5);
        sched
            .record_wake_at(WakeKind::Full, now - Duration::minutes(120))
            .unwrap();

        let decision = sched.should_wake_now_at(now);
        assert!(decision.should_wake);
        assert_eq!(decision.wake_type, WakeKind::Full);
        assert!(decision.reason.starts_with("Scheduled 14:00"));
    }

    #[test]
    fn never_woke_at_base_hour_is_full_wake() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path());
        let decision = sched.should_wake_now_at(local(2026, 1, 16, 9, 10));
        assert!(decision.should_wake);
        assert_eq!(decision.wake_type, WakeKind::Full);
        assert_eq!(decision.reason, "Scheduled 9:00 wake");
    }

    #[test]
    fn quiet_off_schedule_hour_does_not_wake() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path());
        let decision = sched.should_wake_now_at(local(2026, 1, 16, 11, 30));
        assert!(!decision.should_wake);
        assert!(decision.reason.starts_with("Low confidence"));
        assert!(decision.reason.contains("No urgent items"));
    }

    #[test]
    fn high_priority_queue_and_stale_wake_reach_light_threshold() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("proactive-queue")).unwrap();
        std::fs::write(
            dir.path().join("proactive-queue/queue.json"),
            r#"[{"priority": "high"}, {"priority": "low", "sentAt": "2026-01-16T08:00:00"}]"#,
        )
        .unwrap();

        let mut sched = scheduler(dir.path());
        let now = local(2026, 1, 16, 11, 30);
        sched
            .record_wake_at(WakeKind::Full, now - Duration::minutes(200))
            .unwrap();

        // +0.4 queue, +0.2 stale last wake = 0.6 -> light
        let decision = sched.should_wake_now_at(now);
        assert!(decision.should_wake);
        assert_eq!(decision.wake_type, WakeKind::Light);
        assert!(decision.reason.contains("1 high-priority messages"));
        assert!(decision.reason.contains("minutes ago"));
    }

    #[test]
    fn imminent_event_pushes_to_full_wake() {
        let dir = tempfile::tempdir().unwrap();
        let now = local(2026, 1, 16, 11, 30);
        let start = (now + Duration::minutes(20)).with_timezone(&Utc);
        std::fs::write(
            dir.path().join("calendar-cache.json"),
            format!(
                r#"{{"events": [{{"summary": "standup", "start": "{}"}}]}}"#,
                start.to_rfc3339()
            ),
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("proactive-queue")).unwrap();
        std::fs::write(
            dir.path().join("proactive-queue/queue.json"),
            r#"[{"priority": "time_sensitive"}]"#,
        )
        .unwrap();

        // +0.5 event soon, +0.4 queue = 0.9 -> full
        let mut sched = scheduler(dir.path());
        let decision = sched.should_wake_now_at(now);
        assert!(decision.should_wake);
        assert_eq!(decision.wake_type, WakeKind::Full);
        assert!(decision.reason.starts_with("High confidence (90%)"));
        assert!(decision.reason.contains("Event in"));
    }

    #[test]
    fn pending_triggers_contribute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("triggers")).unwrap();
        std::fs::write(
            dir.path().join("triggers/triggers.json"),
            r#"[{"a":1},{"b":2},{"c":3}]"#,
        )
        .unwrap();

        let sched = scheduler(dir.path());
        let (confidence, reason) = sched.wake_confidence(local(2026, 1, 16, 11, 30));
        assert!((confidence - 0.3).abs() < 1e-9);
        assert!(reason.contains("3 pending triggers"));
    }

    #[test]
    fn malformed_inputs_are_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("proactive-queue")).unwrap();
        std::fs::write(dir.path().join("proactive-queue/queue.json"), "{oops").unwrap();
        std::fs::write(dir.path().join("calendar-cache.json"), "not json").unwrap();
        std::fs::write(
            dir.path().join("scheduler-state.json"),
            r#"{"last_wake": 17}"#,
        )
        .unwrap();

        let sched = scheduler(dir.path());
        let (confidence, reason) = sched.wake_confidence(local(2026, 1, 16, 11, 30));
        assert_eq!(confidence, 0.0);
        assert_eq!(reason, "No urgent items");
    }

    #[test]
    fn daily_counters_reset_on_rollover() {
        let dir = tempfile::tempdir().unwrap();
        let mut sched = scheduler(dir.path());
        sched
            .record_wake_at(WakeKind::Full, local(2026, 1, 16, 9, 0))
            .unwrap();
        sched
            .record_wake_at(WakeKind::Light, local(2026, 1, 16, 14, 0))
            .unwrap();
        assert_eq!(sched.state().wake_count_today, 2);

        sched
            .record_wake_at(WakeKind::Full, local(2026, 1, 17, 9, 0))
            .unwrap();
        assert_eq!(sched.state().wake_count_today, 1);
        assert_eq!(sched.state().date, "2026-01-17");

        // State survives a reopen.
        let reopened = scheduler(dir.path());
        assert_eq!(reopened.state().wake_count_today, 1);
        assert_eq!(reopened.state().last_wake_type.as_deref(), Some("full"));
    }

    #[test]
    fn next_wake_points_at_upcoming_base_hour() {
        let dir = tempfile::tempdir().unwrap();
        let sched = scheduler(dir.path());
        let next = sched.next_wake_at(local(2026, 1, 16, 11, 30));
        assert!(next.next_scheduled.contains("T14:00:00"));
        assert_eq!(next.minutes_until, 150);
        assert!(!next.may_wake_early);

        let after_hours = sched.next_wake_at(local(2026, 1, 16, 21, 0));
        assert!(after_hours.next_scheduled.contains("2026-01-17T09:00:00"));
    }
}
