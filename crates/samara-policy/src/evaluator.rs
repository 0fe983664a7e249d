use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Local};
use serde::Serialize;
use serde_json::{json, Value};

use crate::sources::{CalendarTrigger, EvaluatorSources, QuestionContext};
use crate::triggers::{escalation_for, Escalation, Trigger, TriggerKind};

const COOLDOWN_MINUTES: i64 = 60;
const QUIET_HOUR_START: u32 = 23;
const QUIET_HOUR_END: u32 = 7;
const RECENT_INTERACTION_HOURS: i64 = 2;
const QUESTION_CONFIDENCE_FLOOR: f64 = 0.6;
const CONTEXT_TRIGGER_LIMIT: usize = 5;

/// Outcome of the ordered safeguard pass. Checks stop at the first
/// failure, so `checks` only carries the safeguards that ran.
#[derive(Debug, Clone, Serialize)]
pub struct SafeguardStatus {
    pub all_passed: bool,
    pub blocking_reason: Option<String>,
    pub checks: BTreeMap<String, bool>,
    pub low_battery: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationDecision {
    pub should_engage: bool,
    pub confidence: f64,
    pub reason: String,
    pub trigger_type: Option<String>,
    pub suggested_message: Option<String>,
    pub escalation_level: Escalation,
    pub safeguard_status: SafeguardStatus,
    /// Top triggers, highest confidence first, for context injection.
    pub all_triggers: Vec<Trigger>,
}

/// Fuses pattern, calendar, anomaly, cross-temporal, location,
/// battery, weather, and question signals into one engagement
/// decision behind an ordered safeguard chain.
pub struct TriggerEvaluator {
    state_dir: PathBuf,
    episodes_dir: PathBuf,
    sources: EvaluatorSources,
}

impl TriggerEvaluator {
    pub fn new(state_dir: impl Into<PathBuf>, episodes_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            episodes_dir: episodes_dir.into(),
            sources: EvaluatorSources::default(),
        }
    }

    pub fn with_sources(mut self, sources: EvaluatorSources) -> Self {
        self.sources = sources;
        self
    }

    /// Run a full evaluation at the wall clock.
    pub fn evaluate(&self) -> EvaluationDecision {
        self.evaluate_at(Local::now())
    }

    pub fn evaluate_at(&self, now: DateTime<Local>) -> EvaluationDecision {
        let mut safeguards = self.check_safeguards(now);
        if !safeguards.all_passed {
            return EvaluationDecision {
                should_engage: false,
                confidence: 0.0,
                reason: safeguards
                    .blocking_reason
                    .clone()
                    .unwrap_or_else(|| "Blocked".to_string()),
                trigger_type: None,
                suggested_message: None,
                escalation_level: Escalation::Blocked,
                safeguard_status: safeguards,
                all_triggers: Vec::new(),
            };
        }

        let mut triggers: Vec<Trigger> = Vec::new();
        triggers.extend(self.pattern_triggers(now));
        triggers.extend(self.calendar_triggers());
        triggers.extend(self.anomaly_triggers());
        triggers.extend(self.cross_temporal_triggers(now));

        if let Some(location) = &self.sources.location {
            let location_triggers = location.location_triggers();
            if let Some(suppressor) = location_triggers
                .iter()
                .find(|trigger| trigger.suppress_engagement)
            {
                return EvaluationDecision {
                    should_engage: false,
                    confidence: 0.0,
                    reason: suppressor.reason.clone(),
                    trigger_type: Some(TriggerKind::Location.as_str().to_string()),
                    suggested_message: None,
                    escalation_level: Escalation::Suppressed,
                    safeguard_status: safeguards,
                    all_triggers: Vec::new(),
                };
            }
            triggers.extend(location_triggers);

            let battery_triggers = location.battery_triggers();
            if battery_triggers
                .iter()
                .any(|trigger| trigger.suppress_non_urgent)
            {
                safeguards.low_battery = true;
            }
            triggers.extend(battery_triggers);
        }

        if let Some(weather) = &self.sources.weather {
            triggers.extend(weather.weather_triggers());
        }
        triggers.extend(self.question_triggers(now));

        if triggers.is_empty() {
            return EvaluationDecision {
                should_engage: false,
                confidence: 0.0,
                reason: "No triggers detected".to_string(),
                trigger_type: None,
                suggested_message: None,
                escalation_level: Escalation::Log,
                safeguard_status: safeguards,
                all_triggers: Vec::new(),
            };
        }

        // Stable sort keeps insertion order on confidence ties.
        triggers.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = triggers[0].clone();
        let escalation = escalation_for(best.confidence);

        self.log_evaluation(now, &triggers, &best, escalation);

        triggers.truncate(CONTEXT_TRIGGER_LIMIT);
        EvaluationDecision {
            should_engage: escalation == Escalation::Engage,
            confidence: best.confidence,
            reason: best.reason.clone(),
            trigger_type: Some(best.kind.as_str().to_string()),
            suggested_message: best.suggested_message.clone(),
            escalation_level: escalation,
            safeguard_status: safeguards,
            all_triggers: triggers,
        }
    }

    /// Ordered safeguard chain; the first failure short-circuits with
    /// its reason.
    pub fn check_safeguards(&self, now: DateTime<Local>) -> SafeguardStatus {
        let checks: [(&'static str, Box<dyn Fn() -> Option<String> + '_>); 4] = [
            (
                "quiet_hours",
                Box::new(move || {
                    let hour = chrono::Timelike::hour(&now);
                    (hour >= QUIET_HOUR_START || hour < QUIET_HOUR_END).then(|| {
                        format!("Quiet hours ({}:00 - {}:00)", QUIET_HOUR_START, QUIET_HOUR_END)
                    })
                }),
            ),
            ("cooldown", Box::new(move || self.cooldown_failure(now))),
            (
                "no_recent_interaction",
                Box::new(move || {
                    self.recent_interaction(now)
                        .then(|| "Recent conversation activity".to_string())
                }),
            ),
            (
                "not_in_meeting",
                Box::new(move || {
                    self.in_meeting()
                        .then(|| "Collaborator appears to be in a meeting".to_string())
                }),
            ),
        ];

        let mut status = SafeguardStatus {
            all_passed: true,
            blocking_reason: None,
            checks: BTreeMap::new(),
            low_battery: false,
        };

        for (name, check) in checks {
            match check() {
                None => {
                    status.checks.insert(name.to_string(), true);
                }
                Some(reason) => {
                    status.checks.insert(name.to_string(), false);
                    status.all_passed = false;
                    status.blocking_reason = Some(reason);
                    break;
                }
            }
        }

        status
    }

    fn cooldown_failure(&self, now: DateTime<Local>) -> Option<String> {
        let raw = std::fs::read_to_string(self.last_trigger_file()).ok()?;
        let last: i64 = raw.trim().parse().ok()?;
        let elapsed_min = (now.timestamp() - last) / 60;
        if elapsed_min < COOLDOWN_MINUTES {
            Some(format!(
                "Cooldown active ({} min remaining)",
                COOLDOWN_MINUTES - elapsed_min
            ))
        } else {
            None
        }
    }

    fn recent_interaction(&self, now: DateTime<Local>) -> bool {
        let episode_file = self.episode_file(now);
        let Ok(content) = std::fs::read_to_string(episode_file) else {
            return false;
        };
        for hour_offset in 0..=RECENT_INTERACTION_HOURS {
            let check_time = now - Duration::hours(hour_offset);
            let marker = format!("## {}:", check_time.format("%H"));
            if content.contains(&marker) {
                return true;
            }
        }
        false
    }

    fn in_meeting(&self) -> bool {
        let Some(calendar) = &self.sources.calendar else {
            return false;
        };
        calendar
            .upcoming_events(0.0)
            .iter()
            .any(|event| event.minutes_until <= 0)
    }

    fn pattern_triggers(&self, now: DateTime<Local>) -> Vec<Trigger> {
        let Some(patterns) = self.load_patterns() else {
            return Vec::new();
        };
        let mut triggers = Vec::new();

        let temporal = &patterns["temporal"];
        let active_hours: Vec<u32> = temporal["active_hours"]
            .as_array()
            .map(|hours| {
                hours
                    .iter()
                    .filter_map(Value::as_u64)
                    .map(|hour| hour as u32)
                    .collect()
            })
            .unwrap_or_default();

        if active_hours.contains(&chrono::Timelike::hour(&now)) {
            let today_messages = patterns["anomalies"]["today_status"]["messages"]
                .as_f64()
                .unwrap_or(0.0);
            let avg_messages = temporal["avg_messages_per_day"].as_f64().unwrap_or(0.0);
            if avg_messages > 0.0 && today_messages < avg_messages * 0.3 {
                triggers.push(Trigger::new(
                    TriggerKind::Pattern,
                    0.4,
                    format!(
                        "Quieter than usual ({} messages vs {:.0} avg)",
                        today_messages as i64, avg_messages
                    ),
                ));
            }
        }

        if let Some(top_theme) = patterns["topics"]["recurring_themes"]
            .as_array()
            .and_then(|themes| themes.first())
        {
            if top_theme["days_present"].as_i64().unwrap_or(0) >= 5 {
                triggers.push(Trigger::new(
                    TriggerKind::Pattern,
                    0.3,
                    format!(
                        "Recurring theme: {}",
                        top_theme["topic"].as_str().unwrap_or("unknown")
                    ),
                ));
            }
        }

        triggers
    }

    fn calendar_triggers(&self) -> Vec<Trigger> {
        let Some(calendar) = &self.sources.calendar else {
            return Vec::new();
        };
        calendar
            .triggers()
            .into_iter()
            .map(|source_trigger| {
                let mut trigger = Trigger::new(
                    TriggerKind::Calendar,
                    source_trigger.confidence,
                    source_trigger
                        .suggested_action
                        .clone()
                        .unwrap_or_else(|| "Calendar event".to_string()),
                );
                trigger.suggested_message = generate_calendar_message(&source_trigger);
                trigger
            })
            .collect()
    }

    fn anomaly_triggers(&self) -> Vec<Trigger> {
        let Some(patterns) = self.load_patterns() else {
            return Vec::new();
        };
        let Some(anomalies) = patterns["anomalies"]["anomalies"].as_array() else {
            return Vec::new();
        };
        anomalies
            .iter()
            .map(|anomaly| {
                let confidence = match anomaly["severity"].as_str().unwrap_or("low") {
                    "high" => 0.7,
                    "medium" => 0.5,
                    _ => 0.3,
                };
                Trigger::new(
                    TriggerKind::Anomaly,
                    confidence,
                    anomaly["description"]
                        .as_str()
                        .unwrap_or("Unusual pattern")
                        .to_string(),
                )
            })
            .collect()
    }

    fn cross_temporal_triggers(&self, now: DateTime<Local>) -> Vec<Trigger> {
        let Some(memory) = &self.sources.memory else {
            return Vec::new();
        };
        let Ok(content) = std::fs::read_to_string(self.episode_file(now)) else {
            return Vec::new();
        };
        let snippet: String = content.chars().take(1000).collect();
        let today = now.format("%Y-%m-%d").to_string();

        memory
            .search(&snippet, 5)
            .into_iter()
            .filter(|hit| hit.date != today && hit.distance < 0.3)
            .map(|hit| {
                Trigger::new(
                    TriggerKind::CrossTemporal,
                    0.5,
                    format!("Today's conversation relates to {}", hit.date),
                )
            })
            .collect()
    }

    fn question_triggers(&self, now: DateTime<Local>) -> Vec<Trigger> {
        let Some(questions) = &self.sources.questions else {
            return Vec::new();
        };

        let mut context = QuestionContext {
            trigger: "check_triggers".to_string(),
            hour: chrono::Timelike::hour(&now),
            current_place: None,
            recent_event: None,
        };
        if let Some(calendar) = &self.sources.calendar {
            if let Some(ended) = calendar.recently_ended(1.0).first() {
                context.recent_event = Some(ended.summary.clone());
                context.trigger = "calendar_ended".to_string();
            }
        }

        let Some(candidate) = questions.synthesize(&context) else {
            return Vec::new();
        };
        if candidate.confidence < QUESTION_CONFIDENCE_FLOOR {
            return Vec::new();
        }

        let mut trigger = Trigger::new(
            TriggerKind::Question,
            candidate.confidence,
            format!("Proactive question opportunity ({})", candidate.category),
        );
        trigger.suggested_message = Some(candidate.question);
        vec![trigger]
    }

    /// Record a proactive engagement (starts the cooldown clock).
    pub fn record_engagement(&self, now: DateTime<Local>) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.state_dir)?;
        samara_core::atomic_write(
            &self.last_trigger_file(),
            now.timestamp().to_string().as_bytes(),
        )
        .map_err(|err| std::io::Error::other(err.to_string()))
    }

    /// Summary of the last ten evaluations for dream/wake context.
    pub fn escalation_summary(&self) -> String {
        let Ok(raw) = std::fs::read_to_string(self.evaluations_file()) else {
            return "No trigger evaluations recorded yet.".to_string();
        };
        let evaluations: Vec<Value> = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let recent = &evaluations[evaluations.len().saturating_sub(10)..];
        if recent.is_empty() {
            return "No trigger evaluations recorded yet.".to_string();
        }

        let high_confidence = recent
            .iter()
            .filter(|entry| {
                entry["best_trigger"]["confidence"].as_f64().unwrap_or(0.0) >= 0.6
            })
            .count();
        let engaged = recent
            .iter()
            .filter(|entry| entry["escalation"].as_str() == Some("engage"))
            .count();
        format!(
            "Recent triggers: {} evaluations, {} high-confidence, {} engagements",
            recent.len(),
            high_confidence,
            engaged
        )
    }

    fn log_evaluation(
        &self,
        now: DateTime<Local>,
        triggers: &[Trigger],
        best: &Trigger,
        escalation: Escalation,
    ) {
        let entry = json!({
            "timestamp": now.to_rfc3339(),
            "trigger_count": triggers.len(),
            "best_trigger": {
                "type": best.kind.as_str(),
                "confidence": best.confidence,
                "reason": best.reason,
            },
            "escalation": escalation.as_str(),
        });
        let line = format!("{}\n", entry);
        if std::fs::create_dir_all(&self.state_dir).is_err() {
            return;
        }
        if let Err(err) = samara_core::locked_append(&self.evaluations_file(), line.as_bytes()) {
            tracing::warn!(
                component = "trigger-evaluator",
                operation = "log_evaluation",
                error = %err,
                "failed to append evaluation log"
            );
        }
    }

    fn load_patterns(&self) -> Option<Value> {
        let raw = std::fs::read_to_string(self.state_dir.join("patterns.json")).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn episode_file(&self, now: DateTime<Local>) -> PathBuf {
        self.episodes_dir
            .join(format!("{}.md", now.format("%Y-%m-%d")))
    }

    fn last_trigger_file(&self) -> PathBuf {
        self.state_dir.join("last-proactive-trigger.txt")
    }

    fn evaluations_file(&self) -> PathBuf {
        self.state_dir.join("trigger-evaluations.jsonl")
    }
}

fn generate_calendar_message(trigger: &CalendarTrigger) -> Option<String> {
    match trigger.kind.as_str() {
        "upcoming_event" => {
            let minutes = trigger.minutes_until.unwrap_or(60);
            if minutes < 30 {
                Some(format!(
                    "Your {} is coming up in about {} minutes. Need any prep?",
                    trigger.event, minutes
                ))
            } else {
                Some(format!(
                    "I noticed you have {} coming up. Want me to pull up any relevant context?",
                    trigger.event
                ))
            }
        }
        "recently_ended" => Some(format!("How did {} go?", trigger.event)),
        _ => None,
    }
}
