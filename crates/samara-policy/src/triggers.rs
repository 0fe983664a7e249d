use serde::{Deserialize, Serialize};

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Pattern,
    Calendar,
    Anomaly,
    CrossTemporal,
    Location,
    Battery,
    Weather,
    Question,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Pattern => "pattern",
            TriggerKind::Calendar => "calendar",
            TriggerKind::Anomaly => "anomaly",
            TriggerKind::CrossTemporal => "cross_temporal",
            TriggerKind::Location => "location",
            TriggerKind::Battery => "battery",
            TriggerKind::Weather => "weather",
            TriggerKind::Question => "question",
        }
    }
}

/// One candidate reason to engage, with a confidence in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    pub confidence: f64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_message: Option<String>,
    /// Location triggers may suppress the whole evaluation (e.g. the
    /// collaborator is in motion).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suppress_engagement: bool,
    /// Battery triggers may flag that non-urgent messages should be
    /// held without blocking evaluation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suppress_non_urgent: bool,
}

impl Trigger {
    pub fn new(kind: TriggerKind, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            confidence,
            reason: reason.into(),
            suggested_message: None,
            suppress_engagement: false,
            suppress_non_urgent: false,
        }
    }
}

/// Action band for an evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    Log,
    Dream,
    Wake,
    Engage,
    Suppressed,
    Blocked,
}

impl Escalation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Escalation::Log => "log",
            Escalation::Dream => "dream",
            Escalation::Wake => "wake",
            Escalation::Engage => "engage",
            Escalation::Suppressed => "suppressed",
            Escalation::Blocked => "blocked",
        }
    }
}

/// Band a confidence into an escalation level:
/// `< 0.3` log, `< 0.6` dream, `< 0.8` wake, `>= 0.8` engage.
pub fn escalation_for(confidence: f64) -> Escalation {
    if confidence < 0.3 {
        Escalation::Log
    } else if confidence < 0.6 {
        Escalation::Dream
    } else if confidence < 0.8 {
        Escalation::Wake
    } else {
        Escalation::Engage
    }
}
