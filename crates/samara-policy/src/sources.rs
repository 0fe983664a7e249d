use serde::{Deserialize, Serialize};

use crate::triggers::Trigger;

/// One upcoming (or in-progress) calendar entry. `minutes_until <= 0`
/// means the event has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub minutes_until: i64,
}

/// A calendar-derived engagement hint with its own confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarTrigger {
    /// `upcoming_event` or `recently_ended`.
    pub kind: String,
    pub event: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Calendar helper seam. The real implementation reads a CalDAV
/// cache; tests substitute fixed data.
pub trait CalendarSource {
    /// Events starting within `hours` (0 returns events happening
    /// right now).
    fn upcoming_events(&self, hours: f64) -> Vec<CalendarEvent>;

    fn triggers(&self) -> Vec<CalendarTrigger>;

    fn recently_ended(&self, hours: f64) -> Vec<CalendarEvent>;
}

/// One semantic search hit from the external memory index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryHit {
    pub date: String,
    pub distance: f64,
    pub text: String,
}

/// Abstract semantic index seam (external vector backend).
pub trait MemorySearch {
    fn search(&self, query: &str, n_results: usize) -> Vec<MemoryHit>;
}

/// Location helper seam: forwarded triggers plus battery state.
pub trait LocationSource {
    fn location_triggers(&self) -> Vec<Trigger>;
    fn battery_triggers(&self) -> Vec<Trigger>;
}

/// Weather helper seam.
pub trait WeatherSource {
    fn weather_triggers(&self) -> Vec<Trigger>;
}

/// Context assembled for question synthesis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionContext {
    pub trigger: String,
    pub hour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_event: Option<String>,
}

/// A synthesized question candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionCandidate {
    pub question: String,
    pub category: String,
    pub confidence: f64,
}

/// Question synthesizer seam. Content generation is external; the
/// evaluator only consumes candidates above its confidence floor.
pub trait QuestionSource {
    fn synthesize(&self, context: &QuestionContext) -> Option<QuestionCandidate>;
}

/// Pluggable helper set for the trigger evaluator. Absent sources
/// simply contribute no triggers.
#[derive(Default)]
pub struct EvaluatorSources {
    pub calendar: Option<Box<dyn CalendarSource>>,
    pub memory: Option<Box<dyn MemorySearch>>,
    pub location: Option<Box<dyn LocationSource>>,
    pub weather: Option<Box<dyn WeatherSource>>,
    pub questions: Option<Box<dyn QuestionSource>>,
}
