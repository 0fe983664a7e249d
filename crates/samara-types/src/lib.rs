mod record;
mod time;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use record::{sort_key, EventRecord};
pub use time::{format_time_ago, format_timestamp, parse_timestamp};

/// Schema version written into every event line.
pub const SCHEMA_VERSION: &str = "1";

/// Input surface — where a piece of information originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Cli,
    Imessage,
    Wake,
    Dream,
    Webhook,
    X,
    Bluesky,
    Email,
    Calendar,
    Location,
    Sense,
    System,
}

impl Surface {
    pub const ALL: [Surface; 12] = [
        Surface::Cli,
        Surface::Imessage,
        Surface::Wake,
        Surface::Dream,
        Surface::Webhook,
        Surface::X,
        Surface::Bluesky,
        Surface::Email,
        Surface::Calendar,
        Surface::Location,
        Surface::Sense,
        Surface::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Cli => "cli",
            Surface::Imessage => "imessage",
            Surface::Wake => "wake",
            Surface::Dream => "dream",
            Surface::Webhook => "webhook",
            Surface::X => "x",
            Surface::Bluesky => "bluesky",
            Surface::Email => "email",
            Surface::Calendar => "calendar",
            Surface::Location => "location",
            Surface::Sense => "sense",
            Surface::System => "system",
        }
    }

    /// Bullet label used by the digest: the raw value with the first
    /// letter upper-cased (`imessage` renders as `Imessage`).
    pub fn bullet_label(&self) -> &'static str {
        match self {
            Surface::Cli => "Cli",
            Surface::Imessage => "Imessage",
            Surface::Wake => "Wake",
            Surface::Dream => "Dream",
            Surface::Webhook => "Webhook",
            Surface::X => "X",
            Surface::Bluesky => "Bluesky",
            Surface::Email => "Email",
            Surface::Calendar => "Calendar",
            Surface::Location => "Location",
            Surface::Sense => "Sense",
            Surface::System => "System",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Surface::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownVariant::new("surface", s, &Surface::ALL.map(|v| v.as_str())))
    }
}

/// Type of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// User exchange on any surface.
    Interaction,
    /// External input detected by a satellite.
    Sense,
    /// Internal system event.
    System,
    /// Session boundary marker.
    Handoff,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Interaction,
        EventType::Sense,
        EventType::System,
        EventType::Handoff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Interaction => "interaction",
            EventType::Sense => "sense",
            EventType::System => "system",
            EventType::Handoff => "handoff",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownVariant::new("type", s, &EventType::ALL.map(|v| v.as_str())))
    }
}

/// Direction of the event relative to the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
    Internal,
}

impl Direction {
    pub const ALL: [Direction; 3] = [
        Direction::Inbound,
        Direction::Outbound,
        Direction::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
            Direction::Internal => "internal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownVariant::new("direction", s, &Direction::ALL.map(|v| v.as_str())))
    }
}

/// Error for enum parsing from CLI or file input. Carries the valid
/// value list so callers can print actionable diagnostics.
#[derive(Debug, Clone)]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
    pub valid: Vec<&'static str>,
}

impl UnknownVariant {
    fn new(field: &'static str, value: &str, valid: &[&'static str]) -> Self {
        Self {
            field,
            value: value.to_string(),
            valid: valid.to_vec(),
        }
    }
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}' (valid: {})",
            self.field,
            self.value,
            self.valid.join(", ")
        )
    }
}

impl std::error::Error for UnknownVariant {}

/// A single event in the unified stream (write model).
///
/// Immutable once appended. `session_id` and `content` are serialized
/// as explicit nulls so every line carries the full field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub schema_version: String,
    pub id: String,
    pub timestamp: String,
    pub surface: Surface,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub direction: Direction,
    pub summary: String,
    #[serde(default)]
    pub distilled: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Event {
    /// Create an event stamped with the current UTC wall clock.
    pub fn new(
        surface: Surface,
        event_type: EventType,
        direction: Direction,
        summary: impl Into<String>,
    ) -> Self {
        Self::new_at(surface, event_type, direction, summary, Utc::now())
    }

    /// Create an event with an explicit clock, for deterministic tests
    /// and backdated writes.
    pub fn new_at(
        surface: Surface,
        event_type: EventType,
        direction: Direction,
        summary: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            id: generate_event_id(now),
            timestamp: format_timestamp(now),
            surface,
            event_type,
            direction,
            summary: summary.into(),
            distilled: false,
            session_id: None,
            content: None,
            metadata: Map::new(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Generate a unique event ID: `evt_<unix_seconds>_<8_hex>`.
pub fn generate_event_id(now: DateTime<Utc>) -> String {
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!("evt_{}_{}", now.timestamp(), suffix)
}
