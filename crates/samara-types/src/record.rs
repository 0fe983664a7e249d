use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::parse_timestamp;

/// Schema-on-read view of one stream line.
///
/// Queries never normalize events at read time: a line that decodes as
/// a JSON object is returned as-is, even if later schema validation
/// would reject it. Consumers read through typed accessors and decide
/// how strict to be.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord(Value);

impl EventRecord {
    /// Wrap a decoded line. Returns `None` unless the value is a JSON
    /// object.
    pub fn from_value(value: Value) -> Option<Self> {
        value.is_object().then_some(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.str_field("timestamp")
    }

    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp().and_then(parse_timestamp)
    }

    /// Date prefix (`YYYY-MM-DD`) of the timestamp, if long enough.
    pub fn date_prefix(&self) -> Option<&str> {
        let ts = self.timestamp()?;
        (ts.len() >= 10).then(|| &ts[..10])
    }

    pub fn surface(&self) -> Option<&str> {
        self.str_field("surface")
    }

    pub fn event_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn direction(&self) -> Option<&str> {
        self.str_field("direction")
    }

    pub fn summary(&self) -> Option<&str> {
        self.str_field("summary")
    }

    pub fn content(&self) -> Option<&str> {
        self.str_field("content")
    }

    pub fn distilled(&self) -> bool {
        self.0
            .get("distilled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Overwrite the in-memory distilled flag. The sidecar index is
    /// authoritative; the stored flag is only patched on the decoded
    /// copy, never on disk.
    pub fn set_distilled(&mut self, distilled: bool) {
        if let Some(obj) = self.0.as_object_mut() {
            obj.insert("distilled".to_string(), Value::Bool(distilled));
        }
    }
}

/// Sort key used by every consumer that needs a deterministic global
/// order: `(timestamp, id)`, both lexicographic.
pub fn sort_key(record: &EventRecord) -> (String, String) {
    (
        record.timestamp().unwrap_or_default().to_string(),
        record.id().unwrap_or_default().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> EventRecord {
        EventRecord::from_value(value).unwrap()
    }

    #[test]
    fn rejects_non_objects() {
        assert!(EventRecord::from_value(json!([1, 2])).is_none());
        assert!(EventRecord::from_value(json!("line")).is_none());
    }

    #[test]
    fn accessors_read_fields() {
        let rec = record(json!({
            "id": "evt_1_aaaa0000",
            "timestamp": "2026-01-17T10:00:00Z",
            "surface": "cli",
            "type": "interaction",
            "summary": "did a thing",
        }));
        assert_eq!(rec.id(), Some("evt_1_aaaa0000"));
        assert_eq!(rec.date_prefix(), Some("2026-01-17"));
        assert_eq!(rec.surface(), Some("cli"));
        assert!(!rec.distilled());
        assert!(rec.parsed_timestamp().is_some());
    }

    #[test]
    fn set_distilled_patches_decoded_copy() {
        let mut rec = record(json!({"id": "evt_1_aaaa0000"}));
        rec.set_distilled(true);
        assert!(rec.distilled());
    }

    #[test]
    fn sort_key_orders_by_timestamp_then_id() {
        let a = record(json!({"id": "evt_2_b", "timestamp": "2026-01-17T10:00:00Z"}));
        let b = record(json!({"id": "evt_1_a", "timestamp": "2026-01-17T10:00:00Z"}));
        let c = record(json!({"id": "evt_0_z", "timestamp": "2026-01-17T09:00:00Z"}));
        let mut records = vec![a.clone(), b.clone(), c.clone()];
        records.sort_by_key(sort_key);
        assert_eq!(records[0].id(), c.id());
        assert_eq!(records[1].id(), b.id());
        assert_eq!(records[2].id(), a.id());
    }
}
