use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use samara_types::{parse_timestamp, Direction, EventType, Surface};

const REQUIRED_STRING_FIELDS: [&str; 7] = [
    "schema_version",
    "id",
    "timestamp",
    "surface",
    "type",
    "direction",
    "summary",
];

const OPTIONAL_STRING_FIELDS: [&str; 2] = ["session_id", "content"];

/// One reported problem from [`validate_stream_file`]: either a line
/// that failed to decode (`error`) or a decoded event with schema
/// failures (`errors`).
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Validate a decoded event against the schema. Returns every error
/// found, empty when the event is valid.
pub fn validate_event(event: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let Some(obj) = event.as_object() else {
        return vec!["event is not an object".to_string()];
    };

    for field in REQUIRED_STRING_FIELDS {
        match obj.get(field) {
            None => errors.push(format!("missing field: {}", field)),
            Some(value) if !value.is_string() => errors.push(format!(
                "invalid type for {}: expected string, got {}",
                field,
                json_type_name(value)
            )),
            Some(_) => {}
        }
    }

    match obj.get("distilled") {
        None => errors.push("missing field: distilled".to_string()),
        Some(value) if !value.is_boolean() => errors.push(format!(
            "invalid type for distilled: expected bool, got {}",
            json_type_name(value)
        )),
        Some(_) => {}
    }

    if let Some(surface) = obj.get("surface").and_then(Value::as_str) {
        if Surface::from_str(surface).is_err() {
            errors.push(format!("invalid surface: {}", surface));
        }
    }
    if let Some(event_type) = obj.get("type").and_then(Value::as_str) {
        if EventType::from_str(event_type).is_err() {
            errors.push(format!("invalid type: {}", event_type));
        }
    }
    if let Some(direction) = obj.get("direction").and_then(Value::as_str) {
        if Direction::from_str(direction).is_err() {
            errors.push(format!("invalid direction: {}", direction));
        }
    }

    if let Some(timestamp) = obj.get("timestamp").and_then(Value::as_str) {
        if parse_timestamp(timestamp).is_none() {
            errors.push("invalid timestamp format".to_string());
        }
    }

    for field in OPTIONAL_STRING_FIELDS {
        if let Some(value) = obj.get(field) {
            if !value.is_null() && !value.is_string() {
                errors.push(format!(
                    "invalid type for {}: expected string, got {}",
                    field,
                    json_type_name(value)
                ));
            }
        }
    }
    if let Some(metadata) = obj.get("metadata") {
        if !metadata.is_null() && !metadata.is_object() {
            errors.push(format!(
                "invalid type for metadata: expected object, got {}",
                json_type_name(metadata)
            ));
        }
    }

    errors
}

/// Validate one JSONL stream file. Returns the issue list and the
/// number of non-blank lines counted. A missing file validates clean.
pub fn validate_stream_file(path: &Path) -> std::io::Result<(Vec<ValidationIssue>, usize)> {
    let mut issues = Vec::new();
    let mut total = 0;

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok((issues, total)),
        Err(err) => return Err(err),
    };

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        total += 1;

        let event: Value = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(err) => {
                issues.push(ValidationIssue {
                    line: line_number,
                    id: None,
                    error: Some(format!("invalid json: {}", err)),
                    errors: Vec::new(),
                    file: None,
                });
                continue;
            }
        };

        let errors = validate_event(&event);
        if !errors.is_empty() {
            issues.push(ValidationIssue {
                line: line_number,
                id: event
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                error: None,
                errors,
                file: None,
            });
        }
    }

    Ok((issues, total))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_event() -> Value {
        json!({
            "schema_version": "1",
            "id": "evt_1_abcd1234",
            "timestamp": "2026-01-17T10:00:00Z",
            "surface": "cli",
            "type": "interaction",
            "direction": "inbound",
            "summary": "Test event",
            "distilled": false,
            "session_id": null,
            "content": null,
            "metadata": {}
        })
    }

    #[test]
    fn valid_event_passes() {
        assert!(validate_event(&valid_event()).is_empty());
    }

    #[test]
    fn offset_timestamp_passes() {
        let mut event = valid_event();
        event["timestamp"] = json!("2026-01-17T10:00:00+00:00");
        assert!(validate_event(&event).is_empty());
    }

    #[test]
    fn missing_required_field_is_reported() {
        let mut event = valid_event();
        event.as_object_mut().unwrap().remove("summary");
        let errors = validate_event(&event);
        assert_eq!(errors, vec!["missing field: summary".to_string()]);
    }

    #[test]
    fn invalid_enums_are_reported() {
        let mut event = valid_event();
        event["surface"] = json!("telegraph");
        event["direction"] = json!("sideways");
        let errors = validate_event(&event);
        assert!(errors.contains(&"invalid surface: telegraph".to_string()));
        assert!(errors.contains(&"invalid direction: sideways".to_string()));
    }

    #[test]
    fn malformed_timestamp_is_reported() {
        let mut event = valid_event();
        event["timestamp"] = json!("yesterday-ish");
        let errors = validate_event(&event);
        assert!(errors.contains(&"invalid timestamp format".to_string()));
    }

    #[test]
    fn wrong_optional_types_are_reported() {
        let mut event = valid_event();
        event["content"] = json!(42);
        event["metadata"] = json!([1, 2]);
        let errors = validate_event(&event);
        assert!(errors
            .iter()
            .any(|e| e.starts_with("invalid type for content")));
        assert!(errors
            .iter()
            .any(|e| e.starts_with("invalid type for metadata")));
    }

    #[test]
    fn file_validation_reports_json_and_schema_issues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let good = valid_event().to_string();
        let mut bad = valid_event();
        bad["surface"] = json!("telegraph");
        std::fs::write(&path, format!("{good}\n{{not json}}\n\n{bad}\n")).unwrap();

        let (issues, total) = validate_stream_file(&path).unwrap();
        assert_eq!(total, 3);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].line, 2);
        assert!(issues[0].error.as_ref().unwrap().contains("invalid json"));
        assert_eq!(issues[1].line, 4);
        assert_eq!(issues[1].id.as_deref(), Some("evt_1_abcd1234"));
    }

    #[test]
    fn missing_file_validates_clean() {
        let (issues, total) = validate_stream_file(Path::new("/nonexistent.jsonl")).unwrap();
        assert!(issues.is_empty());
        assert_eq!(total, 0);
    }
}
