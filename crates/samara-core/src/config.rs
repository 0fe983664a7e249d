use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Adaptive-window bounds for the hot digest builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotDigestConfig {
    pub min_hours: f64,
    pub max_hours: f64,
    pub base_hours: f64,
    pub target_rate: f64,
}

impl Default for HotDigestConfig {
    fn default() -> Self {
        Self {
            min_hours: 2.0,
            max_hours: 24.0,
            base_hours: 12.0,
            target_rate: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct StreamSection {
    hot_digest: HotDigestConfig,
}

/// Optional `config.json` in the mind root. Missing or malformed files
/// mean defaults; loading never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindConfig {
    services: BTreeMap<String, bool>,
    stream: StreamSection,
}

impl MindConfig {
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    component = "config",
                    path = %path.display(),
                    error = %err,
                    "malformed config.json, using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn hot_digest(&self) -> &HotDigestConfig {
        &self.stream.hot_digest
    }

    /// Surfaces whose satellite service is explicitly disabled
    /// (`services.<name>: false`). Excluded from audit gap reports.
    pub fn disabled_services(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|(_, enabled)| !**enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = MindConfig::load(Path::new("/nonexistent/config.json"));
        assert_eq!(config.hot_digest(), &HotDigestConfig::default());
        assert!(config.disabled_services().is_empty());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(MindConfig::load(&path), MindConfig::default());
    }

    #[test]
    fn parses_overrides_and_disabled_services() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "services": {"x": false, "bluesky": true},
                "stream": {"hot_digest": {"min_hours": 1, "max_hours": 6, "base_hours": 3, "target_rate": 5}}
            }"#,
        )
        .unwrap();

        let config = MindConfig::load(&path);
        assert_eq!(config.hot_digest().max_hours, 6.0);
        assert_eq!(config.hot_digest().target_rate, 5.0);
        assert_eq!(config.disabled_services(), vec!["x".to_string()]);
    }

    #[test]
    fn partial_hot_digest_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"stream": {"hot_digest": {"min_hours": 4}}}"#).unwrap();

        let config = MindConfig::load(&path);
        assert_eq!(config.hot_digest().min_hours, 4.0);
        assert_eq!(config.hot_digest().max_hours, 24.0);
    }
}
