use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Days a question stem stays on cooldown after being asked.
pub const QUESTION_COOLDOWN_DAYS: i64 = 7;

const STEM_WORD_LIMIT: usize = 6;
const STEM_SIMILARITY_THRESHOLD: f64 = 0.5;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "i", "you", "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have",
        "has", "had", "do", "does", "did", "to", "of", "in", "for", "on", "with", "at", "by",
        "about", "that", "this", "it", "what", "how", "your", "there",
    ])
});

/// One row of the asked-questions log. Appended per emission; updated
/// in place only to record a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionLogEntry {
    pub timestamp: String,
    pub question: String,
    pub question_stem: String,
    pub category: String,
    pub trigger: String,
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub response_received: bool,
    #[serde(default)]
    pub response_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timestamp: Option<String>,
}

/// Derive a deduplication stem: lowercase, strip punctuation, drop
/// stop words, keep the first six content words.
pub fn question_stem(question: &str) -> String {
    let lowered = question.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .take(STEM_WORD_LIMIT)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard similarity over stem words at or above the threshold
/// counts as a duplicate.
pub fn stems_similar(a: &str, b: &str) -> bool {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return false;
    }
    let intersection = words_a.intersection(&words_b).count() as f64;
    let union = words_a.union(&words_b).count() as f64;
    intersection / union >= STEM_SIMILARITY_THRESHOLD
}

/// The asked-questions JSONL log with stem-based throttling.
#[derive(Debug, Clone)]
pub struct QuestionLog {
    path: PathBuf,
}

impl QuestionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Vec<QuestionLogEntry> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Whether a similar question was asked within the cooldown
    /// window.
    pub fn was_recently_asked(&self, stem: &str, now: DateTime<Local>) -> bool {
        let cutoff = now - Duration::days(QUESTION_COOLDOWN_DAYS);
        self.read_entries().iter().any(|entry| {
            let recent = DateTime::parse_from_rfc3339(&entry.timestamp)
                .map(|ts| ts.with_timezone(&Local) >= cutoff)
                .unwrap_or(false);
            recent && stems_similar(stem, &entry.question_stem)
        })
    }

    /// Append an emission record.
    pub fn log_question(
        &self,
        question: &str,
        category: &str,
        trigger: &str,
        context: Value,
        now: DateTime<Local>,
    ) -> std::io::Result<()> {
        let entry = QuestionLogEntry {
            timestamp: now.to_rfc3339(),
            question: question.to_string(),
            question_stem: question_stem(question),
            category: category.to_string(),
            trigger: trigger.to_string(),
            context,
            response_received: false,
            response_summary: None,
            response_timestamp: None,
        };
        let mut line = serde_json::to_string(&entry).map_err(std::io::Error::other)?;
        line.push('\n');
        samara_core::locked_append(&self.path, line.as_bytes())
            .map_err(|err| std::io::Error::other(err.to_string()))
    }

    /// Mark the most recent unanswered entry with a similar stem as
    /// answered, rewriting the log in place.
    pub fn mark_response_received(
        &self,
        stem: &str,
        summary: &str,
        now: DateTime<Local>,
    ) -> std::io::Result<()> {
        let mut entries = self.read_entries();
        if entries.is_empty() {
            return Ok(());
        }

        for entry in entries.iter_mut().rev() {
            if stems_similar(stem, &entry.question_stem) && !entry.response_received {
                entry.response_received = true;
                entry.response_summary = Some(summary.to_string());
                entry.response_timestamp = Some(now.to_rfc3339());
                break;
            }
        }

        let mut payload = String::new();
        for entry in &entries {
            payload.push_str(&serde_json::to_string(entry).map_err(std::io::Error::other)?);
            payload.push('\n');
        }
        samara_core::atomic_write(&self.path, payload.as_bytes())
            .map_err(|err| std::io::Error::other(err.to_string()))
    }
}
