//! Common test utilities shared across integration tests.
//!
//! The fixture owns a temp mind root and wires commands to it through
//! the `SAMARA_MIND_PATH` environment variable, so tests never touch
//! the real `~/.claude-mind`.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use samara_stream::EventStream;
use samara_types::{parse_timestamp, Direction, Event, EventType, Surface};

pub struct MindFixture {
    _temp_dir: TempDir,
    mind_path: PathBuf,
}

impl Default for MindFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl MindFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mind_path = temp_dir.path().join(".claude-mind");
        std::fs::create_dir_all(&mind_path).expect("Failed to create mind dir");
        Self {
            _temp_dir: temp_dir,
            mind_path,
        }
    }

    pub fn mind_path(&self) -> &Path {
        &self.mind_path
    }

    pub fn stream_dir(&self) -> PathBuf {
        self.mind_path.join("stream")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.mind_path.join("state")
    }

    pub fn stream(&self) -> EventStream {
        EventStream::new(self.stream_dir()).expect("Failed to open stream")
    }

    /// A `samara` command pointed at this fixture's mind root.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("samara").expect("Failed to find samara binary");
        cmd.env("SAMARA_MIND_PATH", &self.mind_path);
        cmd.env_remove("MIND_PATH");
        cmd.env_remove("HOT_DIGEST_NOW");
        cmd.env_remove("STREAM_AUDIT_NOW");
        cmd
    }

    /// Write a state file (creating parent directories) relative to
    /// the mind root.
    pub fn write_state_file(&self, relative: &str, contents: &str) {
        let path = self.mind_path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create state parents");
        }
        std::fs::write(path, contents).expect("Failed to write state file");
    }

    /// Append an event with an explicit timestamp and return its ID.
    pub fn write_event(
        &self,
        timestamp: &str,
        surface: Surface,
        summary: &str,
        content: Option<&str>,
    ) -> String {
        let now: DateTime<Utc> = parse_timestamp(timestamp).expect("Invalid test timestamp");
        let event_type = match surface {
            Surface::Cli | Surface::Imessage | Surface::X | Surface::Bluesky | Surface::Email => {
                EventType::Interaction
            }
            _ => EventType::Sense,
        };
        let mut event = Event::new_at(surface, event_type, Direction::Inbound, summary, now);
        if let Some(content) = content {
            event.content = Some(content.to_string());
        }
        self.stream().append(&event).expect("Failed to append event");
        event.id
    }
}
