use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use notify::{PollWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use samara_stream::EventStream;
use samara_types::{parse_timestamp, Direction, Event, EventType, Surface};

/// Delivery urgency declared by the satellite producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensePriority {
    Immediate,
    Normal,
    Background,
}

impl Default for SensePriority {
    fn default() -> Self {
        SensePriority::Normal
    }
}

impl SensePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensePriority::Immediate => "immediate",
            SensePriority::Normal => "normal",
            SensePriority::Background => "background",
        }
    }
}

/// The `<name>.event.json` drop format satellite producers write.
#[derive(Debug, Clone, Deserialize)]
pub struct SenseEventFile {
    pub sense: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub priority: SensePriority,
    pub data: Value,
    #[serde(default)]
    pub context: Option<String>,
    /// Producer auth material; never copied into the stream.
    #[serde(default)]
    pub auth: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub ingested: usize,
    pub rejected: usize,
}

/// Converts deposited sense-event files into stream events and
/// removes them, quarantining malformed drops under
/// `senses/rejected/` with a companion `.error.txt`.
pub struct SenseWatcher {
    senses_dir: PathBuf,
    rejected_dir: PathBuf,
    stream: EventStream,
}

impl SenseWatcher {
    pub fn new(senses_dir: impl Into<PathBuf>, stream: EventStream) -> std::io::Result<Self> {
        let senses_dir = senses_dir.into();
        let rejected_dir = senses_dir.join("rejected");
        std::fs::create_dir_all(&rejected_dir)?;
        Ok(Self {
            senses_dir,
            rejected_dir,
            stream,
        })
    }

    pub fn senses_dir(&self) -> &Path {
        &self.senses_dir
    }

    /// One sweep over the senses directory. Each `*.event.json` file
    /// becomes a stream event and is deleted; files that fail to
    /// parse move to the rejected quarantine.
    pub fn ingest_once(&self) -> anyhow::Result<IngestReport> {
        let mut report = IngestReport::default();

        let mut drops: Vec<PathBuf> = walkdir::WalkDir::new(&self.senses_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.ends_with(".event.json"))
                    .unwrap_or(false)
            })
            .collect();
        drops.sort();

        for path in drops {
            match self.ingest_file(&path) {
                Ok(()) => {
                    std::fs::remove_file(&path)?;
                    report.ingested += 1;
                }
                Err(err) => {
                    self.quarantine(&path, &err)?;
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }

    fn ingest_file(&self, path: &Path) -> Result<(), String> {
        let raw = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
        let sense: SenseEventFile =
            serde_json::from_str(&raw).map_err(|err| format!("invalid sense event: {}", err))?;
        if sense.sense.trim().is_empty() {
            return Err("invalid sense event: empty sense name".to_string());
        }

        // A sense named after a known surface is promoted to it.
        let surface = sense
            .sense
            .parse::<Surface>()
            .unwrap_or(Surface::Sense);

        let summary = sense
            .context
            .clone()
            .filter(|context| !context.trim().is_empty())
            .unwrap_or_else(|| {
                format!("{} sense event ({})", sense.sense, sense.priority.as_str())
            });

        let mut metadata = Map::new();
        metadata.insert("sense".to_string(), Value::String(sense.sense.clone()));
        metadata.insert(
            "priority".to_string(),
            Value::String(sense.priority.as_str().to_string()),
        );
        metadata.insert("data".to_string(), sense.data.clone());

        let mut event = Event::new_at(
            surface,
            EventType::Sense,
            Direction::Inbound,
            summary,
            Utc::now(),
        )
        .with_metadata(metadata);

        // Producer timestamps are kept when valid.
        if let Some(timestamp) = sense.timestamp.as_deref() {
            if parse_timestamp(timestamp).is_some() {
                event.timestamp = timestamp.to_string();
            }
        }

        self.stream.append(&event).map_err(|err| err.to_string())
    }

    fn quarantine(&self, path: &Path, error: &str) -> std::io::Result<()> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown.event.json".to_string());
        tracing::warn!(
            component = "sense-watcher",
            file = %file_name,
            error = %error,
            "rejecting malformed sense event"
        );

        let target = self.rejected_dir.join(&file_name);
        std::fs::rename(path, &target)?;
        std::fs::write(
            self.rejected_dir.join(format!("{}.error.txt", file_name)),
            format!("{}\n", error),
        )
    }

    /// Watch the senses directory, sweeping on filesystem activity
    /// and at least every `poll_interval`, until `stop` flips. Used
    /// by the long-lived CLI mode; timer-driven jobs call
    /// [`SenseWatcher::ingest_once`] directly.
    pub fn watch(&self, poll_interval: Duration, stop: Arc<AtomicBool>) -> anyhow::Result<()> {
        let (tx, rx) = channel();
        let config = notify::Config::default().with_poll_interval(poll_interval);
        let mut watcher = PollWatcher::new(
            move |result: Result<notify::Event, notify::Error>| {
                if let Ok(event) = result {
                    let _ = tx.send(event);
                }
            },
            config,
        )?;
        watcher.watch(&self.senses_dir, RecursiveMode::NonRecursive)?;

        while !stop.load(Ordering::SeqCst) {
            self.ingest_once()?;
            // Block until activity or the poll interval elapses; both
            // fall through to another sweep.
            let _ = rx.recv_timeout(poll_interval);
        }
        Ok(())
    }
}
