use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use samara_types::{format_timestamp, Event, EventRecord, EventType, Surface};

use crate::distilled::{DistilledEntry, DistilledIndex};
use crate::error::{Error, Result};
use crate::read::{count_nonblank_lines, for_each_record};

/// Filters applied by [`EventStream::query`]. The default returns
/// every undistilled event across all shards.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub hours: Option<f64>,
    pub surface: Option<Surface>,
    pub event_type: Option<EventType>,
    pub include_distilled: bool,
    /// Reference clock; wall clock when absent.
    pub now: Option<DateTime<Utc>>,
    /// Cooperative cancellation: on expiry the query returns the
    /// records collected so far.
    pub deadline: Option<Instant>,
}

impl QueryFilter {
    pub fn hours(mut self, hours: f64) -> Self {
        self.hours = Some(hours);
        self
    }

    pub fn surface(mut self, surface: Surface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn include_distilled(mut self, include: bool) -> Self {
        self.include_distilled = include;
        self
    }

    pub fn now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// Aggregate counters over the whole stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStats {
    pub total_events: usize,
    pub undistilled: usize,
    pub distilled: usize,
    pub by_surface: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub oldest_event: Option<String>,
    pub newest_event: Option<String>,
}

/// The unified append-only event stream.
///
/// Multiple OS processes may hold an `EventStream` over the same
/// directory concurrently. Mutating operations lock the single file
/// they touch; queries read lock-free at a snapshot.
#[derive(Debug, Clone)]
pub struct EventStream {
    stream_dir: PathBuf,
    daily_dir: PathBuf,
    archive_dir: PathBuf,
    stream_file: PathBuf,
    legacy_stream_file: PathBuf,
    index: DistilledIndex,
}

impl EventStream {
    /// Open (creating directories as needed) the stream rooted at
    /// `stream_dir`.
    pub fn new(stream_dir: impl Into<PathBuf>) -> Result<Self> {
        let stream_dir = stream_dir.into();
        let daily_dir = stream_dir.join("daily");
        let archive_dir = stream_dir.join("archive");
        std::fs::create_dir_all(&daily_dir)?;
        std::fs::create_dir_all(&archive_dir)?;

        let index = DistilledIndex::new(stream_dir.join("distilled-index.jsonl"));
        Ok(Self {
            stream_file: stream_dir.join("events.jsonl"),
            legacy_stream_file: stream_dir.join("events.legacy.jsonl"),
            daily_dir,
            archive_dir,
            stream_dir,
            index,
        })
    }

    pub fn stream_dir(&self) -> &Path {
        &self.stream_dir
    }

    pub fn distilled_index(&self) -> &DistilledIndex {
        &self.index
    }

    /// Append one event to its daily shard: single serialized line,
    /// exclusive lock, flush + fsync before the lock is released.
    pub fn append(&self, event: &Event) -> Result<()> {
        let mut line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        line.push('\n');
        let shard = self.daily_file_for_timestamp(&event.timestamp);
        samara_core::locked_append(&shard, line.as_bytes())?;
        Ok(())
    }

    fn daily_file_for_timestamp(&self, timestamp: &str) -> PathBuf {
        let date = timestamp
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            .unwrap_or_else(|| Utc::now().date_naive());
        self.daily_dir
            .join(format!("events-{}.jsonl", date.format("%Y-%m-%d")))
    }

    fn sorted_daily_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&self.daily_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with("events-") && name.ends_with(".jsonl"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    /// Shard files a read over the trailing `hours` window must visit,
    /// oldest first. The legacy single-file stream (if present) is
    /// always appended as a final catch-all.
    pub fn list_stream_files(&self, hours: Option<f64>, now: DateTime<Utc>) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let daily_files = match hours {
            None => self.sorted_daily_files(),
            Some(hours) => {
                let start_date = (now - hours_duration(hours)).date_naive();
                let end_date = now.date_naive();
                let mut selected = Vec::new();
                let mut date = start_date;
                while date <= end_date {
                    let path = self
                        .daily_dir
                        .join(format!("events-{}.jsonl", date.format("%Y-%m-%d")));
                    if path.exists() {
                        selected.push(path);
                    }
                    date = date + Duration::days(1);
                }
                selected
            }
        };

        let had_daily = !daily_files.is_empty();
        files.extend(daily_files);

        let legacy = if had_daily {
            self.stream_file.exists().then(|| self.stream_file.clone())
        } else if self.legacy_stream_file.exists() {
            Some(self.legacy_stream_file.clone())
        } else {
            self.stream_file.exists().then(|| self.stream_file.clone())
        };
        files.extend(legacy);

        files
    }

    /// Query events across shards. Malformed lines are skipped; the
    /// result is unsorted (consumers needing a deterministic order
    /// sort by `(timestamp, id)`).
    pub fn query(&self, filter: &QueryFilter) -> Result<Vec<EventRecord>> {
        let now = filter.now.unwrap_or_else(Utc::now);
        let files = self.list_stream_files(filter.hours, now);
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let distilled_ids = self.index.load()?;
        let cutoff = filter.hours.map(|hours| now - hours_duration(hours));

        let mut results = Vec::new();
        'files: for file in files {
            let mut expired = false;
            for_each_record(&file, |mut record| {
                if let Some(deadline) = filter.deadline {
                    if Instant::now() >= deadline {
                        expired = true;
                        return ControlFlow::Break(());
                    }
                }

                let is_distilled = record.distilled()
                    || record
                        .id()
                        .map(|id| distilled_ids.contains(id))
                        .unwrap_or(false);
                if !filter.include_distilled && is_distilled {
                    return ControlFlow::Continue(());
                }
                if is_distilled && !record.distilled() {
                    record.set_distilled(true);
                }

                if let Some(cutoff) = cutoff {
                    match record.parsed_timestamp() {
                        Some(ts) if ts >= cutoff => {}
                        _ => return ControlFlow::Continue(()),
                    }
                }

                if let Some(surface) = filter.surface {
                    if record.surface() != Some(surface.as_str()) {
                        return ControlFlow::Continue(());
                    }
                }
                if let Some(event_type) = filter.event_type {
                    if record.event_type() != Some(event_type.as_str()) {
                        return ControlFlow::Continue(());
                    }
                }

                results.push(record);
                ControlFlow::Continue(())
            })?;

            if expired {
                tracing::warn!(
                    component = "stream",
                    operation = "query",
                    "deadline expired, returning partial results"
                );
                break 'files;
            }
        }

        Ok(results)
    }

    /// Query events not yet distilled, optionally restricted to an
    /// exact date or everything strictly before a date.
    pub fn query_undistilled(
        &self,
        date: Option<&str>,
        before_date: Option<&str>,
    ) -> Result<Vec<EventRecord>> {
        let mut results = self.query(&QueryFilter::default())?;
        if let Some(date) = date {
            results.retain(|record| record.date_prefix() == Some(date));
        }
        if let Some(before) = before_date {
            results.retain(|record| {
                record
                    .date_prefix()
                    .map(|prefix| prefix < before)
                    .unwrap_or(false)
            });
        }
        Ok(results)
    }

    /// Mark events as distilled via the sidecar index. Idempotent:
    /// IDs already present are skipped, and IDs with no stream record
    /// are ignored. Returns the number of newly marked events.
    pub fn mark_distilled(&self, event_ids: &[String]) -> Result<usize> {
        self.mark_distilled_with_deadline(event_ids, None)
    }

    pub fn mark_distilled_with_deadline(
        &self,
        event_ids: &[String],
        deadline: Option<Instant>,
    ) -> Result<usize> {
        let id_set: HashSet<&str> = event_ids.iter().map(String::as_str).collect();
        let now = Utc::now();
        if id_set.is_empty() || self.list_stream_files(None, now).is_empty() {
            return Ok(0);
        }

        let existing = self.index.load()?;
        let pending: HashSet<&str> = id_set
            .into_iter()
            .filter(|id| !existing.contains(*id))
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let timestamps = self.lookup_event_timestamps(&pending, deadline)?;
        if timestamps.is_empty() {
            return Ok(0);
        }

        let distilled_at = format_timestamp(now);
        let entries: Vec<DistilledEntry> = timestamps
            .into_iter()
            .map(|(id, timestamp)| DistilledEntry {
                id,
                timestamp: Some(timestamp),
                distilled_at: distilled_at.clone(),
            })
            .collect();

        self.index.append(&entries)?;
        Ok(entries.len())
    }

    /// Mark every undistilled event dated strictly before `date`.
    pub fn mark_distilled_before_date(&self, before_date: &str) -> Result<usize> {
        if self.list_stream_files(None, Utc::now()).is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = self
            .query_undistilled(None, Some(before_date))?
            .iter()
            .filter_map(|record| record.id().map(str::to_string))
            .collect();
        self.mark_distilled(&ids)
    }

    fn lookup_event_timestamps(
        &self,
        event_ids: &HashSet<&str>,
        deadline: Option<Instant>,
    ) -> Result<HashMap<String, String>> {
        let mut timestamps = HashMap::new();
        let mut expired = false;
        for file in self.list_stream_files(None, Utc::now()) {
            for_each_record(&file, |record| {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        expired = true;
                        return ControlFlow::Break(());
                    }
                }
                if let (Some(id), Some(ts)) = (record.id(), record.timestamp()) {
                    if event_ids.contains(id) {
                        timestamps.insert(id.to_string(), ts.to_string());
                    }
                }
                if timestamps.len() >= event_ids.len() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })?;
            if expired {
                return Err(Error::Timeout {
                    operation: "mark_distilled",
                });
            }
            if timestamps.len() >= event_ids.len() {
                break;
            }
        }
        Ok(timestamps)
    }

    /// Move events older than `days_old` days into the archive.
    /// Daily-shard mode renames whole shard files; legacy mode
    /// partitions the single file by event date and rewrites it
    /// atomically. Returns the number of archived events.
    pub fn archive(&self, days_old: i64, now: DateTime<Utc>) -> Result<usize> {
        self.archive_with_deadline(days_old, now, None)
    }

    pub fn archive_with_deadline(
        &self,
        days_old: i64,
        now: DateTime<Utc>,
        deadline: Option<Instant>,
    ) -> Result<usize> {
        let cutoff = now - Duration::days(days_old);
        let daily_files = self.sorted_daily_files();

        if !daily_files.is_empty() {
            let cutoff_date = cutoff.date_naive();
            let mut archived = 0;
            for file in daily_files {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(Error::Timeout {
                            operation: "archive",
                        });
                    }
                }
                let Some(file_date) = shard_date(&file) else {
                    continue;
                };
                if file_date >= cutoff_date {
                    continue;
                }
                archived += count_nonblank_lines(&file)?;
                let target = self.archive_dir.join(file.file_name().unwrap_or_default());
                std::fs::rename(&file, &target)?;
            }
            return Ok(archived);
        }

        let legacy = if self.legacy_stream_file.exists() {
            self.legacy_stream_file.clone()
        } else {
            self.stream_file.clone()
        };
        if !legacy.exists() {
            return Ok(0);
        }

        let contents = std::fs::read_to_string(&legacy)?;
        let mut keep_lines: Vec<String> = Vec::new();
        let mut archive_by_date: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut archived = 0;

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = serde_json::from_str(trimmed)
                .ok()
                .and_then(EventRecord::from_value);
            match record.as_ref().and_then(|r| r.parsed_timestamp()) {
                Some(event_time) if event_time < cutoff => {
                    let date = event_time.format("%Y-%m-%d").to_string();
                    archive_by_date
                        .entry(date)
                        .or_default()
                        .push(trimmed.to_string());
                    archived += 1;
                }
                _ => keep_lines.push(trimmed.to_string()),
            }
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    operation: "archive",
                });
            }
        }

        for (date, lines) in archive_by_date {
            let target = self.archive_dir.join(format!("events-{}.jsonl", date));
            let mut payload = lines.join("\n");
            payload.push('\n');
            samara_core::locked_append(&target, payload.as_bytes())?;
        }

        let mut retained = keep_lines.join("\n");
        if !retained.is_empty() {
            retained.push('\n');
        }
        samara_core::atomic_write(&legacy, retained.as_bytes())?;

        Ok(archived)
    }

    /// Rebuild the sidecar index from the stored distilled flags.
    /// Duplicate IDs from migration collapse to one entry. The new
    /// index replaces the old atomically.
    pub fn rebuild_distilled_index(&self) -> Result<usize> {
        let now = Utc::now();
        let files = self.list_stream_files(None, now);
        if files.is_empty() {
            self.index.rewrite(&[])?;
            return Ok(0);
        }

        let distilled_at = format_timestamp(now);
        let mut entries: Vec<DistilledEntry> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for file in files {
            for_each_record(&file, |record| {
                if record.distilled() {
                    if let Some(id) = record.id() {
                        if !id.is_empty() && seen.insert(id.to_string()) {
                            entries.push(DistilledEntry {
                                id: id.to_string(),
                                timestamp: record.timestamp().map(str::to_string),
                                distilled_at: distilled_at.clone(),
                            });
                        }
                    }
                }
                ControlFlow::Continue(())
            })?;
        }

        self.index.rewrite(&entries)?;
        Ok(entries.len())
    }

    /// Split the legacy `events.jsonl` into daily shards, then rename
    /// it out of the read path (or delete-equivalent archive naming
    /// when a prior legacy archive already exists).
    pub fn migrate_legacy_to_daily(&self, archive_legacy: bool) -> Result<usize> {
        if !self.stream_file.exists() {
            return Ok(0);
        }

        let contents = std::fs::read_to_string(&self.stream_file)?;
        let mut events_by_date: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut migrated = 0;

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some(record) = serde_json::from_str(trimmed)
                .ok()
                .and_then(EventRecord::from_value)
            else {
                continue;
            };
            let Some(date) = record.date_prefix() else {
                continue;
            };
            events_by_date
                .entry(date.to_string())
                .or_default()
                .push(trimmed.to_string());
            migrated += 1;
        }

        for (date, lines) in events_by_date {
            let target = self.daily_dir.join(format!("events-{}.jsonl", date));
            let mut payload = lines.join("\n");
            payload.push('\n');
            samara_core::locked_append(&target, payload.as_bytes())?;
        }

        if archive_legacy {
            let mut target = self.legacy_stream_file.clone();
            if target.exists() {
                let suffix = Utc::now().format("%Y%m%d%H%M%S");
                target = self
                    .stream_dir
                    .join(format!("events.legacy.{}.jsonl", suffix));
            }
            std::fs::rename(&self.stream_file, &target)?;
        }

        Ok(migrated)
    }

    /// Aggregate counters across the whole stream.
    pub fn stats(&self) -> Result<StreamStats> {
        let all = self.query(&QueryFilter::default().include_distilled(true))?;
        let undistilled = all.iter().filter(|record| !record.distilled()).count();

        let mut by_surface: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        for record in &all {
            if let Some(surface) = record.surface() {
                *by_surface.entry(surface.to_string()).or_default() += 1;
            }
            if let Some(event_type) = record.event_type() {
                *by_type.entry(event_type.to_string()).or_default() += 1;
            }
        }

        let timestamps: Vec<&str> = all.iter().filter_map(|record| record.timestamp()).collect();

        Ok(StreamStats {
            total_events: all.len(),
            undistilled,
            distilled: all.len() - undistilled,
            by_surface,
            by_type,
            oldest_event: timestamps.iter().min().map(|ts| ts.to_string()),
            newest_event: timestamps.iter().max().map(|ts| ts.to_string()),
        })
    }
}

fn hours_duration(hours: f64) -> Duration {
    Duration::seconds((hours * 3600.0) as i64)
}

fn shard_date(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let date = stem.strip_prefix("events-")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use samara_types::{parse_timestamp, Direction};

    fn stream() -> (tempfile::TempDir, EventStream) {
        let dir = tempfile::tempdir().unwrap();
        let stream = EventStream::new(dir.path().join("stream")).unwrap();
        (dir, stream)
    }

    fn event_at(timestamp: &str, summary: &str) -> Event {
        let mut event = Event::new_at(
            Surface::Cli,
            EventType::Interaction,
            Direction::Inbound,
            summary,
            parse_timestamp(timestamp).unwrap(),
        );
        event.timestamp = timestamp.to_string();
        event
    }

    #[test]
    fn append_routes_to_date_shard() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "Test event"))
            .unwrap();
        assert!(stream
            .stream_dir()
            .join("daily/events-2026-01-17.jsonl")
            .exists());
    }

    #[test]
    fn malformed_timestamp_falls_back_to_today() {
        let (_dir, stream) = stream();
        let mut event = event_at("2026-01-17T10:00:00Z", "odd");
        event.timestamp = "not-a-date".to_string();
        stream.append(&event).unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert!(stream
            .stream_dir()
            .join(format!("daily/events-{today}.jsonl"))
            .exists());
    }

    #[test]
    fn append_then_query_round_trips() {
        let (_dir, stream) = stream();
        let event = event_at("2026-01-17T10:00:00Z", "Test event");
        stream.append(&event).unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let results = stream
            .query(&QueryFilter::default().include_distilled(true).now(now))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary(), Some("Test event"));
        assert_eq!(results[0].id(), Some(event.id.as_str()));
    }

    #[test]
    fn query_window_excludes_old_events() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "recent"))
            .unwrap();
        stream
            .append(&event_at("2026-01-15T10:00:00Z", "stale"))
            .unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let results = stream
            .query(
                &QueryFilter::default()
                    .include_distilled(true)
                    .hours(12.0)
                    .now(now),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary(), Some("recent"));
    }

    #[test]
    fn query_filters_by_surface_and_type() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "cli event"))
            .unwrap();
        let mut webhook = event_at("2026-01-17T10:05:00Z", "webhook event");
        webhook.surface = Surface::Webhook;
        webhook.event_type = EventType::Sense;
        stream.append(&webhook).unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let results = stream
            .query(
                &QueryFilter::default()
                    .include_distilled(true)
                    .surface(Surface::Webhook)
                    .now(now),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary(), Some("webhook event"));

        let results = stream
            .query(
                &QueryFilter::default()
                    .include_distilled(true)
                    .event_type(EventType::Interaction)
                    .now(now),
            )
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].summary(), Some("cli event"));
    }

    #[test]
    fn malformed_lines_are_skipped_by_query() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "good"))
            .unwrap();
        let shard = stream.stream_dir().join("daily/events-2026-01-17.jsonl");
        let mut contents = std::fs::read_to_string(&shard).unwrap();
        contents.push_str("{not json}\n");
        std::fs::write(&shard, contents).unwrap();
        stream
            .append(&event_at("2026-01-17T11:00:00Z", "also good"))
            .unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let results = stream
            .query(&QueryFilter::default().include_distilled(true).now(now))
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn mark_distilled_is_idempotent_and_filters_queries() {
        let (_dir, stream) = stream();
        let event = event_at("2026-01-17T10:00:00Z", "to distill");
        stream.append(&event).unwrap();

        assert_eq!(stream.mark_distilled(&[event.id.clone()]).unwrap(), 1);
        assert_eq!(stream.mark_distilled(&[event.id.clone()]).unwrap(), 0);

        let index_lines = std::fs::read_to_string(stream.distilled_index().path()).unwrap();
        assert_eq!(index_lines.lines().count(), 1);

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let hidden = stream.query(&QueryFilter::default().now(now)).unwrap();
        assert!(hidden.is_empty());

        let visible = stream
            .query(&QueryFilter::default().include_distilled(true).now(now))
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible[0].distilled());
    }

    #[test]
    fn mark_distilled_ignores_unknown_ids() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "present"))
            .unwrap();
        assert_eq!(
            stream
                .mark_distilled(&["evt_0_deadbeef".to_string()])
                .unwrap(),
            0
        );
    }

    #[test]
    fn mark_distilled_before_date_marks_older_days_only() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-15T10:00:00Z", "old"))
            .unwrap();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "new"))
            .unwrap();

        assert_eq!(stream.mark_distilled_before_date("2026-01-16").unwrap(), 1);

        let undistilled = stream.query_undistilled(None, None).unwrap();
        assert_eq!(undistilled.len(), 1);
        assert_eq!(undistilled[0].summary(), Some("new"));
    }

    #[test]
    fn undistilled_date_filters() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-15T10:00:00Z", "older"))
            .unwrap();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "newer"))
            .unwrap();

        let exact = stream.query_undistilled(Some("2026-01-15"), None).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].summary(), Some("older"));

        let before = stream.query_undistilled(None, Some("2026-01-17")).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].summary(), Some("older"));
    }

    #[test]
    fn archive_moves_old_daily_shards() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-10T10:00:00Z", "ancient"))
            .unwrap();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "current"))
            .unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let archived = stream.archive(1, now).unwrap();
        assert_eq!(archived, 1);

        assert!(!stream
            .stream_dir()
            .join("daily/events-2026-01-10.jsonl")
            .exists());
        let archived_shard = stream.stream_dir().join("archive/events-2026-01-10.jsonl");
        assert!(archived_shard.exists());
        assert_eq!(count_nonblank_lines(&archived_shard).unwrap(), 1);

        let live = stream
            .query(&QueryFilter::default().include_distilled(true).now(now))
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].summary(), Some("current"));
    }

    #[test]
    fn archive_partitions_legacy_file() {
        let (_dir, stream) = stream();
        let old = serde_json::to_string(&event_at("2026-01-10T10:00:00Z", "ancient")).unwrap();
        let new = serde_json::to_string(&event_at("2026-01-17T10:00:00Z", "current")).unwrap();
        std::fs::write(
            stream.stream_dir().join("events.jsonl"),
            format!("{old}\n{new}\n"),
        )
        .unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let archived = stream.archive(1, now).unwrap();
        assert_eq!(archived, 1);

        assert!(stream
            .stream_dir()
            .join("archive/events-2026-01-10.jsonl")
            .exists());
        let retained = std::fs::read_to_string(stream.stream_dir().join("events.jsonl")).unwrap();
        assert!(retained.contains("current"));
        assert!(!retained.contains("ancient"));
    }

    #[test]
    fn rebuild_collapses_duplicate_ids() {
        let (_dir, stream) = stream();
        let mut event = event_at("2026-01-17T10:00:00Z", "flagged");
        event.distilled = true;
        let line = serde_json::to_string(&event).unwrap();
        std::fs::write(
            stream.stream_dir().join("daily/events-2026-01-17.jsonl"),
            format!("{line}\n{line}\n"),
        )
        .unwrap();

        assert_eq!(stream.rebuild_distilled_index().unwrap(), 1);
        let ids = stream.distilled_index().load().unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&event.id));
    }

    #[test]
    fn migrate_splits_legacy_into_daily_shards() {
        let (_dir, stream) = stream();
        let day_one = serde_json::to_string(&event_at("2026-01-15T10:00:00Z", "one")).unwrap();
        let day_two = serde_json::to_string(&event_at("2026-01-16T10:00:00Z", "two")).unwrap();
        std::fs::write(
            stream.stream_dir().join("events.jsonl"),
            format!("{day_one}\n{day_two}\n"),
        )
        .unwrap();

        assert_eq!(stream.migrate_legacy_to_daily(true).unwrap(), 2);
        assert!(stream
            .stream_dir()
            .join("daily/events-2026-01-15.jsonl")
            .exists());
        assert!(stream
            .stream_dir()
            .join("daily/events-2026-01-16.jsonl")
            .exists());
        assert!(!stream.stream_dir().join("events.jsonl").exists());
        assert!(stream.stream_dir().join("events.legacy.jsonl").exists());
    }

    #[test]
    fn legacy_file_remains_readable_before_migration() {
        let (_dir, stream) = stream();
        let line = serde_json::to_string(&event_at("2026-01-16T10:00:00Z", "pre-shard")).unwrap();
        std::fs::write(
            stream.stream_dir().join("events.jsonl"),
            format!("{line}\n"),
        )
        .unwrap();
        stream
            .append(&event_at("2026-01-17T10:00:00Z", "sharded"))
            .unwrap();

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let results = stream
            .query(&QueryFilter::default().include_distilled(true).now(now))
            .unwrap();
        let summaries: Vec<_> = results.iter().filter_map(|r| r.summary()).collect();
        assert!(summaries.contains(&"pre-shard"));
        assert!(summaries.contains(&"sharded"));
    }

    #[test]
    fn stats_counts_by_surface_and_type() {
        let (_dir, stream) = stream();
        stream
            .append(&event_at("2026-01-16T10:00:00Z", "first"))
            .unwrap();
        let mut webhook = event_at("2026-01-17T10:00:00Z", "second");
        webhook.surface = Surface::Webhook;
        webhook.event_type = EventType::Sense;
        stream.append(&webhook).unwrap();
        stream.mark_distilled(&[webhook.id.clone()]).unwrap();

        let stats = stream.stats().unwrap();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.undistilled, 1);
        assert_eq!(stats.distilled, 1);
        assert_eq!(stats.by_surface.get("cli"), Some(&1));
        assert_eq!(stats.by_surface.get("webhook"), Some(&1));
        assert_eq!(stats.by_type.get("interaction"), Some(&1));
        assert_eq!(stats.oldest_event.as_deref(), Some("2026-01-16T10:00:00Z"));
        assert_eq!(stats.newest_event.as_deref(), Some("2026-01-17T10:00:00Z"));
    }

    #[test]
    fn concurrent_appends_all_survive() {
        let (_dir, stream) = stream();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let stream = stream.clone();
                std::thread::spawn(move || {
                    for i in 0..20 {
                        let event = event_at(
                            "2026-01-17T10:00:00Z",
                            &format!("worker {worker} event {i}"),
                        );
                        stream.append(&event).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let now = parse_timestamp("2026-01-17T12:00:00Z").unwrap();
        let results = stream
            .query(&QueryFilter::default().include_distilled(true).now(now))
            .unwrap();
        assert_eq!(results.len(), 80);
    }
}
