use chrono::{Duration, Utc};
use predicates::prelude::*;
use samara_testing::MindFixture;
use samara_types::{format_timestamp, Surface};

#[test]
fn write_then_query_round_trips() {
    let fixture = MindFixture::new();

    let output = fixture
        .command()
        .args([
            "stream",
            "write",
            "--surface",
            "cli",
            "--type",
            "interaction",
            "--direction",
            "inbound",
            "--summary",
            "Test event",
            "--format",
            "json",
        ])
        .output()
        .expect("Failed to run stream write");
    assert!(output.status.success());

    let written: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("write output is JSON");
    let id = written["id"].as_str().expect("write returns an id");
    assert!(id.starts_with("evt_"));

    let output = fixture
        .command()
        .args(["stream", "query", "--format", "json"])
        .output()
        .expect("Failed to run stream query");
    assert!(output.status.success());

    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["summary"], "Test event");
    assert_eq!(events[0]["id"], id);
}

#[test]
fn invalid_surface_exits_nonzero_listing_valid_values() {
    let fixture = MindFixture::new();
    fixture
        .command()
        .args([
            "stream",
            "write",
            "--surface",
            "telegraph",
            "--type",
            "interaction",
            "--direction",
            "inbound",
            "--summary",
            "nope",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid surface 'telegraph'"))
        .stderr(predicate::str::contains("imessage"));
}

#[test]
fn invalid_metadata_json_exits_nonzero() {
    let fixture = MindFixture::new();
    fixture
        .command()
        .args([
            "stream",
            "write",
            "--surface",
            "cli",
            "--type",
            "interaction",
            "--direction",
            "inbound",
            "--summary",
            "meta",
            "--metadata",
            "{broken",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid metadata"));
}

#[test]
fn mark_distilled_hides_events_from_default_query() {
    let fixture = MindFixture::new();
    let now = Utc::now();
    let id = fixture.write_event(
        &format_timestamp(now - Duration::minutes(5)),
        Surface::Cli,
        "to distill",
        None,
    );

    fixture
        .command()
        .args(["stream", "mark-distilled", &id, "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"marked\":1"));

    // Idempotent: the second mark adds nothing.
    fixture
        .command()
        .args(["stream", "mark-distilled", &id, "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"marked\":0"));

    let output = fixture
        .command()
        .args(["stream", "query", "--format", "json"])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 0);

    let output = fixture
        .command()
        .args(["stream", "query", "--include-distilled", "--format", "json"])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["distilled"], true);
}

#[test]
fn mark_distilled_requires_ids_or_before() {
    let fixture = MindFixture::new();
    fixture
        .command()
        .args(["stream", "mark-distilled"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provide event IDs or --before"));
}

#[test]
fn archive_moves_old_events() {
    let fixture = MindFixture::new();
    let now = Utc::now();
    let old_ts = format_timestamp(now - Duration::days(2));
    let old_date = &old_ts[..10];
    fixture.write_event(&old_ts, Surface::Cli, "ancient event", None);

    fixture
        .command()
        .args(["stream", "archive", "--days", "1", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"archived\":1"));

    let output = fixture
        .command()
        .args(["stream", "query", "--include-distilled", "--format", "json"])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 0);

    let archived = fixture
        .stream_dir()
        .join(format!("archive/events-{}.jsonl", old_date));
    let contents = std::fs::read_to_string(archived).expect("archive shard exists");
    assert_eq!(contents.lines().filter(|l| !l.trim().is_empty()).count(), 1);
}

#[test]
fn query_sorts_by_timestamp_then_id() {
    let fixture = MindFixture::new();
    let now = Utc::now();
    fixture.write_event(
        &format_timestamp(now - Duration::minutes(1)),
        Surface::Cli,
        "second",
        None,
    );
    fixture.write_event(
        &format_timestamp(now - Duration::minutes(10)),
        Surface::Cli,
        "first",
        None,
    );
    fixture.write_event(
        &format_timestamp(now - Duration::minutes(5)),
        Surface::Webhook,
        "middle",
        None,
    );

    let output = fixture
        .command()
        .args(["stream", "query", "--format", "json"])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let summaries: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["summary"].as_str().unwrap())
        .collect();
    assert_eq!(summaries, vec!["first", "middle", "second"]);
}

#[test]
fn corrupt_line_fails_validate_but_not_query() {
    let fixture = MindFixture::new();
    let now = Utc::now();
    fixture.write_event(
        &format_timestamp(now - Duration::minutes(5)),
        Surface::Cli,
        "good event",
        None,
    );

    // Corrupt the shard mid-stream.
    let shard = fixture.stream_dir().join(format!(
        "daily/events-{}.jsonl",
        format_timestamp(now - Duration::minutes(5))
            .chars()
            .take(10)
            .collect::<String>()
    ));
    let mut contents = std::fs::read_to_string(&shard).unwrap();
    contents.push_str("{not json}\n");
    std::fs::write(&shard, contents).unwrap();

    let output = fixture
        .command()
        .args(["stream", "validate", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["valid"], false);
    assert_eq!(result["error_count"], 1);
    assert_eq!(result["total_events"], 2);

    let output = fixture
        .command()
        .args(["stream", "query", "--format", "json"])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 1);
}

#[test]
fn stats_reports_counts_and_range() {
    let fixture = MindFixture::new();
    let now = Utc::now();
    fixture.write_event(
        &format_timestamp(now - Duration::hours(3)),
        Surface::Cli,
        "one",
        None,
    );
    let id = fixture.write_event(
        &format_timestamp(now - Duration::hours(1)),
        Surface::Webhook,
        "two",
        None,
    );
    fixture
        .command()
        .args(["stream", "mark-distilled", &id])
        .assert()
        .success();

    let output = fixture
        .command()
        .args(["stream", "stats", "--format", "json"])
        .output()
        .unwrap();
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_events"], 2);
    assert_eq!(stats["undistilled"], 1);
    assert_eq!(stats["distilled"], 1);
    assert_eq!(stats["by_surface"]["cli"], 1);
    assert_eq!(stats["by_surface"]["webhook"], 1);
    assert!(stats["oldest_event"].as_str().unwrap() <= stats["newest_event"].as_str().unwrap());
}

#[test]
fn migrate_daily_splits_legacy_file() {
    let fixture = MindFixture::new();
    std::fs::create_dir_all(fixture.stream_dir()).unwrap();
    let line_one = r#"{"schema_version":"1","id":"evt_1_aaaa0001","timestamp":"2026-01-10T08:00:00Z","surface":"cli","type":"interaction","direction":"inbound","summary":"day one","distilled":false,"session_id":null,"content":null,"metadata":{}}"#;
    let line_two = r#"{"schema_version":"1","id":"evt_2_aaaa0002","timestamp":"2026-01-11T08:00:00Z","surface":"cli","type":"interaction","direction":"inbound","summary":"day two","distilled":false,"session_id":null,"content":null,"metadata":{}}"#;
    std::fs::write(
        fixture.stream_dir().join("events.jsonl"),
        format!("{line_one}\n{line_two}\n"),
    )
    .unwrap();

    fixture
        .command()
        .args(["stream", "migrate-daily", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"migrated\":2"));

    assert!(fixture
        .stream_dir()
        .join("daily/events-2026-01-10.jsonl")
        .exists());
    assert!(fixture
        .stream_dir()
        .join("daily/events-2026-01-11.jsonl")
        .exists());
    assert!(!fixture.stream_dir().join("events.jsonl").exists());
    assert!(fixture.stream_dir().join("events.legacy.jsonl").exists());
}

#[test]
fn undistilled_filters_by_date() {
    let fixture = MindFixture::new();
    fixture.write_event("2026-01-10T08:00:00Z", Surface::Cli, "older day", None);
    fixture.write_event("2026-01-12T08:00:00Z", Surface::Cli, "newer day", None);

    let output = fixture
        .command()
        .args([
            "stream",
            "undistilled",
            "--before",
            "2026-01-11",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["summary"], "older day");
}

#[test]
fn mark_distilled_before_date_via_cli() {
    let fixture = MindFixture::new();
    fixture.write_event("2026-01-10T08:00:00Z", Surface::Cli, "older day", None);
    fixture.write_event("2026-01-12T08:00:00Z", Surface::Cli, "newer day", None);

    fixture
        .command()
        .args([
            "stream",
            "mark-distilled",
            "--before",
            "2026-01-11",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"marked\":1"));

    let output = fixture
        .command()
        .args(["stream", "undistilled", "--format", "json"])
        .output()
        .unwrap();
    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["summary"], "newer day");
}
