//! Integration tests for JSON-lines ingestion from files.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::io::Write;

use pretty_assertions::assert_eq;
use prop_metrics::config::Config;
use prop_metrics::ingest::{ingest_file, IngestReport};
use tempfile::NamedTempFile;

fn write_lines(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    for line in lines {
        writeln!(file, "{line}").expect("Failed to write line");
    }
    file
}

#[tokio::test]
async fn test_file_lines_merge_into_summary() {
    let file = write_lines(&[
        r#"{"source": "health", "data": {"memory_usage": 512, "performance": {"cache_hit_rate": 88}}}"#,
        "",
        r#"{"avg_response_time_ms": 140, "win_streak": 3}"#,
    ]);
    let store = Config::default().build_store();

    let report = ingest_file(&store, file.path()).await.unwrap();

    assert_eq!(
        report,
        IngestReport {
            applied: 2,
            envelopes: 1,
            blank: 1,
        }
    );
    let summary = store.summary();
    assert_eq!(summary.metrics.memory_usage, 512.0);
    assert_eq!(summary.metrics.avg_response_time, 140.0);
    assert_eq!(summary.cache_hit_rate.formatted, "88.0%");
    assert_eq!(
        summary.last_source.as_deref(),
        Some(file.path().display().to_string().as_str())
    );
    assert!(summary.error.is_none());
}

#[tokio::test]
async fn test_bad_line_recorded_and_processing_continues() {
    let file = write_lines(&[
        r#"{"latency": 5}"#,
        "this is not json",
        r#"{"source": "queue", "data": {"queue_size": 2}}"#,
    ]);
    let store = Config::default().build_store();

    ingest_file(&store, file.path()).await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.current.latency, 5.0);
    assert_eq!(state.current.queue_size, 2.0);
    assert_eq!(state.last_source.as_deref(), Some("queue"));
    // A later successful update clears the decode error.
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_trailing_bad_line_leaves_error() {
    let file = write_lines(&[r#"{"latency": 5}"#, "[1, 2"]);
    let store = Config::default().build_store();

    ingest_file(&store, file.path()).await.unwrap();

    let state = store.snapshot();
    assert_eq!(state.current.latency, 5.0);
    assert!(state
        .error
        .as_deref()
        .unwrap()
        .starts_with("Failed to decode metrics payload"));
}
