//! JSON-lines ingestion into a [`MetricsStore`].
//!
//! Each non-blank line is either an envelope naming its source:
//!
//! ```text
//! {"source": "health", "data": {"memory_usage": 512}}
//! ```
//!
//! or a bare payload, attributed to the reader's default source. Lines that
//! are not valid JSON are still handed to the store, which records the
//! decode failure and keeps going.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::error::AppError;
use crate::store::MetricsStore;

/// Source label for lines read from stdin.
pub const STDIN_SOURCE: &str = "stdin";

/// A payload wrapped with the name of the endpoint it came from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Source label.
    pub source: String,
    /// Raw payload.
    pub data: Value,
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Lines handed to the store.
    pub applied: usize,
    /// Of those, lines that were envelopes.
    pub envelopes: usize,
    /// Blank lines skipped.
    pub blank: usize,
}

/// How a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Whitespace only, nothing applied.
    Blank,
    /// An [`Envelope`], applied under its own source.
    Envelope,
    /// Anything else, applied under the default source.
    Bare,
}

/// Apply a single line to the store.
pub fn ingest_line(store: &MetricsStore, line: &str, default_source: &str) -> LineKind {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }
    if let Ok(envelope) = serde_json::from_str::<Envelope>(line) {
        store.update_from_raw(&envelope.data, Some(&envelope.source));
        return LineKind::Envelope;
    }
    store.update_from_json(line, Some(default_source));
    LineKind::Bare
}

/// Apply every line of `reader` to the store.
///
/// A line that is not valid UTF-8 is handed to the store as raw bytes, so it
/// is recorded as a decode failure and reading continues.
///
/// # Errors
///
/// Returns [`AppError::Io`] if reading fails. Lines applied before the
/// failure stay applied.
pub async fn ingest_reader<R>(
    store: &MetricsStore,
    mut reader: R,
    default_source: &str,
) -> Result<IngestReport, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = IngestReport::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| AppError::Io {
                path: default_source.to_string(),
                message: e.to_string(),
            })?;
        if read == 0 {
            break;
        }
        let kind = match std::str::from_utf8(strip_line_ending(&buf)) {
            Ok(line) => ingest_line(store, line, default_source),
            Err(e) => {
                tracing::debug!(source = default_source, error = %e, "Line is not valid UTF-8");
                store.update_from_json_bytes(strip_line_ending(&buf), Some(default_source));
                LineKind::Bare
            }
        };
        match kind {
            LineKind::Blank => report.blank += 1,
            LineKind::Envelope => {
                report.applied += 1;
                report.envelopes += 1;
            }
            LineKind::Bare => report.applied += 1,
        }
    }
    tracing::debug!(
        source = default_source,
        applied = report.applied,
        envelopes = report.envelopes,
        "Finished reading metrics input"
    );
    Ok(report)
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Apply every line of the file at `path`, attributed to the file name.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the file cannot be opened or read.
pub async fn ingest_file(store: &MetricsStore, path: &Path) -> Result<IngestReport, AppError> {
    let label = path.display().to_string();
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::Io {
            path: label.clone(),
            message: e.to_string(),
        })?;
    ingest_reader(store, BufReader::new(file), &label).await
}

/// Apply every line of stdin.
///
/// # Errors
///
/// Returns [`AppError::Io`] if stdin cannot be read.
pub async fn ingest_stdin(store: &MetricsStore) -> Result<IngestReport, AppError> {
    ingest_reader(store, BufReader::new(tokio::io::stdin()), STDIN_SOURCE).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_line() {
        let store = MetricsStore::new();
        let kind = ingest_line(
            &store,
            r#"{"source": "health", "data": {"memory_usage": 512}}"#,
            STDIN_SOURCE,
        );
        assert_eq!(kind, LineKind::Envelope);

        let state = store.snapshot();
        assert_eq!(state.current.memory_usage, 512.0);
        assert_eq!(state.last_source.as_deref(), Some("health"));
    }

    #[test]
    fn test_bare_line_uses_default_source() {
        let store = MetricsStore::new();
        ingest_line(&store, r#"{"latency": 12}"#, "metrics.jsonl");

        let state = store.snapshot();
        assert_eq!(state.current.latency, 12.0);
        assert_eq!(state.last_source.as_deref(), Some("metrics.jsonl"));
    }

    #[test]
    fn test_object_with_extra_keys_is_bare() {
        let store = MetricsStore::new();
        let kind = ingest_line(
            &store,
            r#"{"source": "x", "data": 1, "queue_size": 3}"#,
            STDIN_SOURCE,
        );
        assert_eq!(kind, LineKind::Bare);

        let state = store.snapshot();
        assert_eq!(state.current.queue_size, 3.0);
        assert_eq!(state.last_source.as_deref(), Some(STDIN_SOURCE));
    }

    #[test]
    fn test_blank_line_skipped() {
        let store = MetricsStore::new();
        let before = store.snapshot();
        assert_eq!(ingest_line(&store, "   ", STDIN_SOURCE), LineKind::Blank);
        assert!(std::sync::Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_garbage_line_recorded() {
        let store = MetricsStore::new();
        ingest_line(&store, r#"{"latency": 4}"#, STDIN_SOURCE);
        ingest_line(&store, "not json", STDIN_SOURCE);

        let state = store.snapshot();
        assert_eq!(state.current.latency, 4.0);
        assert!(state.error.is_some());
        assert_eq!(state.last_source.as_deref(), Some(STDIN_SOURCE));
    }

    #[tokio::test]
    async fn test_ingest_reader_counts_lines() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"source\": \"health\", \"data\": {\"cpu_usage\": 20}}\n")
            .read(b"\n{\"throughput\": 40}\n")
            .read(b"{\"throughput\": 45}")
            .build();
        let store = MetricsStore::new();

        let report = ingest_reader(&store, BufReader::new(input), STDIN_SOURCE)
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                applied: 3,
                envelopes: 1,
                blank: 1,
            }
        );
        let state = store.snapshot();
        assert_eq!(state.current.cpu_usage, 20.0);
        assert_eq!(state.current.throughput, 45.0);
    }

    #[tokio::test]
    async fn test_ingest_reader_io_error() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"latency\": 1}\n")
            .read_error(std::io::Error::other("pipe closed"))
            .build();
        let store = MetricsStore::new();

        let err = ingest_reader(&store, BufReader::new(input), STDIN_SOURCE)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Io { ref path, .. } if path == STDIN_SOURCE));
        assert_eq!(store.snapshot().current.latency, 1.0);
    }

    #[tokio::test]
    async fn test_ingest_reader_skips_invalid_utf8() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"latency\": 1}\n\xff\xfe garbage\n{\"latency\": 2}\n")
            .build();
        let store = MetricsStore::new();

        let report = ingest_reader(&store, BufReader::new(input), STDIN_SOURCE)
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                applied: 3,
                envelopes: 0,
                blank: 0,
            }
        );
        let state = store.snapshot();
        assert_eq!(state.current.latency, 2.0);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_ingest_reader_trailing_invalid_utf8_recorded() {
        let input = tokio_test::io::Builder::new()
            .read(b"{\"latency\": 1}\r\n")
            .read(b"\xff\xfe\r\n")
            .build();
        let store = MetricsStore::new();

        let report = ingest_reader(&store, BufReader::new(input), STDIN_SOURCE)
            .await
            .unwrap();

        assert_eq!(report.applied, 2);
        let state = store.snapshot();
        assert_eq!(state.current.latency, 1.0);
        assert_eq!(state.last_source.as_deref(), Some(STDIN_SOURCE));
        assert!(state
            .error
            .as_deref()
            .unwrap()
            .starts_with("Failed to decode metrics payload"));
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc\n"), b"abc");
        assert_eq!(strip_line_ending(b"abc"), b"abc");
    }

    #[tokio::test]
    async fn test_ingest_missing_file() {
        let store = MetricsStore::new();
        let err = ingest_file(&store, Path::new("/definitely/not/here.jsonl"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }
}
