//! Reactive metrics store.
//!
//! [`MetricsStore`] holds the latest [`NormalizedMetrics`] together with
//! update metadata and publishes every change as a fresh
//! `Arc<MetricsState>` through a [`tokio::sync::watch`] channel.
//!
//! Published snapshots are never mutated. A reader holding an older
//! snapshot keeps a consistent view, and `Arc::ptr_eq` tells whether
//! anything changed since.
//!
//! No operation returns an error or panics. Failed updates are recorded in
//! [`MetricsState::error`] and leave the metrics as they were.
//!
//! # Example
//!
//! ```
//! use prop_metrics::store::{MetricsSource, MetricsStore};
//! use serde_json::json;
//!
//! let store = MetricsStore::new();
//! store.update_from_raw(&json!({ "memory_usage": 512 }), Some("health"));
//! store.update_from_multiple_sources(&[
//!     MetricsSource::new("performance", json!({ "performance": { "cache_hit_rate": 88 } })),
//!     MetricsSource::new("analytics", json!({ "avg_response_time_ms": 140 })),
//! ]);
//!
//! let state = store.snapshot();
//! assert_eq!(state.last_source.as_deref(), Some("performance, analytics"));
//! assert!((state.current.memory_usage - 512.0).abs() < f64::EPSILON);
//! assert!((state.current.avg_response_time - 140.0).abs() < f64::EPSILON);
//! assert_eq!(store.cache_hit_rate().formatted, "88.0%");
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::normalize::{MetricsPatch, NormalizedMetrics, PayloadNormalizer, DEFAULT_METRICS};
use crate::selectors::{self, CacheHitRate, SelectorSettings};
use crate::traits::{MetricsNormalizer, RealTimeProvider, TimeProvider};

/// `last_source` of a freshly constructed store.
pub const DEFAULT_SOURCE: &str = "default";

/// `last_source` of an update that named no source.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// `last_source` after [`MetricsStore::reset`].
pub const RESET_SOURCE: &str = "reset";

/// Separator used when joining source names of a batched update.
pub const SOURCE_SEPARATOR: &str = ", ";

/// Default age after which a snapshot counts as stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

/// A published store snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsState {
    /// Latest merged metrics.
    pub current: NormalizedMetrics,
    /// When the metrics were last replaced.
    pub last_updated: DateTime<Utc>,
    /// Whether a caller is fetching new data.
    pub is_loading: bool,
    /// Label of the last update's source(s).
    pub last_source: Option<String>,
    /// Message of the last failed update, if not cleared since.
    pub error: Option<String>,
}

impl MetricsState {
    fn initial(now: DateTime<Utc>) -> Self {
        Self {
            current: DEFAULT_METRICS,
            last_updated: now,
            is_loading: false,
            last_source: Some(DEFAULT_SOURCE.to_string()),
            error: None,
        }
    }

    /// Read a single metric, see [`selectors::metric`].
    #[must_use]
    pub fn metric(&self, key: &str, fallback: Option<f64>) -> f64 {
        selectors::metric(&self.current, key, fallback)
    }

    /// Whether the metrics are older than `max_age` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        TimeDelta::from_std(max_age)
            .is_ok_and(|max_age| now.signed_duration_since(self.last_updated) > max_age)
    }
}

/// One payload of a batched update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSource {
    /// Raw payload.
    pub data: Value,
    /// Label of the endpoint or caller that produced it.
    pub source: String,
}

impl MetricsSource {
    /// Create a batch entry.
    #[must_use]
    pub fn new(source: impl Into<String>, data: Value) -> Self {
        Self {
            data,
            source: source.into(),
        }
    }
}

/// Everything a dashboard needs from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    /// Latest merged metrics.
    pub metrics: NormalizedMetrics,
    /// Cache hit rate view.
    pub cache_hit_rate: CacheHitRate,
    /// When the metrics were last replaced.
    pub last_updated: DateTime<Utc>,
    /// Label of the last update's source(s).
    pub last_source: Option<String>,
    /// Whether a caller is fetching new data.
    pub is_loading: bool,
    /// Whether the snapshot is older than the store's stale threshold.
    pub is_stale: bool,
    /// Message of the last failed update.
    pub error: Option<String>,
}

impl MetricsSummary {
    /// JSON Schema of the summary document.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(MetricsSummary)
    }
}

/// Builder for [`MetricsStore`].
pub struct MetricsStoreBuilder {
    normalizer: Box<dyn MetricsNormalizer>,
    clock: Box<dyn TimeProvider>,
    settings: SelectorSettings,
    stale_after: Duration,
}

impl Default for MetricsStoreBuilder {
    fn default() -> Self {
        Self {
            normalizer: Box::new(PayloadNormalizer::default()),
            clock: Box::new(RealTimeProvider),
            settings: SelectorSettings::default(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

impl MetricsStoreBuilder {
    /// Use a custom normalizer.
    #[must_use]
    pub fn normalizer(mut self, normalizer: impl MetricsNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Use a custom clock.
    #[must_use]
    pub fn clock(mut self, clock: impl TimeProvider + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Set the accessor settings.
    #[must_use]
    pub const fn settings(mut self, settings: SelectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the age after which [`MetricsStore::summary`] reports staleness.
    #[must_use]
    pub const fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Build the store. Its initial snapshot holds [`DEFAULT_METRICS`].
    #[must_use]
    pub fn build(self) -> MetricsStore {
        let initial = MetricsState::initial(self.clock.now());
        let (tx, _rx) = watch::channel(Arc::new(initial));
        MetricsStore {
            tx,
            normalizer: self.normalizer,
            clock: self.clock,
            settings: self.settings,
            stale_after: self.stale_after,
        }
    }
}

/// Single-writer store for normalized metrics.
///
/// Construct one per composition root and pass it to whatever polls the
/// backend; share it behind an `Arc` when several tasks update it.
pub struct MetricsStore {
    tx: watch::Sender<Arc<MetricsState>>,
    normalizer: Box<dyn MetricsNormalizer>,
    clock: Box<dyn TimeProvider>,
    settings: SelectorSettings,
    stale_after: Duration,
}

impl std::fmt::Debug for MetricsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsStore")
            .field("state", &self.snapshot())
            .field("settings", &self.settings)
            .field("stale_after", &self.stale_after)
            .finish_non_exhaustive()
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsStore {
    /// Create a store with the default normalizer, clock and settings.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a store.
    #[must_use]
    pub fn builder() -> MetricsStoreBuilder {
        MetricsStoreBuilder::default()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MetricsState> {
        Arc::clone(&self.tx.borrow())
    }

    /// Subscribe to snapshot changes.
    ///
    /// The receiver starts at the current snapshot and is notified on every
    /// publish.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricsState>> {
        self.tx.subscribe()
    }

    /// The accessor settings in use.
    #[must_use]
    pub const fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    /// Read a single metric from the latest snapshot.
    #[must_use]
    pub fn metric(&self, key: &str, fallback: Option<f64>) -> f64 {
        self.snapshot().metric(key, fallback)
    }

    /// Cache hit rate view of the latest snapshot.
    #[must_use]
    pub fn cache_hit_rate(&self) -> CacheHitRate {
        selectors::cache_hit_rate(&self.snapshot().current, &self.settings)
    }

    /// Summary of the latest snapshot.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let state = self.snapshot();
        MetricsSummary {
            metrics: state.current.clone(),
            cache_hit_rate: selectors::cache_hit_rate(&state.current, &self.settings),
            last_updated: state.last_updated,
            last_source: state.last_source.clone(),
            is_loading: state.is_loading,
            is_stale: state.is_stale(self.clock.now(), self.stale_after),
            error: state.error.clone(),
        }
    }

    // ========================================================================
    // Updates
    // ========================================================================

    /// Normalize `raw` and merge it into the current metrics.
    ///
    /// Fields the payload does not carry keep their value. On success the
    /// error is cleared, loading stops and `last_source` becomes `source`
    /// (or `"unknown"`). On failure only the error is recorded.
    pub fn update_from_raw(&self, raw: &Value, source: Option<&str>) {
        let source = source.unwrap_or(UNKNOWN_SOURCE);
        match self.normalizer.normalize(raw) {
            Ok(patch) => self.apply(&patch, source.to_string()),
            Err(error) => self.record_failure(&StoreError::Normalize {
                source_name: source.to_string(),
                error,
            }),
        }
    }

    /// Decode a JSON body and merge it like [`Self::update_from_raw`].
    pub fn update_from_json(&self, body: &str, source: Option<&str>) {
        match serde_json::from_str::<Value>(body) {
            Ok(raw) => self.update_from_raw(&raw, source),
            Err(err) => self.record_failure(&StoreError::from(err)),
        }
    }

    /// Decode a JSON body given as raw bytes and merge it like
    /// [`Self::update_from_raw`]. Bytes that are not UTF-8 are a decode
    /// failure.
    pub fn update_from_json_bytes(&self, body: &[u8], source: Option<&str>) {
        match serde_json::from_slice::<Value>(body) {
            Ok(raw) => self.update_from_raw(&raw, source),
            Err(err) => self.record_failure(&StoreError::from(err)),
        }
    }

    /// Normalize several payloads and merge them as one update.
    ///
    /// Later entries win on overlapping fields. `last_source` becomes the
    /// comma-joined source names. If any entry fails to normalize, nothing
    /// is merged and the failure is recorded.
    pub fn update_from_multiple_sources(&self, sources: &[MetricsSource]) {
        let mut combined = MetricsPatch::default();
        for entry in sources {
            match self.normalizer.normalize(&entry.data) {
                Ok(patch) => combined.absorb(patch),
                Err(error) => {
                    self.record_failure(&StoreError::Normalize {
                        source_name: entry.source.clone(),
                        error,
                    });
                    return;
                }
            }
        }
        let label = sources
            .iter()
            .map(|entry| entry.source.as_str())
            .collect::<Vec<_>>()
            .join(SOURCE_SEPARATOR);
        self.apply(&combined, label);
    }

    /// Set the loading flag.
    pub fn set_loading(&self, is_loading: bool) {
        self.publish_if(|state| state.is_loading != is_loading, |next| {
            next.is_loading = is_loading;
        });
    }

    /// Record an error message.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.publish_if(
            |state| state.error.as_deref() != Some(message.as_str()),
            |next| next.error = Some(message.clone()),
        );
    }

    /// Clear the recorded error.
    pub fn clear_error(&self) {
        self.publish_if(|state| state.error.is_some(), |next| next.error = None);
    }

    /// Restore default metrics and clear error and loading.
    pub fn reset(&self) {
        let now = self.clock.now();
        self.tx.send_modify(|state| {
            *state = Arc::new(MetricsState {
                current: DEFAULT_METRICS,
                last_updated: now,
                is_loading: false,
                last_source: Some(RESET_SOURCE.to_string()),
                error: None,
            });
        });
        tracing::info!("Metrics store reset to defaults");
    }

    fn apply(&self, patch: &MetricsPatch, source: String) {
        let now = self.clock.now();
        tracing::debug!(source = %source, fields = patch.len(), "Merging metrics update");
        self.tx.send_modify(|state| {
            *state = Arc::new(MetricsState {
                current: state.current.merged(patch),
                last_updated: now,
                is_loading: false,
                last_source: Some(source),
                error: None,
            });
        });
    }

    fn record_failure(&self, error: &StoreError) {
        let message = error.to_string();
        tracing::warn!(error = %message, "Metrics update failed, keeping previous metrics");
        self.tx.send_modify(|state| {
            let mut next = MetricsState::clone(&**state);
            next.error = Some(message);
            *state = Arc::new(next);
        });
    }

    /// Publish a modified copy of the current snapshot if `changed` holds.
    fn publish_if(
        &self,
        changed: impl FnOnce(&MetricsState) -> bool,
        modify: impl FnOnce(&mut MetricsState),
    ) {
        self.tx.send_if_modified(|state| {
            if !changed(&**state) {
                return false;
            }
            let mut next = MetricsState::clone(&**state);
            modify(&mut next);
            *state = Arc::new(next);
            true
        });
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::significant_drop_tightening
)]
mod tests {
    use super::*;
    use crate::error::NormalizeError;
    use crate::normalize::ExtraValue;
    use crate::selectors::CacheHealthStatus;
    use crate::test_utils::{
        analytics_payload, fixed_time, health_payload, infrastructure_payload, mock_clock_at,
        mock_failing_normalizer, mock_ticking_clock,
    };
    use crate::traits::{MockMetricsNormalizer, MockTimeProvider};
    use serde_json::json;
    use static_assertions::assert_impl_all;

    assert_impl_all!(MetricsStore: Send, Sync);
    assert_impl_all!(MetricsState: Send, Sync, Clone);

    fn fixed_clock() -> MockTimeProvider {
        mock_clock_at(fixed_time())
    }

    fn failing_normalizer() -> MockMetricsNormalizer {
        mock_failing_normalizer(NormalizeError::UnexpectedField {
            field: "mystery_field".into(),
        })
    }

    #[test]
    fn test_initial_state() {
        let store = MetricsStore::builder().clock(fixed_clock()).build();
        let state = store.snapshot();

        assert_eq!(state.current, DEFAULT_METRICS);
        assert_eq!(state.last_source.as_deref(), Some(DEFAULT_SOURCE));
        assert_eq!(state.last_updated, fixed_time());
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_update_from_raw_sets_metadata() {
        let store = MetricsStore::builder().clock(fixed_clock()).build();
        store.set_loading(true);
        store.set_error("stale");

        store.update_from_raw(&json!({"latency": 42}), Some("health"));

        let state = store.snapshot();
        assert_eq!(state.current.latency, 42.0);
        assert_eq!(state.last_source.as_deref(), Some("health"));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_update_from_raw_default_source() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"latency": 1}), None);
        assert_eq!(store.snapshot().last_source.as_deref(), Some(UNKNOWN_SOURCE));
    }

    #[test]
    fn test_merge_preserves_unrelated_fields() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"memory_usage": 512}), Some("system"));
        store.update_from_raw(&json!({"cacheHitRate": 10}), Some("cache"));

        let state = store.snapshot();
        assert_eq!(state.current.memory_usage, 512.0);
        assert_eq!(state.current.cache_hit_rate, 10.0);
    }

    #[test]
    fn test_garbage_input_keeps_metrics() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"queue_size": 9}), Some("queue"));

        for raw in [Value::Null, json!(17), json!("oops"), json!([{"queue_size": 1}])] {
            store.update_from_raw(&raw, Some("garbage"));
        }

        let state = store.snapshot();
        assert_eq!(state.current.queue_size, 9.0);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_normalizer_failure_recorded() {
        let store = MetricsStore::builder()
            .normalizer(failing_normalizer())
            .clock(fixed_clock())
            .build();
        store.set_loading(true);
        let before = store.snapshot();

        store.update_from_raw(&json!({"latency": 42}), Some("health"));

        let after = store.snapshot();
        assert_eq!(after.current, before.current);
        assert_eq!(after.last_source, before.last_source);
        assert_eq!(after.last_updated, before.last_updated);
        assert!(after.is_loading);
        assert_eq!(
            after.error.as_deref(),
            Some("Failed to normalize metrics from health: Unexpected field: mystery_field")
        );
    }

    #[test]
    fn test_update_from_json_decode_failure() {
        let store = MetricsStore::new();
        store.update_from_json(r#"{"latency": 3}"#, Some("api"));
        store.update_from_json("{latency: ", Some("api"));

        let state = store.snapshot();
        assert_eq!(state.current.latency, 3.0);
        let error = state.error.as_deref().unwrap();
        assert!(error.starts_with("Failed to decode metrics payload"));
    }

    #[test]
    fn test_update_from_json_bytes_rejects_invalid_utf8() {
        let store = MetricsStore::new();
        store.update_from_json_bytes(br#"{"latency": 3}"#, Some("api"));
        store.update_from_json_bytes(b"\xff\xfe garbage", Some("api"));

        let state = store.snapshot();
        assert_eq!(state.current.latency, 3.0);
        assert_eq!(state.last_source.as_deref(), Some("api"));
        let error = state.error.as_deref().unwrap();
        assert!(error.starts_with("Failed to decode metrics payload"));

        store.update_from_json_bytes(br#"{"latency": 4}"#, Some("api"));
        let state = store.snapshot();
        assert_eq!(state.current.latency, 4.0);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_multiple_sources_combine_without_loss() {
        let store = MetricsStore::new();
        store.update_from_multiple_sources(&[
            MetricsSource::new("health", json!({"performance": {"cache_hit_rate": 85}})),
            MetricsSource::new("analytics", json!({"avg_response_time_ms": 230})),
        ]);

        let state = store.snapshot();
        assert_eq!(state.current.cache_hit_rate, 85.0);
        assert_eq!(state.current.avg_response_time, 230.0);
        assert_eq!(state.last_source.as_deref(), Some("health, analytics"));
    }

    #[test]
    fn test_multiple_sources_later_wins() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"cpu_usage": 5}), Some("system"));
        store.update_from_multiple_sources(&[
            MetricsSource::new("a", json!({"latency": 10, "win_streak": 1})),
            MetricsSource::new("b", json!({"latency": 20})),
        ]);

        let state = store.snapshot();
        assert_eq!(state.current.latency, 20.0);
        assert_eq!(state.current.cpu_usage, 5.0);
        assert_eq!(
            state.current.extras.get("winStreak"),
            Some(&ExtraValue::Number(1.0))
        );
    }

    #[test]
    fn test_multiple_sources_failure_rejects_batch() {
        let mut normalizer = MockMetricsNormalizer::new();
        normalizer.expect_normalize().returning(|raw| {
            if raw.get("bad").is_some() {
                Err(NormalizeError::InvalidShape {
                    message: "bad payload".into(),
                })
            } else {
                PayloadNormalizer::default().patch(raw)
            }
        });
        let store = MetricsStore::builder().normalizer(normalizer).build();

        store.update_from_multiple_sources(&[
            MetricsSource::new("good", json!({"latency": 10})),
            MetricsSource::new("broken", json!({"bad": true})),
        ]);

        let state = store.snapshot();
        assert_eq!(state.current.latency, 0.0);
        assert_eq!(state.last_source.as_deref(), Some(DEFAULT_SOURCE));
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to normalize metrics from broken: Invalid payload shape: bad payload")
        );
    }

    #[test]
    fn test_multiple_sources_empty() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"latency": 4}), Some("x"));
        store.update_from_multiple_sources(&[]);

        let state = store.snapshot();
        assert_eq!(state.current.latency, 4.0);
        assert_eq!(state.last_source.as_deref(), Some(""));
    }

    #[test]
    fn test_reset() {
        let store = MetricsStore::builder()
            .clock(mock_ticking_clock(fixed_time(), TimeDelta::seconds(10)))
            .build();
        store.update_from_raw(&json!({"memory_usage": 512, "live_feed": true}), Some("x"));
        store.set_loading(true);
        store.set_error("boom");
        let before = store.snapshot();
        assert_eq!(before.last_updated, fixed_time() + TimeDelta::seconds(10));

        store.reset();

        let state = store.snapshot();
        assert_eq!(state.current, DEFAULT_METRICS);
        assert_eq!(state.last_source.as_deref(), Some(RESET_SOURCE));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        // Flag changes don't read the clock; reset does.
        assert_eq!(state.last_updated, fixed_time() + TimeDelta::seconds(20));
        assert!(state.last_updated > before.last_updated);
    }

    #[test]
    fn test_reset_then_empty_update_matches_defaults() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"latency": 9}), Some("x"));
        store.reset();
        store.update_from_raw(&Value::Null, Some("poller"));

        assert_eq!(store.snapshot().current, DEFAULT_METRICS);
    }

    #[test]
    fn test_flag_operations_have_no_side_effects() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"latency": 7}), Some("x"));
        let before = store.snapshot();

        store.set_loading(true);
        store.set_error("timeout");
        let state = store.snapshot();
        assert!(state.is_loading);
        assert_eq!(state.error.as_deref(), Some("timeout"));
        assert_eq!(state.current, before.current);
        assert_eq!(state.last_source, before.last_source);
        assert_eq!(state.last_updated, before.last_updated);

        store.clear_error();
        assert!(store.snapshot().error.is_none());
        assert!(store.snapshot().is_loading);
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"latency": 1}), Some("x"));
        let before = store.snapshot();

        store.update_from_raw(&json!({"latency": 2}), Some("y"));
        let after = store.snapshot();

        assert_eq!(before.current.latency, 1.0);
        assert_eq!(after.current.latency, 2.0);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_unchanged_flags_do_not_publish() {
        let store = MetricsStore::new();
        let before = store.snapshot();

        store.set_loading(false);
        store.clear_error();

        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_cache_hit_rate_accessor() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"cacheHitRate": 95}), Some("cache"));

        let view = store.cache_hit_rate();
        assert_eq!(view.raw, 95.0);
        assert_eq!(view.percentage, 95.0);
        assert_eq!(view.formatted, "95.0%");
        assert!(view.is_healthy);
        assert_eq!(view.status, CacheHealthStatus::Excellent);
    }

    #[test]
    fn test_metric_accessor() {
        let store = MetricsStore::new();
        store.update_from_raw(&json!({"memory_usage": 512, "edge_pct": 2.5}), None);

        assert_eq!(store.metric("memoryUsage", None), 512.0);
        assert_eq!(store.metric("edgePct", Some(0.0)), 2.5);
        assert_eq!(store.metric("missing", Some(11.0)), 11.0);
    }

    #[test]
    fn test_summary_staleness() {
        // Construction reads the clock once; the summary reads it again.
        let store = MetricsStore::builder()
            .clock(mock_ticking_clock(fixed_time(), TimeDelta::seconds(600)))
            .stale_after(Duration::from_secs(300))
            .build();

        let summary = store.summary();
        assert!(summary.is_stale);
        assert_eq!(summary.last_source.as_deref(), Some(DEFAULT_SOURCE));
        assert_eq!(summary.cache_hit_rate.formatted, "0.0%");
    }

    #[test]
    fn test_summary_fresh_after_update() {
        let store = MetricsStore::builder()
            .clock(mock_ticking_clock(fixed_time(), TimeDelta::seconds(1)))
            .build();
        store.update_from_raw(&health_payload(), Some("health"));

        let summary = store.summary();
        assert!(!summary.is_stale);
        assert_eq!(summary.metrics.memory_usage, 512.0);
        assert_eq!(summary.cache_hit_rate.status, CacheHealthStatus::Good);
        assert_eq!(summary.last_updated, fixed_time() + TimeDelta::seconds(1));
    }

    #[test]
    fn test_endpoint_fixtures_combine() {
        let store = MetricsStore::new();
        store.update_from_multiple_sources(&[
            MetricsSource::new("health", health_payload()),
            MetricsSource::new("analytics", analytics_payload()),
            MetricsSource::new("infrastructure", infrastructure_payload()),
        ]);

        let current = &store.snapshot().current;
        assert_eq!(current.cache_hit_rate, 92.5);
        assert_eq!(current.avg_response_time, 230.0);
        assert_eq!(current.cpu_usage, 37.5);
        assert_eq!(current.total_requests, 10_000.0);
        assert_eq!(current.extras.get("liveFeed"), Some(&ExtraValue::Flag(true)));
        assert!(!current.extras.contains_key("bookmakerName"));
    }

    #[test]
    fn test_is_stale() {
        let state = MetricsState::initial(fixed_time());
        let max_age = Duration::from_secs(60);
        assert!(!state.is_stale(fixed_time() + TimeDelta::seconds(60), max_age));
        assert!(state.is_stale(fixed_time() + TimeDelta::seconds(61), max_age));
    }

    #[tokio::test]
    async fn test_subscribers_notified() {
        let store = MetricsStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.update_from_raw(&json!({"throughput": 120}), Some("stream"));

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.current.throughput, 120.0);
        assert_eq!(state.last_source.as_deref(), Some("stream"));
    }

    #[test]
    fn test_concurrent_updates_last_writer_wins() {
        let store = MetricsStore::new();
        std::thread::scope(|scope| {
            for i in 0..8_u32 {
                let store = &store;
                scope.spawn(move || {
                    store.update_from_raw(
                        &json!({ "queue_size": i, (format!("worker_{i}")): true }),
                        Some("worker"),
                    );
                });
            }
        });

        let state = store.snapshot();
        // Every update merged; none was lost to interleaving.
        assert_eq!(state.current.extras.len(), 8);
        assert!((0.0..8.0).contains(&state.current.queue_size));
    }

    #[test]
    fn test_summary_schema_lists_fields() {
        let schema = serde_json::to_value(MetricsSummary::json_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for key in ["metrics", "cacheHitRate", "lastUpdated", "isStale", "error"] {
            assert!(properties.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let store = MetricsStore::builder().clock(fixed_clock()).build();
        let json = serde_json::to_value(&*store.snapshot()).unwrap();
        assert_eq!(json["lastSource"], "default");
        assert_eq!(json["isLoading"], false);
        assert_eq!(json["current"]["cacheHitRate"], 0.0);
    }
}
