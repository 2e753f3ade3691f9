//! Metrics normalization.
//!
//! Backend health and analytics endpoints disagree on payload shape: flat
//! snake_case, nested `performance` blocks, `infrastructure.cache` blocks,
//! strings where numbers belong, or nothing at all. This module turns any
//! of them into a [`NormalizedMetrics`] record whose known fields are always
//! finite numbers.
//!
//! Precedence, later steps win when both are present:
//!
//! 1. known camelCase keys (`cacheHitRate`, ...)
//! 2. known snake_case keys (`cache_hit_rate`, `avg_response_time_ms`, ...)
//! 3. `performance.{cache_hit_rate, avg_response_time_ms, error_rate}`
//! 4. `infrastructure.cache.hit_rate_percent`
//! 5. remaining underscore keys, camelCased into `extras`
//!
//! # Example
//!
//! ```
//! use prop_metrics::normalize::normalize_metrics;
//! use serde_json::json;
//!
//! let metrics = normalize_metrics(&json!({
//!     "cache_hit_rate": 0.5,
//!     "infrastructure": { "cache": { "hit_rate_percent": 92.5 } },
//!     "queue_size": "17",
//! }));
//! assert!((metrics.cache_hit_rate - 92.5).abs() < f64::EPSILON);
//! assert!((metrics.queue_size - 17.0).abs() < f64::EPSILON);
//! assert!((metrics.latency - 0.0).abs() < f64::EPSILON);
//! ```

mod parsing;
mod types;

pub use parsing::{
    coerce_number, safe_number, to_camel_case, PayloadSections, RawMetricsInput, Section,
};
pub use types::{ExtraValue, MetricField, MetricsPatch, NormalizedMetrics, DEFAULT_METRICS};

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::traits::MetricsNormalizer;

use parsing::first_number;

/// Keys read from `performance.*`, with the field each overrides.
const PERFORMANCE_KEYS: [(MetricField, &[&str]); 3] = [
    (MetricField::CacheHitRate, &["cache_hit_rate"]),
    (
        MetricField::AvgResponseTime,
        &["avg_response_time_ms", "avg_response_time"],
    ),
    (MetricField::ErrorRate, &["error_rate"]),
];

/// Key read from `infrastructure.cache.*`.
const INFRASTRUCTURE_HIT_RATE_KEY: &str = "hit_rate_percent";

/// How unrecognized underscore keys are treated.
///
/// `Passthrough` keeps the dashboard forward compatible: a new backend field
/// shows up in `extras` without a release, at the cost of `extras` being
/// loosely typed. The allow-list variants trade that for a reviewed set of
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtraFieldPolicy {
    /// Ingest every unrecognized underscore key.
    #[default]
    Passthrough,
    /// Ingest only the listed snake_case keys, drop the rest silently.
    AllowList(BTreeSet<String>),
    /// Ingest only the listed snake_case keys, fail on any other.
    Reject(BTreeSet<String>),
}

impl ExtraFieldPolicy {
    fn admits(&self, key: &str) -> Result<bool, NormalizeError> {
        match self {
            Self::Passthrough => Ok(true),
            Self::AllowList(allowed) => Ok(allowed.contains(key)),
            Self::Reject(allowed) if allowed.contains(key) => Ok(true),
            Self::Reject(_) => Err(NormalizeError::UnexpectedField {
                field: key.to_string(),
            }),
        }
    }

    const fn is_strict(&self) -> bool {
        matches!(self, Self::Reject(_))
    }
}

/// Production [`MetricsNormalizer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadNormalizer {
    extra_fields: ExtraFieldPolicy,
}

impl PayloadNormalizer {
    /// Create a normalizer with the passthrough policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy for unrecognized fields.
    #[must_use]
    pub fn with_extra_fields(mut self, policy: ExtraFieldPolicy) -> Self {
        self.extra_fields = policy;
        self
    }

    /// The configured extra-field policy.
    #[must_use]
    pub const fn extra_fields(&self) -> &ExtraFieldPolicy {
        &self.extra_fields
    }

    /// Compute the patch a raw payload carries.
    ///
    /// # Errors
    ///
    /// Only the [`ExtraFieldPolicy::Reject`] policy fails:
    /// - [`NormalizeError::UnexpectedField`] for a key outside the list
    /// - [`NormalizeError::InvalidShape`] for a non-object payload or a
    ///   non-object `performance`/`infrastructure.cache` section
    pub fn patch(&self, raw: &Value) -> Result<MetricsPatch, NormalizeError> {
        match RawMetricsInput::classify(raw) {
            RawMetricsInput::Missing => Ok(MetricsPatch::default()),
            RawMetricsInput::Unstructured(value) => {
                if self.extra_fields.is_strict() {
                    return Err(NormalizeError::InvalidShape {
                        message: format!("expected an object, got {}", json_kind(value)),
                    });
                }
                tracing::debug!(kind = json_kind(value), "Ignoring unstructured metrics payload");
                Ok(MetricsPatch::default())
            }
            RawMetricsInput::Payload(sections) => self.patch_payload(sections),
        }
    }

    fn patch_payload(&self, sections: PayloadSections<'_>) -> Result<MetricsPatch, NormalizeError> {
        let mut patch = MetricsPatch::default();

        for field in MetricField::ALL {
            if let Some(value) = first_number(sections.top, &[field.camel_name()]) {
                patch.set(field, value);
            }
        }

        for field in MetricField::ALL {
            if let Some(value) = first_number(sections.top, field.snake_aliases()) {
                patch.set(field, value);
            }
        }

        match sections.performance {
            Section::Object(performance) => {
                for (field, keys) in PERFORMANCE_KEYS {
                    if let Some(value) = first_number(performance, keys) {
                        patch.set(field, value);
                    }
                }
            }
            Section::Malformed => self.malformed_section("performance")?,
            Section::Absent => {}
        }

        match sections.infrastructure_cache {
            Section::Object(cache) => {
                if let Some(value) = cache.get(INFRASTRUCTURE_HIT_RATE_KEY).and_then(coerce_number)
                {
                    patch.set(MetricField::CacheHitRate, value);
                }
            }
            Section::Malformed => self.malformed_section("infrastructure.cache")?,
            Section::Absent => {}
        }

        self.collect_extras(sections.top, &mut patch)?;
        Ok(patch)
    }

    fn malformed_section(&self, name: &str) -> Result<(), NormalizeError> {
        if self.extra_fields.is_strict() {
            return Err(NormalizeError::InvalidShape {
                message: format!("{name} must be an object"),
            });
        }
        tracing::debug!(section = name, "Ignoring malformed metrics section");
        Ok(())
    }

    fn collect_extras(
        &self,
        top: &Map<String, Value>,
        patch: &mut MetricsPatch,
    ) -> Result<(), NormalizeError> {
        for (key, value) in top {
            if !key.contains('_') || MetricField::is_recognized(key) {
                continue;
            }
            if !self.extra_fields.admits(key)? {
                tracing::debug!(field = %key, "Dropping field outside allow-list");
                continue;
            }
            let name = to_camel_case(key);
            if MetricField::is_recognized(&name) {
                tracing::debug!(field = %key, "Skipping extra that would shadow a known field");
                continue;
            }
            let extra = match value {
                Value::Bool(flag) => Some(ExtraValue::Flag(*flag)),
                Value::Number(_) | Value::String(_) => coerce_number(value).map(ExtraValue::Number),
                Value::Null | Value::Array(_) | Value::Object(_) => None,
            };
            if let Some(extra) = extra {
                patch.extras.insert(name, extra);
            }
        }
        Ok(())
    }
}

impl MetricsNormalizer for PayloadNormalizer {
    fn normalize(&self, raw: &Value) -> Result<MetricsPatch, NormalizeError> {
        self.patch(raw)
    }
}

/// Normalize any raw payload into a fully populated record.
///
/// Never fails: a payload the default normalizer rejects yields a fresh
/// copy of [`DEFAULT_METRICS`].
#[must_use]
pub fn normalize_metrics(raw: &Value) -> NormalizedMetrics {
    normalize_with(&PayloadNormalizer::default(), raw)
}

/// Normalize with a specific normalizer, absorbing failures into defaults.
#[must_use]
pub fn normalize_with(normalizer: &dyn MetricsNormalizer, raw: &Value) -> NormalizedMetrics {
    match normalizer.normalize(raw) {
        Ok(patch) => DEFAULT_METRICS.merged(&patch),
        Err(error) => {
            tracing::warn!(error = %error, "Metrics normalization failed, using defaults");
            DEFAULT_METRICS
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
