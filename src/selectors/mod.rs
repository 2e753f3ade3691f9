//! Derived, read-only views over normalized metrics.
//!
//! - [`metric`]: single-field lookup with fallback
//! - [`cache_hit_rate`]: percentage, formatting and health classification
//!
//! # Example
//!
//! ```
//! use prop_metrics::normalize::normalize_metrics;
//! use prop_metrics::selectors::{cache_hit_rate, CacheHealthStatus, SelectorSettings};
//! use serde_json::json;
//!
//! let metrics = normalize_metrics(&json!({ "cache_hit_rate": 95.5 }));
//! let view = cache_hit_rate(&metrics, &SelectorSettings::default());
//! assert_eq!(view.formatted, "95.5%");
//! assert_eq!(view.status, CacheHealthStatus::Excellent);
//! assert!(view.is_healthy);
//! ```

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::{MetricField, NormalizedMetrics};

/// Default lower bound of [`CacheHealthStatus::Fair`].
pub const DEFAULT_FAIR_THRESHOLD: f64 = 50.0;

/// Default lower bound of [`CacheHealthStatus::Good`]; also the healthy cut-off.
pub const DEFAULT_GOOD_THRESHOLD: f64 = 70.0;

/// Default lower bound of [`CacheHealthStatus::Excellent`].
pub const DEFAULT_EXCELLENT_THRESHOLD: f64 = 90.0;

/// How a stored cache hit rate should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CacheRateUnit {
    /// Values at or below 1 are fractions, anything above is a percentage.
    ///
    /// A true 1% hit rate reads as 100% under this rule.
    #[default]
    Auto,
    /// Values are already percentages.
    Percent,
    /// Values are fractions in `[0, 1]`.
    Fraction,
}

impl FromStr for CacheRateUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "percent" => Ok(Self::Percent),
            "fraction" => Ok(Self::Fraction),
            _ => Err(ConfigError::InvalidValue {
                var: "CACHE_RATE_UNIT".into(),
                reason: format!("must be auto, percent, or fraction, got {s}"),
            }),
        }
    }
}

/// Qualitative cache health.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum CacheHealthStatus {
    /// Below the fair threshold.
    Poor,
    /// Fair threshold up to (excluding) good.
    Fair,
    /// Good threshold up to (excluding) excellent.
    Good,
    /// At or above the excellent threshold.
    Excellent,
}

impl std::fmt::Display for CacheHealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Poor => "poor",
            Self::Fair => "fair",
            Self::Good => "good",
            Self::Excellent => "excellent",
        };
        f.write_str(label)
    }
}

/// Lower bounds (inclusive, in percent) for each status above `Poor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusThresholds {
    /// Lower bound of `Fair`.
    pub fair: f64,
    /// Lower bound of `Good`. Percentages at or above this are healthy.
    pub good: f64,
    /// Lower bound of `Excellent`.
    pub excellent: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            fair: DEFAULT_FAIR_THRESHOLD,
            good: DEFAULT_GOOD_THRESHOLD,
            excellent: DEFAULT_EXCELLENT_THRESHOLD,
        }
    }
}

impl StatusThresholds {
    /// Classify a percentage.
    #[must_use]
    pub fn classify(&self, percentage: f64) -> CacheHealthStatus {
        if percentage >= self.excellent {
            CacheHealthStatus::Excellent
        } else if percentage >= self.good {
            CacheHealthStatus::Good
        } else if percentage >= self.fair {
            CacheHealthStatus::Fair
        } else {
            CacheHealthStatus::Poor
        }
    }

    /// Whether a percentage counts as healthy.
    #[must_use]
    pub fn is_healthy(&self, percentage: f64) -> bool {
        percentage >= self.good
    }
}

/// Settings shared by the derived accessors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectorSettings {
    /// How to read the stored cache hit rate.
    pub cache_rate_unit: CacheRateUnit,
    /// Status thresholds.
    pub thresholds: StatusThresholds,
}

/// Cache hit rate as the dashboard displays it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheHitRate {
    /// The stored value, unscaled.
    pub raw: f64,
    /// The value as a percentage in `[0, 100]`.
    pub percentage: f64,
    /// The percentage with one decimal place, e.g. `95.5%`.
    pub formatted: String,
    /// Whether the percentage meets the good threshold.
    pub is_healthy: bool,
    /// Qualitative status.
    pub status: CacheHealthStatus,
}

/// Convert a stored cache hit rate to a percentage in `[0, 100]`.
#[must_use]
pub fn to_percentage(raw: f64, unit: CacheRateUnit) -> f64 {
    let scaled = match unit {
        CacheRateUnit::Auto if raw <= 1.0 => raw * 100.0,
        CacheRateUnit::Auto | CacheRateUnit::Percent => raw,
        CacheRateUnit::Fraction => raw * 100.0,
    };
    if scaled.is_finite() {
        // `+ 0.0` turns -0.0 into 0.0
        scaled.clamp(0.0, 100.0) + 0.0
    } else {
        0.0
    }
}

/// Build the cache hit rate view for `metrics`.
#[must_use]
pub fn cache_hit_rate(metrics: &NormalizedMetrics, settings: &SelectorSettings) -> CacheHitRate {
    let raw = metrics.cache_hit_rate;
    let percentage = to_percentage(raw, settings.cache_rate_unit);
    CacheHitRate {
        raw,
        percentage,
        formatted: format!("{percentage:.1}%"),
        is_healthy: settings.thresholds.is_healthy(percentage),
        status: settings.thresholds.classify(percentage),
    }
}

/// Read a single metric by name.
///
/// Known fields (camelCase or snake_case) always resolve to their stored
/// value. For extras, a missing or non-numeric entry resolves to `fallback`,
/// or `0.0` when no fallback is given.
#[must_use]
pub fn metric(metrics: &NormalizedMetrics, key: &str, fallback: Option<f64>) -> f64 {
    if let Some(field) = MetricField::from_name(key) {
        return metrics.get(field);
    }
    metrics
        .extras
        .get(key)
        .and_then(|value| value.as_f64())
        .or(fallback)
        .unwrap_or(0.0)
}
