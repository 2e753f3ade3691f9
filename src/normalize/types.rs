//! Normalized metrics types.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A known metric field with a guaranteed value in [`NormalizedMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    /// Cache hit rate, stored raw (fraction or percentage).
    CacheHitRate,
    /// Average response time in milliseconds.
    AvgResponseTime,
    /// Memory usage in megabytes.
    MemoryUsage,
    /// CPU usage percentage.
    CpuUsage,
    /// Pending queue size.
    QueueSize,
    /// Requests per second.
    Throughput,
    /// Model accuracy.
    Accuracy,
    /// Latency in milliseconds.
    Latency,
    /// Error rate.
    ErrorRate,
    /// Open connections.
    ActiveConnections,
    /// Requests served since startup.
    TotalRequests,
}

impl MetricField {
    /// Every known field, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::CacheHitRate,
        Self::AvgResponseTime,
        Self::MemoryUsage,
        Self::CpuUsage,
        Self::QueueSize,
        Self::Throughput,
        Self::Accuracy,
        Self::Latency,
        Self::ErrorRate,
        Self::ActiveConnections,
        Self::TotalRequests,
    ];

    /// The camelCase name used in normalized output.
    #[must_use]
    pub const fn camel_name(self) -> &'static str {
        match self {
            Self::CacheHitRate => "cacheHitRate",
            Self::AvgResponseTime => "avgResponseTime",
            Self::MemoryUsage => "memoryUsage",
            Self::CpuUsage => "cpuUsage",
            Self::QueueSize => "queueSize",
            Self::Throughput => "throughput",
            Self::Accuracy => "accuracy",
            Self::Latency => "latency",
            Self::ErrorRate => "errorRate",
            Self::ActiveConnections => "activeConnections",
            Self::TotalRequests => "totalRequests",
        }
    }

    /// Top-level snake_case keys recognized for this field.
    ///
    /// When several aliases are present the first usable one wins.
    #[must_use]
    pub const fn snake_aliases(self) -> &'static [&'static str] {
        match self {
            Self::CacheHitRate => &["cache_hit_rate"],
            Self::AvgResponseTime => &["avg_response_time_ms", "avg_response_time"],
            Self::MemoryUsage => &["memory_usage"],
            Self::CpuUsage => &["cpu_usage"],
            Self::QueueSize => &["queue_size"],
            Self::Throughput => &["throughput"],
            Self::Accuracy => &["accuracy"],
            Self::Latency => &["latency"],
            Self::ErrorRate => &["error_rate"],
            Self::ActiveConnections => &["active_connections"],
            Self::TotalRequests => &["total_requests"],
        }
    }

    /// The documented default for this field.
    #[must_use]
    pub const fn default_value(self) -> f64 {
        0.0
    }

    /// Look up a field by its camelCase name or any snake_case alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.camel_name() == name || field.snake_aliases().contains(&name))
    }

    /// Whether `key` is the camelCase name or a snake_case alias of any field.
    #[must_use]
    pub fn is_recognized(key: &str) -> bool {
        Self::from_name(key).is_some()
    }
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.camel_name())
    }
}

/// A value picked up by the generic pass over unrecognized fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ExtraValue {
    /// A finite number (numeric strings are parsed).
    Number(f64),
    /// A boolean flag, stored as-is.
    Flag(bool),
}

impl ExtraValue {
    /// The numeric value, if this is a number.
    #[must_use]
    pub const fn as_f64(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Flag(_) => None,
        }
    }

    /// The flag value, if this is a boolean.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Flag(flag) => Some(flag),
            Self::Number(_) => None,
        }
    }
}

/// Flat, fully-populated metrics record.
///
/// Every known field is a plain `f64`, so consumers never need to handle a
/// missing value. Values produced by the normalizer are always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetrics {
    /// Cache hit rate, stored raw (fraction or percentage).
    pub cache_hit_rate: f64,
    /// Average response time in milliseconds.
    pub avg_response_time: f64,
    /// Memory usage in megabytes.
    pub memory_usage: f64,
    /// CPU usage percentage.
    pub cpu_usage: f64,
    /// Pending queue size.
    pub queue_size: f64,
    /// Requests per second.
    pub throughput: f64,
    /// Model accuracy.
    pub accuracy: f64,
    /// Latency in milliseconds.
    pub latency: f64,
    /// Error rate.
    pub error_rate: f64,
    /// Open connections.
    pub active_connections: f64,
    /// Requests served since startup.
    pub total_requests: f64,
    /// Unrecognized fields, keyed by their camelCased name.
    #[serde(flatten)]
    pub extras: BTreeMap<String, ExtraValue>,
}

/// The metrics every record starts from.
pub const DEFAULT_METRICS: NormalizedMetrics = NormalizedMetrics {
    cache_hit_rate: 0.0,
    avg_response_time: 0.0,
    memory_usage: 0.0,
    cpu_usage: 0.0,
    queue_size: 0.0,
    throughput: 0.0,
    accuracy: 0.0,
    latency: 0.0,
    error_rate: 0.0,
    active_connections: 0.0,
    total_requests: 0.0,
    extras: BTreeMap::new(),
};

impl Default for NormalizedMetrics {
    fn default() -> Self {
        DEFAULT_METRICS
    }
}

impl NormalizedMetrics {
    /// Read a known field.
    #[must_use]
    pub const fn get(&self, field: MetricField) -> f64 {
        match field {
            MetricField::CacheHitRate => self.cache_hit_rate,
            MetricField::AvgResponseTime => self.avg_response_time,
            MetricField::MemoryUsage => self.memory_usage,
            MetricField::CpuUsage => self.cpu_usage,
            MetricField::QueueSize => self.queue_size,
            MetricField::Throughput => self.throughput,
            MetricField::Accuracy => self.accuracy,
            MetricField::Latency => self.latency,
            MetricField::ErrorRate => self.error_rate,
            MetricField::ActiveConnections => self.active_connections,
            MetricField::TotalRequests => self.total_requests,
        }
    }

    fn slot_mut(&mut self, field: MetricField) -> &mut f64 {
        match field {
            MetricField::CacheHitRate => &mut self.cache_hit_rate,
            MetricField::AvgResponseTime => &mut self.avg_response_time,
            MetricField::MemoryUsage => &mut self.memory_usage,
            MetricField::CpuUsage => &mut self.cpu_usage,
            MetricField::QueueSize => &mut self.queue_size,
            MetricField::Throughput => &mut self.throughput,
            MetricField::Accuracy => &mut self.accuracy,
            MetricField::Latency => &mut self.latency,
            MetricField::ErrorRate => &mut self.error_rate,
            MetricField::ActiveConnections => &mut self.active_connections,
            MetricField::TotalRequests => &mut self.total_requests,
        }
    }

    /// Whether every known field and numeric extra is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        MetricField::ALL
            .into_iter()
            .all(|field| self.get(field).is_finite())
            && self
                .extras
                .values()
                .filter_map(|value| value.as_f64())
                .all(f64::is_finite)
    }

    /// Return a new record with `patch` applied on top of this one.
    ///
    /// Fields the patch does not carry keep their current value; `self` is
    /// left untouched.
    #[must_use]
    pub fn merged(&self, patch: &MetricsPatch) -> Self {
        let mut next = self.clone();
        for field in MetricField::ALL {
            if let Some(value) = patch.get(field) {
                *next.slot_mut(field) = value;
            }
        }
        next.extras
            .extend(patch.extras.iter().map(|(key, value)| (key.clone(), *value)));
        next
    }
}

/// The subset of metrics a single payload actually carried.
///
/// Produced by the normalizer and merged into the store's current metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPatch {
    /// Cache hit rate.
    pub cache_hit_rate: Option<f64>,
    /// Average response time in milliseconds.
    pub avg_response_time: Option<f64>,
    /// Memory usage in megabytes.
    pub memory_usage: Option<f64>,
    /// CPU usage percentage.
    pub cpu_usage: Option<f64>,
    /// Pending queue size.
    pub queue_size: Option<f64>,
    /// Requests per second.
    pub throughput: Option<f64>,
    /// Model accuracy.
    pub accuracy: Option<f64>,
    /// Latency in milliseconds.
    pub latency: Option<f64>,
    /// Error rate.
    pub error_rate: Option<f64>,
    /// Open connections.
    pub active_connections: Option<f64>,
    /// Requests served since startup.
    pub total_requests: Option<f64>,
    /// Unrecognized fields, keyed by their camelCased name.
    pub extras: BTreeMap<String, ExtraValue>,
}

impl MetricsPatch {
    /// Read a known field.
    #[must_use]
    pub const fn get(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::CacheHitRate => self.cache_hit_rate,
            MetricField::AvgResponseTime => self.avg_response_time,
            MetricField::MemoryUsage => self.memory_usage,
            MetricField::CpuUsage => self.cpu_usage,
            MetricField::QueueSize => self.queue_size,
            MetricField::Throughput => self.throughput,
            MetricField::Accuracy => self.accuracy,
            MetricField::Latency => self.latency,
            MetricField::ErrorRate => self.error_rate,
            MetricField::ActiveConnections => self.active_connections,
            MetricField::TotalRequests => self.total_requests,
        }
    }

    /// Set a known field, overwriting any earlier value.
    pub fn set(&mut self, field: MetricField, value: f64) {
        let slot = match field {
            MetricField::CacheHitRate => &mut self.cache_hit_rate,
            MetricField::AvgResponseTime => &mut self.avg_response_time,
            MetricField::MemoryUsage => &mut self.memory_usage,
            MetricField::CpuUsage => &mut self.cpu_usage,
            MetricField::QueueSize => &mut self.queue_size,
            MetricField::Throughput => &mut self.throughput,
            MetricField::Accuracy => &mut self.accuracy,
            MetricField::Latency => &mut self.latency,
            MetricField::ErrorRate => &mut self.error_rate,
            MetricField::ActiveConnections => &mut self.active_connections,
            MetricField::TotalRequests => &mut self.total_requests,
        };
        *slot = Some(value);
    }

    /// Fold a later patch into this one. The later patch wins per field.
    pub fn absorb(&mut self, later: Self) {
        for field in MetricField::ALL {
            if let Some(value) = later.get(field) {
                self.set(field, value);
            }
        }
        self.extras.extend(later.extras);
    }

    /// Number of known fields plus extras carried.
    #[must_use]
    pub fn len(&self) -> usize {
        MetricField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_some())
            .count()
            + self.extras.len()
    }

    /// Whether the patch carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
