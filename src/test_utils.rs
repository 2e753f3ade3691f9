//! Test utilities and mock factories.
//!
//! This module provides shared testing infrastructure:
//! - Mock factories for [`TimeProvider`](crate::traits::TimeProvider) and
//!   [`MetricsNormalizer`](crate::traits::MetricsNormalizer)
//! - Payload fixtures in the shapes the backend actually sends
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::{json, Value};

use crate::error::NormalizeError;
use crate::traits::{MockMetricsNormalizer, MockTimeProvider};

/// Fixed timestamp used across tests.
#[must_use]
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 11, 19, 0, 0).unwrap()
}

/// Create a mock clock that always returns `at`.
#[must_use]
pub fn mock_clock_at(at: DateTime<Utc>) -> MockTimeProvider {
    let mut clock = MockTimeProvider::new();
    clock.expect_now().return_const(at);
    clock
}

/// Create a mock clock that advances by `step` on every read, starting at `start`.
#[must_use]
pub fn mock_ticking_clock(start: DateTime<Utc>, step: TimeDelta) -> MockTimeProvider {
    let mut clock = MockTimeProvider::new();
    let mut next = start;
    clock.expect_now().returning(move || {
        let now = next;
        next += step;
        now
    });
    clock
}

/// Create a mock normalizer that rejects every payload with `error`.
#[must_use]
pub fn mock_failing_normalizer(error: NormalizeError) -> MockMetricsNormalizer {
    let mut normalizer = MockMetricsNormalizer::new();
    normalizer
        .expect_normalize()
        .returning(move |_| Err(error.clone()));
    normalizer
}

/// Health endpoint payload: flat snake_case plus a `performance` block.
#[must_use]
pub fn health_payload() -> Value {
    json!({
        "status": "ok",
        "memory_usage": 512,
        "cpu_usage": "37.5",
        "active_connections": 12,
        "performance": {
            "cache_hit_rate": 85,
            "avg_response_time_ms": 120,
            "error_rate": 0.4
        }
    })
}

/// Analytics endpoint payload with a couple of unrecognized keys.
#[must_use]
pub fn analytics_payload() -> Value {
    json!({
        "avg_response_time_ms": 230,
        "total_requests": 10_000,
        "win_streak": 4,
        "live_feed": true,
        "bookmaker_name": "acme"
    })
}

/// Infrastructure payload carrying only the cache block.
#[must_use]
pub fn infrastructure_payload() -> Value {
    json!({
        "infrastructure": {
            "cache": { "hit_rate_percent": 92.5 }
        }
    })
}
