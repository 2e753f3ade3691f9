//! Trait definitions for mockable dependencies.
//!
//! This module defines traits for:
//! - [`MetricsNormalizer`]: Raw payload to patch conversion
//! - [`TimeProvider`]: Time abstraction for testing
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.
//!
//! # Example
//!
//! ```
//! use prop_metrics::traits::{TimeProvider, RealTimeProvider};
//!
//! let time_provider = RealTimeProvider;
//! let now = time_provider.now();
//! println!("Current time: {now}");
//! ```

use chrono::{DateTime, Utc};

use crate::error::NormalizeError;
use crate::normalize::MetricsPatch;

/// Normalizer trait for the store.
///
/// Converts an arbitrary JSON value into the set of metric fields it
/// actually carries. The store merges the returned patch into its current
/// metrics, so fields absent from the patch keep their previous values.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsNormalizer: Send + Sync {
    /// Normalize a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError`] if the payload is rejected. The store
    /// records the error and leaves its metrics untouched.
    fn normalize(&self, raw: &serde_json::Value) -> Result<MetricsPatch, NormalizeError>;
}

/// Time provider trait for deterministic testing.
///
/// This trait abstracts time operations to allow for
/// deterministic testing by providing fixed timestamps.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time provider using system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use static_assertions::assert_impl_all;

    assert_impl_all!(RealTimeProvider: Send, Sync, Clone, Copy, Default);

    #[test]
    fn test_real_time_provider_returns_current_time() {
        let before = Utc::now();
        let now = RealTimeProvider.now();
        let after = Utc::now();
        assert!(now >= before);
        assert!(now <= after);
    }

    #[test]
    fn test_mock_time_provider() {
        let fixed = Utc.with_ymd_and_hms(2026, 6, 11, 19, 0, 0).unwrap();
        let mut mock = MockTimeProvider::new();
        mock.expect_now().return_const(fixed);

        assert_eq!(mock.now(), fixed);
    }

    #[test]
    fn test_mock_normalizer_error() {
        let mut mock = MockMetricsNormalizer::new();
        mock.expect_normalize().returning(|_| {
            Err(NormalizeError::InvalidShape {
                message: "nope".into(),
            })
        });

        let result = mock.normalize(&serde_json::json!({}));
        assert!(matches!(result, Err(NormalizeError::InvalidShape { .. })));
    }

    #[test]
    fn test_mock_normalizer_patch() {
        let mut mock = MockMetricsNormalizer::new();
        mock.expect_normalize().returning(|_| {
            let mut patch = MetricsPatch::default();
            patch.latency = Some(42.0);
            Ok(patch)
        });

        let patch = mock.normalize(&serde_json::Value::Null).unwrap();
        assert_eq!(patch.latency, Some(42.0));
    }
}
