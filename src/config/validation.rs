//! Configuration validation.
//!
//! Range and consistency checks applied after parsing.

use super::Config;
use crate::error::ConfigError;
use crate::normalize::ExtraFieldPolicy;

/// Lowest allowed status threshold (percent).
pub const MIN_THRESHOLD: f64 = 0.0;

/// Highest allowed status threshold (percent).
pub const MAX_THRESHOLD: f64 = 100.0;

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if:
/// - the thresholds are not `0 <= fair < good < excellent <= 100`
/// - an allow-list or reject policy has no keys
/// - `METRICS_STALE_AFTER_SECS` is zero
#[must_use = "validation result should be checked"]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let thresholds = &config.selectors.thresholds;

    let bounds = MIN_THRESHOLD..=MAX_THRESHOLD;
    for (var, value) in [
        ("CACHE_HIT_FAIR_THRESHOLD", thresholds.fair),
        ("CACHE_HIT_GOOD_THRESHOLD", thresholds.good),
        ("CACHE_HIT_EXCELLENT_THRESHOLD", thresholds.excellent),
    ] {
        if !bounds.contains(&value) {
            return Err(ConfigError::InvalidValue {
                var: var.into(),
                reason: format!("must be between {MIN_THRESHOLD} and {MAX_THRESHOLD}"),
            });
        }
    }

    if thresholds.fair >= thresholds.good {
        return Err(ConfigError::InvalidValue {
            var: "CACHE_HIT_FAIR_THRESHOLD".into(),
            reason: "must be below the good threshold".into(),
        });
    }
    if thresholds.good >= thresholds.excellent {
        return Err(ConfigError::InvalidValue {
            var: "CACHE_HIT_GOOD_THRESHOLD".into(),
            reason: "must be below the excellent threshold".into(),
        });
    }

    match &config.extra_fields {
        ExtraFieldPolicy::AllowList(keys) | ExtraFieldPolicy::Reject(keys) if keys.is_empty() => {
            return Err(ConfigError::InvalidValue {
                var: "METRICS_EXTRA_ALLOWLIST".into(),
                reason: "must list at least one key for allowlist or reject".into(),
            });
        }
        _ => {}
    }

    if config.stale_after_secs == 0 {
        return Err(ConfigError::InvalidValue {
            var: "METRICS_STALE_AFTER_SECS".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::selectors::StatusThresholds;
    use std::collections::BTreeSet;

    fn with_thresholds(fair: f64, good: f64, excellent: f64) -> Config {
        let mut config = Config::default();
        config.selectors.thresholds = StatusThresholds {
            fair,
            good,
            excellent,
        };
        config
    }

    fn invalid_var(config: &Config) -> String {
        let ConfigError::InvalidValue { var, .. } = validate_config(config).unwrap_err();
        var
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_boundary_thresholds() {
        let config = with_thresholds(MIN_THRESHOLD, 50.0, MAX_THRESHOLD);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        assert_eq!(
            invalid_var(&with_thresholds(-1.0, 70.0, 90.0)),
            "CACHE_HIT_FAIR_THRESHOLD"
        );
        assert_eq!(
            invalid_var(&with_thresholds(50.0, 70.0, 100.5)),
            "CACHE_HIT_EXCELLENT_THRESHOLD"
        );
        assert_eq!(
            invalid_var(&with_thresholds(50.0, f64::NAN, 90.0)),
            "CACHE_HIT_GOOD_THRESHOLD"
        );
    }

    #[test]
    fn test_threshold_order() {
        assert_eq!(
            invalid_var(&with_thresholds(70.0, 70.0, 90.0)),
            "CACHE_HIT_FAIR_THRESHOLD"
        );
        assert_eq!(
            invalid_var(&with_thresholds(50.0, 95.0, 90.0)),
            "CACHE_HIT_GOOD_THRESHOLD"
        );
    }

    #[test]
    fn test_empty_allowlist() {
        let config = Config {
            extra_fields: ExtraFieldPolicy::AllowList(BTreeSet::new()),
            ..Config::default()
        };
        assert_eq!(invalid_var(&config), "METRICS_EXTRA_ALLOWLIST");
    }

    #[test]
    fn test_zero_stale_after() {
        let config = Config {
            stale_after_secs: 0,
            ..Config::default()
        };
        assert_eq!(invalid_var(&config), "METRICS_STALE_AFTER_SECS");
    }
}
