//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading
//! - Configuration validation
//! - Building a [`MetricsStore`] from the loaded values
//!
//! # Example
//!
//! ```
//! use prop_metrics::config::{Config, LogFormat};
//! use prop_metrics::normalize::ExtraFieldPolicy;
//!
//! // Create a config directly (use Config::from_env() in production)
//! let config = Config {
//!     log_format: LogFormat::Json,
//!     extra_fields: ExtraFieldPolicy::AllowList(["win_streak".to_string()].into()),
//!     ..Config::default()
//! };
//!
//! let store = config.build_store();
//! store.update_from_json(r#"{"win_streak": 4, "mystery_key": 1}"#, Some("feed"));
//! let extras = &store.snapshot().current.extras;
//! assert!(extras.contains_key("winStreak"));
//! assert!(!extras.contains_key("mysteryKey"));
//! ```

mod validation;

pub use validation::{validate_config, MAX_THRESHOLD, MIN_THRESHOLD};

use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::normalize::{ExtraFieldPolicy, PayloadNormalizer};
use crate::selectors::{
    CacheRateUnit, SelectorSettings, StatusThresholds, DEFAULT_EXCELLENT_THRESHOLD,
    DEFAULT_FAIR_THRESHOLD, DEFAULT_GOOD_THRESHOLD,
};
use crate::store::{MetricsStore, DEFAULT_STALE_AFTER};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default staleness threshold in seconds.
pub const DEFAULT_STALE_AFTER_SECS: u64 = DEFAULT_STALE_AFTER.as_secs();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                var: "LOG_FORMAT".into(),
                reason: format!("must be text or json, got {s}"),
            }),
        }
    }
}

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Log level or `EnvFilter` directive (error, warn, info, debug, trace).
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Policy for unrecognized payload keys.
    pub extra_fields: ExtraFieldPolicy,
    /// Cache rate unit and status thresholds.
    pub selectors: SelectorSettings,
    /// Age in seconds after which a snapshot counts as stale.
    pub stale_after_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
            extra_fields: ExtraFieldPolicy::default(),
            selectors: SelectorSettings::default(),
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables (with defaults):
    /// - `LOG_LEVEL`: Logging level (default: `info`)
    /// - `LOG_FORMAT`: `text` or `json` (default: `text`)
    /// - `METRICS_EXTRA_FIELDS`: `passthrough`, `allowlist` or `reject`
    ///   (default: `passthrough`)
    /// - `METRICS_EXTRA_ALLOWLIST`: comma-separated snake_case keys
    /// - `CACHE_RATE_UNIT`: `auto`, `percent` or `fraction` (default: `auto`)
    /// - `CACHE_HIT_FAIR_THRESHOLD`: (default: `50`)
    /// - `CACHE_HIT_GOOD_THRESHOLD`: (default: `70`)
    /// - `CACHE_HIT_EXCELLENT_THRESHOLD`: (default: `90`)
    /// - `METRICS_STALE_AFTER_SECS`: (default: `300`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if:
    /// - Any variable cannot be parsed
    /// - Any value fails validation (see [`validate_config`])
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());
        let log_format = parse_env("LOG_FORMAT", LogFormat::default())?;

        let extra_fields = parse_extra_fields(
            std::env::var("METRICS_EXTRA_FIELDS").ok().as_deref(),
            std::env::var("METRICS_EXTRA_ALLOWLIST").ok().as_deref(),
        )?;

        let selectors = SelectorSettings {
            cache_rate_unit: parse_env("CACHE_RATE_UNIT", CacheRateUnit::default())?,
            thresholds: StatusThresholds {
                fair: parse_env_f64("CACHE_HIT_FAIR_THRESHOLD", DEFAULT_FAIR_THRESHOLD)?,
                good: parse_env_f64("CACHE_HIT_GOOD_THRESHOLD", DEFAULT_GOOD_THRESHOLD)?,
                excellent: parse_env_f64(
                    "CACHE_HIT_EXCELLENT_THRESHOLD",
                    DEFAULT_EXCELLENT_THRESHOLD,
                )?,
            },
        };

        let stale_after_secs = parse_env_u64("METRICS_STALE_AFTER_SECS", DEFAULT_STALE_AFTER_SECS)?;

        let config = Self {
            log_level,
            log_format,
            extra_fields,
            selectors,
            stale_after_secs,
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Staleness threshold as a [`Duration`].
    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// The normalizer this configuration describes.
    #[must_use]
    pub fn normalizer(&self) -> PayloadNormalizer {
        PayloadNormalizer::new().with_extra_fields(self.extra_fields.clone())
    }

    /// Build a store wired with this configuration and the system clock.
    #[must_use]
    pub fn build_store(&self) -> MetricsStore {
        MetricsStore::builder()
            .normalizer(self.normalizer())
            .settings(self.selectors)
            .stale_after(self.stale_after())
            .build()
    }
}

/// Build the extra-field policy from its mode and allow-list variables.
fn parse_extra_fields(
    mode: Option<&str>,
    allowlist: Option<&str>,
) -> Result<ExtraFieldPolicy, ConfigError> {
    let allowed = || -> BTreeSet<String> {
        allowlist
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(String::from)
            .collect()
    };

    match mode.map(|m| m.trim().to_lowercase()).as_deref() {
        None | Some("passthrough") => Ok(ExtraFieldPolicy::Passthrough),
        Some("allowlist") => Ok(ExtraFieldPolicy::AllowList(allowed())),
        Some("reject") => Ok(ExtraFieldPolicy::Reject(allowed())),
        Some(other) => Err(ConfigError::InvalidValue {
            var: "METRICS_EXTRA_FIELDS".into(),
            reason: format!("must be passthrough, allowlist, or reject, got {other}"),
        }),
    }
}

/// Parse an environment variable with its `FromStr` impl, using a default if not set.
fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = ConfigError>,
{
    std::env::var(name).map_or(Ok(default), |val| val.parse())
}

/// Parse an environment variable as u64, using a default if not set.
fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as f64, using a default if not set.
fn parse_env_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a number".into(),
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 9] = [
        "LOG_LEVEL",
        "LOG_FORMAT",
        "METRICS_EXTRA_FIELDS",
        "METRICS_EXTRA_ALLOWLIST",
        "CACHE_RATE_UNIT",
        "CACHE_HIT_FAIR_THRESHOLD",
        "CACHE_HIT_GOOD_THRESHOLD",
        "CACHE_HIT_EXCELLENT_THRESHOLD",
        "METRICS_STALE_AFTER_SECS",
    ];

    /// Helper to set up a clean test environment.
    fn setup_test_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        setup_test_env();

        let config = Config::from_env().expect("should load config");

        assert_eq!(config, Config::default());
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.stale_after(), Duration::from_secs(300));
    }

    #[test]
    #[serial]
    fn test_config_from_env_with_all_vars() {
        setup_test_env();

        env::set_var("LOG_LEVEL", "debug");
        env::set_var("LOG_FORMAT", "JSON");
        env::set_var("METRICS_EXTRA_FIELDS", "allowlist");
        env::set_var("METRICS_EXTRA_ALLOWLIST", "win_streak, edge_pct,");
        env::set_var("CACHE_RATE_UNIT", "percent");
        env::set_var("CACHE_HIT_FAIR_THRESHOLD", "40");
        env::set_var("CACHE_HIT_GOOD_THRESHOLD", "60.5");
        env::set_var("CACHE_HIT_EXCELLENT_THRESHOLD", "95");
        env::set_var("METRICS_STALE_AFTER_SECS", "30");

        let config = Config::from_env().expect("should load config");
        setup_test_env();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.extra_fields,
            ExtraFieldPolicy::AllowList(
                ["edge_pct".to_string(), "win_streak".to_string()].into()
            )
        );
        assert_eq!(config.selectors.cache_rate_unit, CacheRateUnit::Percent);
        assert_eq!(config.selectors.thresholds.fair, 40.0);
        assert_eq!(config.selectors.thresholds.good, 60.5);
        assert_eq!(config.selectors.thresholds.excellent, 95.0);
        assert_eq!(config.stale_after_secs, 30);
    }

    #[test]
    #[serial]
    fn test_config_invalid_threshold_format() {
        setup_test_env();
        env::set_var("CACHE_HIT_GOOD_THRESHOLD", "high");

        let err = Config::from_env().unwrap_err();
        setup_test_env();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "CACHE_HIT_GOOD_THRESHOLD"
        ));
    }

    #[test]
    #[serial]
    fn test_config_threshold_order_validation() {
        setup_test_env();
        env::set_var("CACHE_HIT_FAIR_THRESHOLD", "80");

        let err = Config::from_env().unwrap_err();
        setup_test_env();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "CACHE_HIT_FAIR_THRESHOLD"
        ));
    }

    #[test]
    #[serial]
    fn test_config_invalid_unit() {
        setup_test_env();
        env::set_var("CACHE_RATE_UNIT", "basis-points");

        let err = Config::from_env().unwrap_err();
        setup_test_env();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "CACHE_RATE_UNIT"
        ));
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_format() {
        setup_test_env();
        env::set_var("LOG_FORMAT", "xml");

        let err = Config::from_env().unwrap_err();
        setup_test_env();

        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "LOG_FORMAT"));
    }

    #[test]
    #[serial]
    fn test_config_negative_stale_after() {
        setup_test_env();
        env::set_var("METRICS_STALE_AFTER_SECS", "-5");

        let err = Config::from_env().unwrap_err();
        setup_test_env();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "METRICS_STALE_AFTER_SECS"
        ));
    }

    #[test]
    #[serial]
    fn test_config_reject_without_allowlist() {
        setup_test_env();
        env::set_var("METRICS_EXTRA_FIELDS", "reject");

        let err = Config::from_env().unwrap_err();
        setup_test_env();

        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "METRICS_EXTRA_ALLOWLIST"
        ));
    }

    #[test]
    fn test_parse_extra_fields() {
        assert_eq!(
            parse_extra_fields(None, Some("ignored")).unwrap(),
            ExtraFieldPolicy::Passthrough
        );
        assert_eq!(
            parse_extra_fields(Some(" Reject "), Some("a_b")).unwrap(),
            ExtraFieldPolicy::Reject(["a_b".to_string()].into())
        );
        assert!(matches!(
            parse_extra_fields(Some("sometimes"), None),
            Err(ConfigError::InvalidValue { var, .. }) if var == "METRICS_EXTRA_FIELDS"
        ));
    }

    #[test]
    fn test_build_store_uses_policy() {
        let config = Config {
            extra_fields: ExtraFieldPolicy::Reject(["win_streak".to_string()].into()),
            ..Config::default()
        };
        let store = config.build_store();

        store.update_from_json(r#"{"latency": 5, "loss_streak": 2}"#, Some("feed"));

        let state = store.snapshot();
        assert_eq!(state.current.latency, 0.0);
        assert_eq!(
            state.error.as_deref(),
            Some("Failed to normalize metrics from feed: Unexpected field: loss_streak")
        );
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!(" Json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_parse_env_u64_default() {
        env::remove_var("TEST_STALE_MISSING");
        assert_eq!(parse_env_u64("TEST_STALE_MISSING", 999).unwrap(), 999);
    }

    #[test]
    fn test_parse_env_f64_invalid() {
        env::set_var("TEST_F64_INVALID", "abc");
        let result = parse_env_f64("TEST_F64_INVALID", 0.0);
        assert!(result.is_err());
        env::remove_var("TEST_F64_INVALID");
    }
}
