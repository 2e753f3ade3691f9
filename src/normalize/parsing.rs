//! Raw payload parsing utilities.
//!
//! Classification of raw JSON into [`RawMetricsInput`] and the coercion
//! helpers used by the normalizer.

use serde_json::{Map, Value};

// ============================================================================
// Coercion Helpers
// ============================================================================

/// Coerce a JSON value to a finite number.
///
/// Numbers are used as-is, strings are trimmed and parsed as floats. Every
/// other value, and anything that is NaN or infinite, yields `fallback`.
#[must_use]
pub fn safe_number(value: &Value, fallback: f64) -> f64 {
    coerce_number(value).unwrap_or(fallback)
}

/// Coerce a JSON value to a finite number, if it holds one.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    number.filter(|n| n.is_finite())
}

/// Convert a snake_case key to camelCase.
///
/// An underscore followed by a lowercase ASCII letter is dropped and the
/// letter upper-cased. Any other underscore is kept, so `rate_2x` stays
/// `rate_2x` and `hit__rate` becomes `hit_Rate`.
#[must_use]
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                out.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Input Classification
// ============================================================================

/// A nested section of a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Section<'a> {
    /// The key is not present (or is `null`).
    Absent,
    /// The key holds an object.
    Object(&'a Map<String, Value>),
    /// The key holds something other than an object.
    Malformed,
}

impl<'a> Section<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Object(map)) => Self::Object(map),
            Some(_) => Self::Malformed,
        }
    }

    /// The section's object, if well-formed.
    #[must_use]
    pub const fn as_object(self) -> Option<&'a Map<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            Self::Absent | Self::Malformed => None,
        }
    }
}

/// The sections of an object payload the normalizer knows about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayloadSections<'a> {
    /// Top-level keys.
    pub top: &'a Map<String, Value>,
    /// `performance.*`.
    pub performance: Section<'a>,
    /// `infrastructure.cache.*`.
    pub infrastructure_cache: Section<'a>,
}

/// A raw metrics payload, classified at the boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawMetricsInput<'a> {
    /// `null`.
    Missing,
    /// A non-object value: boolean, number, string or array.
    Unstructured(&'a Value),
    /// An object payload.
    Payload(PayloadSections<'a>),
}

impl<'a> RawMetricsInput<'a> {
    /// Classify a raw JSON value.
    #[must_use]
    pub fn classify(raw: &'a Value) -> Self {
        match raw {
            Value::Null => Self::Missing,
            Value::Object(top) => {
                let infrastructure_cache = match Section::of(top.get("infrastructure")) {
                    Section::Object(infra) => Section::of(infra.get("cache")),
                    other => other,
                };
                Self::Payload(PayloadSections {
                    top,
                    performance: Section::of(top.get("performance")),
                    infrastructure_cache,
                })
            }
            Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) => {
                Self::Unstructured(raw)
            }
        }
    }
}

/// First alias in `keys` whose value in `map` coerces to a number.
pub fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(coerce_number)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(42), 0.0 => 42.0 ; "integer")]
    #[test_case(json!(92.5), 0.0 => 92.5 ; "float")]
    #[test_case(json!("12.5"), 0.0 => 12.5 ; "numeric string")]
    #[test_case(json!("  7 "), 0.0 => 7.0 ; "padded numeric string")]
    #[test_case(json!("1e3"), 0.0 => 1000.0 ; "exponent string")]
    #[test_case(json!("abc"), 3.0 => 3.0 ; "non numeric string")]
    #[test_case(json!(""), 3.0 => 3.0 ; "empty string")]
    #[test_case(json!("NaN"), 3.0 => 3.0 ; "nan string")]
    #[test_case(json!("inf"), 3.0 => 3.0 ; "infinite string")]
    #[test_case(json!(null), 5.0 => 5.0 ; "null")]
    #[test_case(json!(true), 5.0 => 5.0 ; "bool")]
    #[test_case(json!([1]), 5.0 => 5.0 ; "array")]
    #[test_case(json!({"v": 1}), 5.0 => 5.0 ; "object")]
    fn test_safe_number(value: Value, fallback: f64) -> f64 {
        safe_number(&value, fallback)
    }

    #[test_case("cache_hit_rate" => "cacheHitRate")]
    #[test_case("latency" => "latency")]
    #[test_case("p95_latency" => "p95Latency")]
    #[test_case("latency_p95" => "latencyP95")]
    #[test_case("rate_2x" => "rate_2x")]
    #[test_case("hit__rate" => "hit_Rate")]
    #[test_case("_private" => "Private")]
    #[test_case("trailing_" => "trailing_")]
    fn test_to_camel_case(key: &str) -> String {
        to_camel_case(key)
    }

    #[test]
    fn test_classify_null() {
        assert_eq!(RawMetricsInput::classify(&Value::Null), RawMetricsInput::Missing);
    }

    #[test]
    fn test_classify_unstructured() {
        let raw = json!([1, 2, 3]);
        assert!(matches!(
            RawMetricsInput::classify(&raw),
            RawMetricsInput::Unstructured(_)
        ));
        let raw = json!("metrics");
        assert!(matches!(
            RawMetricsInput::classify(&raw),
            RawMetricsInput::Unstructured(_)
        ));
    }

    #[test]
    fn test_classify_nested_sections() {
        let raw = json!({
            "performance": {"cache_hit_rate": 85},
            "infrastructure": {"cache": {"hit_rate_percent": 92.5}}
        });
        let RawMetricsInput::Payload(sections) = RawMetricsInput::classify(&raw) else {
            panic!("expected payload");
        };
        assert!(sections.performance.as_object().is_some());
        assert_eq!(
            sections
                .infrastructure_cache
                .as_object()
                .and_then(|cache| cache.get("hit_rate_percent")),
            Some(&json!(92.5))
        );
    }

    #[test]
    fn test_classify_malformed_sections() {
        let raw = json!({"performance": 12, "infrastructure": {"cache": "warm"}});
        let RawMetricsInput::Payload(sections) = RawMetricsInput::classify(&raw) else {
            panic!("expected payload");
        };
        assert_eq!(sections.performance, Section::Malformed);
        assert_eq!(sections.infrastructure_cache, Section::Malformed);
    }

    #[test]
    fn test_classify_malformed_infrastructure() {
        let raw = json!({"infrastructure": "down"});
        let RawMetricsInput::Payload(sections) = RawMetricsInput::classify(&raw) else {
            panic!("expected payload");
        };
        assert_eq!(sections.infrastructure_cache, Section::Malformed);
    }

    #[test]
    fn test_classify_absent_sections() {
        let raw = json!({"latency": 5, "performance": null});
        let RawMetricsInput::Payload(sections) = RawMetricsInput::classify(&raw) else {
            panic!("expected payload");
        };
        assert_eq!(sections.performance, Section::Absent);
        assert_eq!(sections.infrastructure_cache, Section::Absent);
    }

    #[test]
    fn test_first_number_skips_unusable_alias() {
        let map = json!({"avg_response_time_ms": "n/a", "avg_response_time": 120});
        let map = map.as_object().unwrap();
        assert_eq!(
            first_number(map, &["avg_response_time_ms", "avg_response_time"]),
            Some(120.0)
        );
        assert_eq!(first_number(map, &["missing"]), None);
    }
}
