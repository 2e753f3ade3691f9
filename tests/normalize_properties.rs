//! Property tests for normalization.
//!
//! Arbitrary JSON, including nested sections and numeric-looking strings,
//! must never produce a non-finite metric or a panic.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use prop_metrics::normalize::{normalize_metrics, ExtraValue, MetricField};
use prop_metrics::store::MetricsStore;
use serde_json::{json, Map, Value};

fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("cache_hit_rate".to_string()),
        Just("cacheHitRate".to_string()),
        Just("avg_response_time_ms".to_string()),
        Just("performance".to_string()),
        Just("infrastructure".to_string()),
        Just("cache".to_string()),
        Just("hit_rate_percent".to_string()),
        Just("error_rate".to_string()),
        "[a-z]{1,6}(_[a-z0-9]{1,6}){0,2}",
    ]
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<u64>().prop_map(|n| json!(n)),
        any::<f64>().prop_map(|n| json!(n)),
        "[-+]?[0-9]{0,400}(\\.[0-9]{0,4})?(e[-+]?[0-9]{1,4})?".prop_map(Value::String),
        prop_oneof![
            Just("NaN"),
            Just("inf"),
            Just("-Infinity"),
            Just(""),
            Just("  12  ")
        ]
        .prop_map(|s| Value::String(s.to_string())),
        ".{0,12}".prop_map(Value::String),
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((arb_key(), inner), 0..8)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_known_fields_always_finite(raw in arb_json()) {
        let metrics = normalize_metrics(&raw);
        for field in MetricField::ALL {
            prop_assert!(metrics.get(field).is_finite(), "{field} = {}", metrics.get(field));
        }
    }

    #[test]
    fn prop_numeric_extras_always_finite(raw in arb_json()) {
        let metrics = normalize_metrics(&raw);
        for (name, value) in &metrics.extras {
            if let ExtraValue::Number(n) = value {
                prop_assert!(n.is_finite(), "{name} = {n}");
            }
        }
    }

    #[test]
    fn prop_store_survives_any_sequence(payloads in prop::collection::vec(arb_json(), 1..6)) {
        let store = MetricsStore::new();
        for raw in &payloads {
            store.update_from_raw(raw, Some("prop"));
            store.update_from_json(&raw.to_string(), None);
        }
        let state = store.snapshot();
        prop_assert!(state.current.is_finite());
        prop_assert!(state.error.is_none());
    }
}
