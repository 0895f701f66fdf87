//! Property tests for settings fingerprints.

use fmax::domain::models::SettingsTree;
use fmax::services::SemanticHasher;
use proptest::prelude::*;
use serde_json::{Map, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z0-9_]{0,12}".prop_map(Value::from),
    ]
}

fn settings_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..5).prop_map(|m| {
                Value::Object(
                    m.into_iter()
                        .filter(|(k, _)| k != "file")
                        .collect::<Map<String, Value>>(),
                )
            }),
        ]
    })
}

/// Rebuild every mapping with its keys inserted in reverse order.
fn reversed(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map.iter().rev() {
                out.insert(k.clone(), reversed(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(reversed).collect()),
        other => other.clone(),
    }
}

fn fingerprint(value: Value) -> String {
    SemanticHasher::default()
        .fingerprint(&SettingsTree::new(value))
        .expect("trees without file references always hash")
        .to_string()
}

proptest! {
    /// Property: fingerprints are 32 lowercase hex characters
    #[test]
    fn prop_fingerprint_shape(value in settings_value()) {
        let fp = fingerprint(value);
        prop_assert_eq!(fp.len(), 32);
        prop_assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Property: hashing is deterministic and ignores mapping key order
    #[test]
    fn prop_key_order_is_irrelevant(value in settings_value()) {
        prop_assert_eq!(fingerprint(value.clone()), fingerprint(value.clone()));
        prop_assert_eq!(fingerprint(value.clone()), fingerprint(reversed(&value)));
    }

    /// Property: cosmetic keys never change the fingerprint
    #[test]
    fn prop_cosmetic_keys_are_ignored(
        value in settings_value(),
        note in "[ -~]{0,40}",
        key in prop::sample::select(vec!["author", "url", "comment", "description", "license"]),
    ) {
        let mut wrapped = Map::new();
        wrapped.insert("design".to_string(), value.clone());
        let plain = Value::Object(wrapped.clone());
        wrapped.insert(key.to_string(), Value::from(note));
        prop_assert_eq!(fingerprint(plain), fingerprint(Value::Object(wrapped)));
    }

    /// Property: a changed clock period changes the fingerprint
    #[test]
    fn prop_clock_period_changes_fingerprint(a in 1u32..100_000, b in 1u32..100_000) {
        prop_assume!(a != b);
        let tree = |ps: u32| serde_json::json!({ "flow": { "clock_period": f64::from(ps) / 1000.0 } });
        prop_assert_ne!(fingerprint(tree(a)), fingerprint(tree(b)));
    }
}
