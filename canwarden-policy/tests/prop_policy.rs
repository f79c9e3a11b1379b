//! Property-based tests for the rules compiler.
//!
//! Invariants that must hold regardless of input:
//! - `compile` never panics, on any YAML document shape
//! - every identifier in a compiled policy passed range validation
//! - every burst is >= 1, every rate is > 0
//! - the remap table never contains an identity entry
//! - equivalent identifier encodings always collide

use canwarden_policy::compile;
use canwarden_types::MAX_CAN_ID;
use proptest::prelude::*;
use serde_yaml::Value;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Arbitrary scalar YAML values, including identifier-shaped ones.
fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|i| Value::Number(i.into())),
        any::<f64>().prop_map(|f| serde_yaml::from_str(&format!("{f}")).unwrap_or(Value::Null)),
        "[a-zA-Z0-9_x]{0,12}".prop_map(Value::String),
        (0u32..=MAX_CAN_ID).prop_map(|id| Value::String(format!("0x{id:X}"))),
        (0u32..=MAX_CAN_ID).prop_map(|id| Value::String(id.to_string())),
    ]
}

/// Arbitrary YAML documents up to two levels deep — enough to hit every
/// branch of the compiler's structural validation.
fn document() -> impl Strategy<Value = Value> {
    let leaf = scalar();
    leaf.prop_recursive(3, 64, 8, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::Sequence),
            proptest::collection::vec(("[a-z]{1,8}", inner), 0..6).prop_map(|pairs| {
                let mut m = serde_yaml::Mapping::new();
                for (k, v) in pairs {
                    m.insert(Value::String(k), v);
                }
                Value::Mapping(m)
            }),
        ]
    })
}

/// Documents with the real top-level shape but arbitrary section bodies.
fn rules_shaped_document() -> impl Strategy<Value = Value> {
    (document(), document()).prop_map(|(limits, actions)| {
        let mut m = serde_yaml::Mapping::new();
        m.insert(Value::String("limits".into()), limits);
        m.insert(Value::String("actions".into()), actions);
        Value::Mapping(m)
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn compile_never_panics(doc in document()) {
        let _ = compile(&doc);
    }

    #[test]
    fn compile_never_panics_on_rules_shape(doc in rules_shaped_document()) {
        let _ = compile(&doc);
    }

    #[test]
    fn compiled_policies_are_internally_consistent(doc in rules_shaped_document()) {
        if let Ok(policy) = compile(&doc) {
            for (&id, limit) in &policy.limits {
                prop_assert!(id <= MAX_CAN_ID);
                prop_assert!(limit.rate > 0.0);
                prop_assert!(limit.burst >= 1);
            }
            for &id in &policy.drop {
                prop_assert!(id <= MAX_CAN_ID);
            }
            for (&from, &to) in &policy.remap {
                prop_assert!(from <= MAX_CAN_ID);
                prop_assert!(to <= MAX_CAN_ID);
                prop_assert_ne!(from, to, "identity remap escaped validation");
            }
        }
    }

    #[test]
    fn hex_and_decimal_encodings_collide(id in 0u32..=MAX_CAN_ID, rate in 0.1f64..1000.0) {
        let doc = format!(
            "limits:\n  \"0x{id:X}\": {{ rate: {rate} }}\nactions:\n  drop: [ \"{id}\" ]\n"
        );
        let value: Value = serde_yaml::from_str(&doc).unwrap();
        let policy = compile(&value).unwrap();
        prop_assert!(policy.limits.contains_key(&id));
        prop_assert!(policy.drop.contains(&id));
    }

    #[test]
    fn default_burst_is_ceil_of_rate(id in 0u32..=MAX_CAN_ID, rate in 0.1f64..100_000.0) {
        let doc = format!("limits:\n  {id}: {{ rate: {rate} }}\n");
        let value: Value = serde_yaml::from_str(&doc).unwrap();
        let policy = compile(&value).unwrap();
        let limit = policy.limits[&id];
        prop_assert_eq!(limit.burst, rate.ceil() as u32);
        prop_assert!(f64::from(limit.burst) >= limit.rate);
    }
}
