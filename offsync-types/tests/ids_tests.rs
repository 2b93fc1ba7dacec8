use offsync_types::{Identity, PLACEHOLDER_PREFIX};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::str::FromStr;

// ── Placeholders ─────────────────────────────────────────────────

#[test]
fn placeholder_is_unique() {
    let a = Identity::placeholder();
    let b = Identity::placeholder();
    assert_ne!(a, b);
}

#[test]
fn placeholder_carries_prefix() {
    let id = Identity::placeholder();
    assert!(id.as_str().starts_with(PLACEHOLDER_PREFIX));
    assert!(id.is_placeholder());
}

#[test]
fn authority_identity_is_not_placeholder() {
    assert!(!Identity::new("42").is_placeholder());
    assert!(!Identity::from(7u64).is_placeholder());
}

#[test]
fn explicit_local_identity_is_placeholder() {
    assert!(Identity::new("local-1").is_placeholder());
}

// ── JSON values ──────────────────────────────────────────────────

#[test]
fn from_value_accepts_strings() {
    assert_eq!(Identity::from_value(&json!("abc")), Some(Identity::new("abc")));
}

#[test]
fn from_value_accepts_integers() {
    assert_eq!(Identity::from_value(&json!(42)), Some(Identity::new("42")));
    assert_eq!(Identity::from_value(&json!(-3)), Some(Identity::new("-3")));
}

#[test]
fn from_value_rejects_other_types() {
    assert_eq!(Identity::from_value(&json!("")), None);
    assert_eq!(Identity::from_value(&json!(1.5)), None);
    assert_eq!(Identity::from_value(&json!(null)), None);
    assert_eq!(Identity::from_value(&json!(true)), None);
    assert_eq!(Identity::from_value(&json!({"id": 1})), None);
}

#[test]
fn string_identity_stays_a_string() {
    let id = Identity::new("42");
    assert!(!id.is_numeric());
    assert_eq!(id.to_value(), json!("42"));
}

#[test]
fn integer_identity_keeps_its_json_type() {
    let id = Identity::from_value(&json!(42)).unwrap();
    assert!(id.is_numeric());
    assert_eq!(id.to_value(), json!(42));
    assert_eq!(Identity::integer(-3).to_value(), json!(-3));
    assert_eq!(Identity::from(u64::MAX).to_value(), json!(u64::MAX));
}

#[test]
fn integer_and_string_forms_name_the_same_record() {
    assert_eq!(Identity::integer(42), Identity::new("42"));

    let mut set = HashSet::new();
    set.insert(Identity::integer(42));
    set.insert(Identity::new("42"));
    assert_eq!(set.len(), 1);
}

#[test]
fn serde_keeps_string_form() {
    let id = Identity::new("local-9");
    let encoded = serde_json::to_string(&id).unwrap();
    assert_eq!(encoded, "\"local-9\"");
    let decoded: Identity = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, id);
    assert!(!decoded.is_numeric());
}

#[test]
fn serde_keeps_integer_form() {
    let id = Identity::integer(7);
    let encoded = serde_json::to_string(&id).unwrap();
    assert_eq!(encoded, "7");
    let decoded: Identity = serde_json::from_str(&encoded).unwrap();
    assert!(decoded.is_numeric());
    assert_eq!(decoded.to_value(), json!(7));
}

#[test]
fn serde_rejects_non_identity_values() {
    assert!(serde_json::from_str::<Identity>("1.5").is_err());
    assert!(serde_json::from_str::<Identity>("null").is_err());
}

// ── Parsing & display ────────────────────────────────────────────

#[test]
fn display_matches_inner_string() {
    assert_eq!(Identity::new("local-1").to_string(), "local-1");
}

#[test]
fn from_str_rejects_blank() {
    assert!(Identity::from_str("").is_err());
    assert!(Identity::from_str("   ").is_err());
}

#[test]
fn from_str_accepts_value() {
    assert_eq!(Identity::from_str("99").unwrap(), Identity::new("99"));
}

#[test]
fn identity_hash_and_eq() {
    let mut set = HashSet::new();
    set.insert(Identity::new("a"));
    set.insert(Identity::new("a"));
    set.insert(Identity::new("b"));
    assert_eq!(set.len(), 2);
}

proptest! {
    #[test]
    fn integer_values_normalise_to_decimal(n in any::<u64>()) {
        let id = Identity::from_value(&json!(n)).unwrap();
        prop_assert_eq!(id, Identity::from(n));
    }
}
