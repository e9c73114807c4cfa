// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Throwaway id type for exercising the macro.
    pub struct SampleId("smp-");
}

#[test]
fn generated_ids_carry_the_prefix() {
    let id = SampleId::generate();
    assert!(id.as_str().starts_with("smp-"));
    assert_eq!(id.as_str().len(), 4 + ID_SUFFIX_LEN);
}

#[test]
fn generated_ids_are_unique() {
    let a = SampleId::generate();
    let b = SampleId::generate();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = SampleId::from_string("smp-abc123");
    assert_eq!(id.as_str(), "smp-abc123");
    assert_eq!(id, "smp-abc123");
    assert_eq!(id.to_string(), "smp-abc123");
}

#[test]
fn suffix_strips_the_prefix() {
    let id = SampleId::from_string("smp-abcdef");
    assert_eq!(id.suffix(), "abcdef");
    assert_eq!(id.short(3), "abc");
}

#[test]
fn suffix_of_unprefixed_id_is_the_whole_string() {
    let id = SampleId::from_string("legacy");
    assert_eq!(id.suffix(), "legacy");
}

#[test]
fn short_caps_at_available_length() {
    assert_eq!(short("ab", 5), "ab");
    assert_eq!(short("abcdef", 3), "abc");
}

#[test]
fn borrow_str_supports_map_lookup() {
    let mut map: HashMap<SampleId, u32> = HashMap::new();
    map.insert(SampleId::from_string("smp-x"), 1);
    assert_eq!(map.get("smp-x"), Some(&1));
}

#[test]
fn serde_is_transparent() {
    let id = SampleId::from_string("smp-json");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"smp-json\"");
    let back: SampleId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
