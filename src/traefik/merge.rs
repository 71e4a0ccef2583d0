//! Addressed merge core.
//!
//! Generic operations over `serde_json::Value` trees that back the typed
//! ingress model: recursive key lowercasing, deep merge, and expansion of
//! a dotted address into a nested tree.
//!
//! Merge rules: mappings union their keys and recurse on overlap, lists
//! concatenate, scalars take the right side, and a structural mismatch
//! (mapping vs scalar) also takes the right side.

use serde_json::{Map, Value};

/// Recursively lowercase every mapping key
#[must_use]
pub fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, val) in map {
                out.insert(key.to_lowercase(), lowercase_keys(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Deep-merge two value trees, right side winning on conflicts
#[must_use]
pub fn deep_merge(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Object(mut l), Value::Object(r)) => {
            for (key, rv) in r {
                match l.remove(&key) {
                    Some(lv) => l.insert(key, deep_merge(lv, rv)),
                    None => l.insert(key, rv),
                };
            }
            Value::Object(l)
        }
        (Value::Array(mut l), Value::Array(r)) => {
            l.extend(r);
            Value::Array(l)
        }
        (_, r) => r,
    }
}

/// Convert an address literal to its tree value.
///
/// `"true"` is a presence marker and becomes the empty mapping; everything
/// else is carried as a string and left for schema validation to coerce.
#[must_use]
pub fn literal_value(raw: &str) -> Value {
    if raw == "true" {
        Value::Object(Map::new())
    } else {
        Value::String(raw.to_string())
    }
}

/// Expand an address into a nested mapping holding `value` at the leaf
#[must_use]
pub fn address_to_tree(address: &[&str], value: Value) -> Value {
    let Some((last, parents)) = address.split_last() else {
        return value;
    };
    let mut leaf = Map::new();
    leaf.insert((*last).to_string(), value);
    let mut tree = Value::Object(leaf);
    for segment in parents.iter().rev() {
        let mut map = Map::new();
        map.insert((*segment).to_string(), tree);
        tree = Value::Object(map);
    }
    tree
}
