//! Deterministic structural hashing of JSON values.
//!
//! Two results agree when their structural hashes match. Hashing each value
//! directly (instead of serializing and comparing strings) keeps the tally
//! allocation-free and makes object-key ordering irrelevant. Field exclusion
//! is a comparator parameter: the input value is never modified.
//!
//! Each JSON type is prefixed with a discriminant byte so values of different
//! types can never collide structurally:
//!
//! - Null: `0`
//! - Bool: `1` + value
//! - Number: `2` + numeric representation
//! - String: `3` + bytes
//! - Array: `4` + length + elements in order
//! - Object: `5` + length + sorted `(key, value)` pairs

use ahash::AHasher;
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// Hashes a JSON value structurally.
#[must_use]
pub fn hash_value(value: &Value) -> u64 {
    let mut hasher = AHasher::default();
    write_value(value, &[], true, &mut hasher);
    hasher.finish()
}

/// Hashes a JSON value structurally, skipping the named top-level object
/// fields.
///
/// The exclusion applies only to the outermost object; nested occurrences of
/// the same key still participate. With an empty `exclude` list this is
/// identical to [`hash_value`].
#[must_use]
pub fn hash_value_excluding(value: &Value, exclude: &[&str]) -> u64 {
    let mut hasher = AHasher::default();
    write_value(value, exclude, true, &mut hasher);
    hasher.finish()
}

fn write_value(value: &Value, exclude: &[&str], top_level: bool, hasher: &mut impl Hasher) {
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            2u8.hash(hasher);
            // Discriminate i64/u64/f64 so 1, 1u64 and 1.0 hash per their
            // serde representation, and normalize non-finite floats to a
            // canonical bit pattern.
            if let Some(i) = n.as_i64() {
                0u8.hash(hasher);
                i.hash(hasher);
            } else if let Some(u) = n.as_u64() {
                1u8.hash(hasher);
                u.hash(hasher);
            } else if let Some(f) = n.as_f64() {
                2u8.hash(hasher);
                let bits = if f.is_nan() { f64::NAN.to_bits() } else { f.to_bits() };
                bits.hash(hasher);
            }
        }
        Value::String(s) => {
            3u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                write_value(item, &[], false, hasher);
            }
        }
        Value::Object(map) => {
            5u8.hash(hasher);
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|key| !(top_level && exclude.contains(&key.as_str())))
                .collect();
            keys.sort_unstable();
            keys.len().hash(hasher);

            for key in keys {
                key.hash(hasher);
                if let Some(child) = map.get(key) {
                    write_value(child, &[], false, hasher);
                }
            }
        }
    }
}
