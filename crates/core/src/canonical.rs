//! Canonical JSON form used for checksum determinism.
//!
//! Object keys are sorted lexicographically, recursively; arrays keep
//! document order; the result is serialized compactly (no insignificant
//! whitespace). The same canonical form is used whether the document is
//! stored as YAML or JSON — canonicalization always happens on the
//! in-memory `serde_json::Value` tree, never on the YAML text.

use serde_json::{Map, Value};

/// Recursively rebuild `value` with every object's keys in sorted order.
///
/// `serde_json::Map` already iterates in sorted order with the crate's
/// default (non-`preserve_order`) feature set, but we rebuild explicitly so
/// canonicalization doesn't silently depend on that feature flag staying
/// off in a downstream Cargo.lock.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonicalize `value` and serialize it compactly.
pub fn canonical_json_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("canonicalized Value always serializes")
}

/// Canonicalize `value` (sorted keys, document-order arrays) and render it
/// as YAML with unlimited line width and no anchors/aliases — the format
/// the state document, backups, and manifests are persisted in.
pub fn canonical_yaml_string(value: &Value) -> crate::error::Result<String> {
    Ok(serde_yaml::to_string(&canonicalize(value))?)
}

/// Remove `field` from a top-level JSON object, if present.
pub fn without_field(value: &Value, field: &str) -> Value {
    match value {
        Value::Object(map) => {
            let mut clone = map.clone();
            clone.remove(field);
            Value::Object(clone)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_nested_keys() {
        let v = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let canon = canonicalize(&v);
        assert_eq!(canonical_json_string(&v), canon.to_string());
        assert_eq!(canonical_json_string(&v), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!({"a": [3, 1, 2]});
        assert_eq!(canonical_json_string(&v), r#"{"a":[3,1,2]}"#);
    }

    #[test]
    fn drops_named_field() {
        let v = json!({"checksum": "x", "a": 1});
        let stripped = without_field(&v, "checksum");
        assert_eq!(canonical_json_string(&stripped), r#"{"a":1}"#);
    }
}
