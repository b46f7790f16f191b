//! Deterministic JSON canonicalisation used for hashing and signing.

use serde::Serialize;
use serde_json::Value;

use crate::error::CryptoError;

/// Serialises `payload` to JSON with object keys sorted lexicographically and
/// no insignificant whitespace, so that the same logical payload always
/// produces the same byte string regardless of struct field order.
pub fn canonicalize<T: Serialize>(payload: &T) -> Result<String, CryptoError> {
    let value =
        serde_json::to_value(payload).map_err(|e| CryptoError::Canonicalisation(e.to_string()))?;
    let sorted = sort_value(value);
    serde_json::to_string(&sorted).map_err(|e| CryptoError::Canonicalisation(e.to_string()))
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            for key in keys {
                if let Some(v) = map.get(&key) {
                    sorted.insert(key, sort_value(v.clone()));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_nested_object_keys() {
        let payload = json!({"b": 1, "a": {"z": 1, "y": 2}, "c": [3, 2, 1]});
        let out = canonicalize(&payload).unwrap();
        assert_eq!(out, r#"{"a":{"y":2,"z":1},"b":1,"c":[3,2,1]}"#);
    }

    #[test]
    fn is_deterministic_regardless_of_input_order() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }
}
