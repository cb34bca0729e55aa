//! Sparse-document normalizer for loosely-typed log stores.
//!
//! Walks a JSON tree bottom-up and removes `null` leaves, empty strings,
//! and any object or array left empty once its children are pruned.
//! `false` and `0` are values, not absence, and survive.

use serde_json::Value;

/// Prune `value`. Returns `None` when nothing is left.
pub fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Object(map) => {
            let pruned: serde_json::Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Object(pruned))
            }
        }
        Value::Array(items) => {
            let pruned: Vec<Value> = items.into_iter().filter_map(prune).collect();
            if pruned.is_empty() {
                None
            } else {
                Some(Value::Array(pruned))
            }
        }
        other => Some(other),
    }
}

/// True when no `null`, empty string, or empty container appears anywhere.
pub fn is_sparse(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Object(map) => !map.is_empty() && map.values().all(is_sparse),
        Value::Array(items) => !items.is_empty() && items.iter().all(is_sparse),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prune_drops_nulls_and_empty_strings() {
        let doc = json!({"a": null, "b": "", "c": "kept", "d": 0, "e": false});
        assert_eq!(prune(doc), Some(json!({"c": "kept", "d": 0, "e": false})));
    }

    #[test]
    fn test_prune_removes_containers_emptied_by_children() {
        let doc = json!({
            "vehicle": {"plateNumber": null, "driverName": ""},
            "rfidValidity": {"isActive": true, "validUntil": null},
            "tags": [null, "", {}],
            "tagId": "E2800001"
        });
        assert_eq!(
            prune(doc),
            Some(json!({"rfidValidity": {"isActive": true}, "tagId": "E2800001"}))
        );
    }

    #[test]
    fn test_prune_deeply_nested() {
        let doc = json!({"a": {"b": {"c": {"d": null}}}, "x": 1});
        assert_eq!(prune(doc), Some(json!({"x": 1})));
    }

    #[test]
    fn test_prune_everything_gone() {
        assert_eq!(prune(json!({"a": {"b": null}})), None);
        assert_eq!(prune(Value::Null), None);
    }

    #[test]
    fn test_is_sparse() {
        assert!(is_sparse(&json!({"a": 1, "b": {"c": false}})));
        assert!(!is_sparse(&json!({"a": {"b": null}})));
        assert!(!is_sparse(&json!({"a": {}})));
    }
}
