//! Canonical YAML for bundle manifests

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

/// Serialise `object` as canonical YAML
///
/// `metadata.managedFields` is dropped, null and empty fields are omitted and
/// mapping keys are written in lexical order.
pub fn canonical_yaml<T: Serialize>(object: &T) -> Result<String> {
    let mut value = serde_json::to_value(object)?;
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("managedFields");
    }
    let yaml = to_sorted_yaml(&value).unwrap_or(serde_yaml::Value::Null);
    Ok(serde_yaml::to_string(&yaml)?)
}

/// A YAML `List` document wrapping `items`
pub fn list_yaml<T: Serialize>(items: &[T]) -> Result<String> {
    let items = items
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut list = serde_json::json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": items,
    });
    if let Some(items) = list.get_mut("items").and_then(Value::as_array_mut) {
        for item in items.iter_mut() {
            if let Some(metadata) = item.get_mut("metadata").and_then(Value::as_object_mut) {
                metadata.remove("managedFields");
            }
        }
    }
    let yaml = to_sorted_yaml(&list).unwrap_or(serde_yaml::Value::Null);
    Ok(serde_yaml::to_string(&yaml)?)
}

/// Convert to YAML with sorted keys; `None` for values that should be omitted
fn to_sorted_yaml(value: &Value) -> Option<serde_yaml::Value> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(serde_yaml::Value::Bool(*b)),
        Value::Number(n) => serde_yaml::to_value(n).ok(),
        Value::String(s) => Some(serde_yaml::Value::String(s.clone())),
        Value::Array(items) => {
            let items: Vec<serde_yaml::Value> = items.iter().filter_map(to_sorted_yaml).collect();
            (!items.is_empty()).then_some(serde_yaml::Value::Sequence(items))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut mapping = serde_yaml::Mapping::new();
            for key in keys {
                if let Some(child) = map.get(key).and_then(to_sorted_yaml) {
                    mapping.insert(serde_yaml::Value::String(key.clone()), child);
                }
            }
            (!mapping.is_empty()).then_some(serde_yaml::Value::Mapping(mapping))
        }
    }
}
