//! Tag conversion helpers
//!
//! Tags are a uniform key-value attachment across resource types. The
//! configuration side carries them as a string map attribute; each resource
//! module converts the pairs to its service's own SDK tag type.

use std::collections::HashMap;

use pyxis_core::resource::Value;

/// Extract tag pairs from a `tags` attribute value
///
/// Non-string values are skipped. Pairs are sorted by key so request
/// construction and diffs are deterministic.
pub fn pairs_from_value(value: Option<&Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(Value::Map(map)) = value {
        for (key, val) in map {
            if let Value::String(v) = val {
                pairs.push((key.clone(), v.clone()));
            }
        }
    }
    pairs.sort();
    pairs
}

/// Build a `tags` attribute value from pairs read back from the service
///
/// Returns `None` for an empty set so untagged resources do not grow an
/// empty map attribute.
pub fn pairs_to_value(pairs: impl IntoIterator<Item = (String, String)>) -> Option<Value> {
    let map: HashMap<String, Value> = pairs
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    if map.is_empty() {
        None
    } else {
        Some(Value::Map(map))
    }
}
