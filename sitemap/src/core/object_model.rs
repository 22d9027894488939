//! The request-scoped object model.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Key under which the error notification record is stored.
pub const NOTIFYING_OBJECT: &str = "notifying-object";

/// Key under which the summary of the original error is stored.
pub const THROWABLE_OBJECT: &str = "throwable";

/// Key under which action-set results accumulate for the whole request.
pub const ACTION_RESULTS: &str = "action-results";

/// A thread-safe, additive key/value store scoped to one request.
///
/// Entries are added by match, select and act results and by the error
/// handler; nothing is ever cleared while the request is running.
#[derive(Debug, Default)]
pub struct ObjectModel {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl ObjectModel {
    /// Creates a new empty object model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Sets a value, replacing any previous one.
    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value) {
        self.data.write().insert(key.into(), value);
    }

    /// Sets a value only if the key is absent.
    ///
    /// Returns true if the value was stored.
    pub fn insert_if_absent(&self, key: impl Into<String>, value: serde_json::Value) -> bool {
        let key = key.into();
        let mut data = self.data.write();
        if data.contains_key(&key) {
            return false;
        }
        data.insert(key, value);
        true
    }

    /// Binds a string map under a name as a JSON object.
    pub fn bind_map(&self, key: impl Into<String>, values: &HashMap<String, String>) {
        let object: serde_json::Map<String, serde_json::Value> = values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        self.insert(key, serde_json::Value::Object(object));
    }

    /// Merges a string map into the JSON object stored under a name,
    /// creating it if absent. Later values win per key.
    pub fn merge_map(&self, key: &str, values: &HashMap<String, String>) {
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if !entry.is_object() {
            *entry = serde_json::Value::Object(serde_json::Map::new());
        }
        if let serde_json::Value::Object(object) = entry {
            for (k, v) in values {
                object.insert(k.clone(), serde_json::Value::String(v.clone()));
            }
        }
    }

    /// Returns a copy of all data.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        self.data.read().clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the model is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_map_accumulates() {
        let model = ObjectModel::new();
        model.merge_map(ACTION_RESULTS, &HashMap::from([("a".to_string(), "1".to_string())]));
        model.merge_map(
            ACTION_RESULTS,
            &HashMap::from([("a".to_string(), "2".to_string()), ("b".to_string(), "3".to_string())]),
        );
        assert_eq!(
            model.get(ACTION_RESULTS),
            Some(serde_json::json!({ "a": "2", "b": "3" }))
        );
    }

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let model = ObjectModel::new();
        assert!(model.insert_if_absent(NOTIFYING_OBJECT, serde_json::json!("outer")));
        assert!(!model.insert_if_absent(NOTIFYING_OBJECT, serde_json::json!("inner")));
        assert_eq!(model.get(NOTIFYING_OBJECT).unwrap(), "outer");
    }

    #[test]
    fn test_bind_map() {
        let model = ObjectModel::new();
        let mut values = HashMap::new();
        values.insert("1".to_string(), "index".to_string());
        model.bind_map("page", &values);

        assert_eq!(model.get("page").unwrap()["1"], "index");
        assert_eq!(model.len(), 1);
    }
}
