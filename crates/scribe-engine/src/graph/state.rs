use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value state shared by the nodes of one run.
///
/// Nodes only ever see an immutable snapshot. Changes arrive as a
/// `StateUpdate` that the executor merges after the node completes: each
/// written key replaces the prior value entirely, unwritten keys are left
/// alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowState {
    data: BTreeMap<String, Value>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from a JSON object's fields.
    pub fn from_map(fields: serde_json::Map<String, Value>) -> Self {
        Self {
            data: fields.into_iter().collect(),
        }
    }

    /// Set an initial value. Only meant for seeding a run.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(|v| v.as_u64())
    }

    /// String value or an empty string, for prompt interpolation.
    pub fn str_or_empty(&self, key: &str) -> &str {
        self.get_str(key).unwrap_or("")
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy of the state as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.data.clone().into_iter().collect())
    }

    /// Merge an update, returning the keys it wrote in key order.
    pub(crate) fn apply(&mut self, update: StateUpdate) -> Vec<String> {
        let mut written = Vec::with_capacity(update.entries.len());
        for (k, v) in update.entries {
            written.push(k.clone());
            self.data.insert(k, v);
        }
        written
    }
}

/// Partial output of one node invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    entries: BTreeMap<String, Value>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style set.
    pub fn set(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn set_str(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, Value::String(value.into()))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_operations() {
        let state = WorkflowState::new()
            .with("topic", json!("Rust"))
            .with("count", json!(42));

        assert_eq!(state.get_str("topic"), Some("Rust"));
        assert_eq!(state.get_u64("count"), Some(42));
        assert_eq!(state.get("missing"), None);
        assert_eq!(state.str_or_empty("missing"), "");
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_apply_overwrites_only_written_keys() {
        let mut state = WorkflowState::new()
            .with("a", json!("1"))
            .with("b", json!({"nested": {"x": 1, "y": 2}}));

        let update = StateUpdate::new()
            .set("b", json!({"nested": {"x": 9}}))
            .set_str("c", "3");
        let written = state.apply(update);

        assert_eq!(written, vec!["b", "c"]);
        assert_eq!(state.get_str("a"), Some("1"));
        // No deep merge: "y" is gone.
        assert_eq!(state.get("b"), Some(&json!({"nested": {"x": 9}})));
        assert_eq!(state.get_str("c"), Some("3"));
    }

    #[test]
    fn test_from_map_and_to_json() {
        let fields = json!({"topic": "X", "rounds": 2});
        let state = WorkflowState::from_map(fields.as_object().unwrap().clone());
        assert_eq!(state.to_json(), fields);
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let state = WorkflowState::new().with("k", json!(true));
        assert_eq!(serde_json::to_string(&state).unwrap(), r#"{"k":true}"#);
    }
}
