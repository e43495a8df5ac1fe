// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dot-path addressable key/value storage for the runner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Runtime variable state. Keys containing `.` address nested objects;
/// intermediate objects are created on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Storage(Map<String, Value>);

impl Storage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object; any other value yields `None`
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Read the value at a dot path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        parts.try_fold(self.0.get(first)?, |value, part| value.as_object()?.get(part))
    }

    /// Whether a value exists at a dot path
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Write the value at a dot path, replacing non-object intermediates
    pub fn set(&mut self, path: &str, value: Value) {
        let mut parts: Vec<&str> = path.split('.').collect();
        let Some(last) = parts.pop() else {
            return;
        };

        let mut map = &mut self.0;
        for part in parts {
            let entry = map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                return;
            };
            map = next;
        }
        map.insert(last.to_string(), value);
    }

    /// Top-level entries
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON object value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Storage {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
