//! Key-value settings consumed by caches
//!
//! Caches only need two operations from their settings provider: register a
//! namespace of defaults, and read a value by dotted path with a fallback.
//! `MemorySettings` is a JSON-backed provider for callers that do not bring
//! their own.

use std::sync::RwLock;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors that can occur when modifying settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The root settings value must be a JSON object
    #[error("Settings root must be a JSON object, got {0}")]
    RootNotObject(String),

    /// A path segment resolved to a non-object value
    #[error("Cannot set '{path}': '{segment}' is not an object")]
    NotAnObject { path: String, segment: String },

    /// An empty path was supplied
    #[error("Settings path must not be empty")]
    EmptyPath,
}

/// Provider of configuration values for caches
pub trait Settings: Send + Sync {
    /// Registers `defaults` under `namespace` without overwriting values
    /// that are already present
    fn init(&self, namespace: &str, defaults: Value);

    /// Reads the value at a dotted `path`, returning `fallback` when absent
    fn get(&self, path: &str, fallback: Value) -> Value;
}

/// Settings held in memory as a JSON object
#[derive(Debug, Default)]
pub struct MemorySettings {
    root: RwLock<Map<String, Value>>,
}

impl MemorySettings {
    /// Creates an empty settings store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a settings store from an existing JSON object
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        match value {
            Value::Object(map) => Ok(Self {
                root: RwLock::new(map),
            }),
            other => Err(SettingsError::RootNotObject(json_kind(&other).to_string())),
        }
    }

    /// Sets the value at a dotted `path`, creating intermediate objects
    pub fn set(&self, path: &str, value: Value) -> Result<(), SettingsError> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(SettingsError::EmptyPath);
        };

        let mut root = self.root.write().unwrap_or_else(|e| e.into_inner());
        let mut current = &mut *root;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry.as_object_mut().ok_or_else(|| SettingsError::NotAnObject {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
        }
        current.insert(last.to_string(), value);
        Ok(())
    }

    /// Returns a copy of the whole settings tree
    pub fn snapshot(&self) -> Value {
        Value::Object(self.root.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

impl Settings for MemorySettings {
    fn init(&self, namespace: &str, defaults: Value) {
        let mut root = self.root.write().unwrap_or_else(|e| e.into_inner());
        match root.get_mut(namespace) {
            Some(existing) => merge_missing(existing, defaults),
            None => {
                root.insert(namespace.to_string(), defaults);
            }
        }
    }

    fn get(&self, path: &str, fallback: Value) -> Value {
        let root = self.root.read().unwrap_or_else(|e| e.into_inner());
        let mut segments = path.split('.').filter(|s| !s.is_empty());

        let Some(first) = segments.next() else {
            return fallback;
        };
        let mut current = match root.get(first) {
            Some(value) => value,
            None => return fallback,
        };
        for segment in segments {
            match current.get(segment) {
                Some(value) => current = value,
                None => return fallback,
            }
        }
        current.clone()
    }
}

/// Copies keys from `defaults` into `target` where `target` has none
fn merge_missing(target: &mut Value, defaults: Value) {
    if let (Value::Object(target), Value::Object(defaults)) = (target, defaults) {
        for (key, default) in defaults {
            match target.get_mut(&key) {
                Some(existing) => merge_missing(existing, default),
                None => {
                    target.insert(key, default);
                }
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
