//! # Configuration
//!
//! The settings payload published by the Buffer API. The controller treats it
//! as an opaque, immutable value: it is only ever replaced wholesale, never
//! edited in place.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Remote API configuration payload.
///
/// Cloning is cheap: the JSON document is shared behind an `Arc`, so handing
/// the same value to the cache slot and to every event subscriber never copies
/// the payload.
#[derive(Clone, PartialEq)]
pub struct Configuration {
    payload: Arc<Value>,
}

impl Configuration {
    /// Wrap an already-parsed JSON document
    pub fn from_value(payload: Value) -> Self {
        Self {
            payload: Arc::new(payload),
        }
    }

    /// Parse a configuration from its JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(json)?;
        Ok(Self::from_value(payload))
    }

    /// The raw settings document
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Look up a top-level settings entry
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// True when both values share the same underlying payload allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self
            .payload
            .as_object()
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default();

        f.debug_struct("Configuration")
            .field("keys", &keys)
            .finish()
    }
}

impl Serialize for Configuration {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.payload.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Configuration {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

impl From<Value> for Configuration {
    fn from(payload: Value) -> Self {
        Self::from_value(payload)
    }
}
