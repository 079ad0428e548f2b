//! Event records and the acceptance filter
//!
//! An event is one JSON object from the input log. Only objects carrying an
//! `event_type` plus a `user_id` or `device_id` are forwarded; everything else
//! is dropped without error.

use evimport_common::{ImportError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EVENT_TYPE: &str = "event_type";
pub const USER_ID: &str = "user_id";
pub const DEVICE_ID: &str = "device_id";

/// A single accepted event, serialized exactly as it was read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(Map<String, Value>);

impl Event {
    /// Wrap a decoded JSON value, returning `None` when the acceptance
    /// filter rejects it
    ///
    /// Presence of a key is what matters; a `user_id` of `null` still counts.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) if is_acceptable(&fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Decode one input line
    ///
    /// Returns `Ok(None)` for filtered events. A line that is not valid JSON,
    /// a blank line included, is an error naming the row.
    pub fn decode(line: &str, row: u64) -> Result<Option<Self>> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| ImportError::parse(row, e.to_string()))?;

        Ok(Self::from_value(value))
    }

    pub fn event_type(&self) -> Option<&Value> {
        self.0.get(EVENT_TYPE)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// True when an object has `event_type` and at least one identifier
pub fn is_acceptable(fields: &Map<String, Value>) -> bool {
    fields.contains_key(EVENT_TYPE)
        && (fields.contains_key(USER_ID) || fields.contains_key(DEVICE_ID))
}

/// Encode a batch as the JSON array carried in the `event` query parameter
pub fn encode_batch(batch: &[Event]) -> serde_json::Result<String> {
    serde_json::to_string(batch)
}
