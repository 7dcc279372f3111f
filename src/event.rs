//! AMI event records

use crate::{
    constants::{KEY_ACTION_ID, KEY_EVENT},
    error::AmiResult,
    headers::AmiHeaders,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event pushed by Asterisk (`Event: <Name>` record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiEvent {
    headers: AmiHeaders,
}

impl AmiEvent {
    /// Wrap a parsed record.
    pub fn new(headers: AmiHeaders) -> Self {
        Self { headers }
    }

    /// Event with only its `Event` key set.
    pub fn with_name(name: &str) -> Self {
        let mut headers = AmiHeaders::new();
        headers.push(KEY_EVENT, name);
        Self { headers }
    }

    /// Value of the `Event` key.
    pub fn name(&self) -> Option<&str> {
        self.headers
            .get(KEY_EVENT)
    }

    /// Case-insensitive event name comparison.
    pub fn is_event(&self, name: &str) -> bool {
        self.name()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    /// Look up a key (case-insensitive, first occurrence).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
    }

    pub fn headers(&self) -> &AmiHeaders {
        &self.headers
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .set(name, value);
    }

    /// `ActionID` of the action that triggered this event, for list-style actions.
    pub fn action_id(&self) -> Option<&str> {
        self.headers
            .get(KEY_ACTION_ID)
    }

    pub fn uniqueid(&self) -> Option<&str> {
        self.headers
            .get("Uniqueid")
    }

    pub fn channel(&self) -> Option<&str> {
        self.headers
            .get("Channel")
    }

    /// Flatten into a JSON object. Repeated keys become arrays.
    pub fn to_json(&self) -> AmiResult<String> {
        let mut object = Map::new();
        for (key, value) in self
            .headers
            .iter()
        {
            match object.get_mut(key) {
                Some(Value::Array(values)) => values.push(Value::String(value.to_string())),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value.to_string())]);
                }
                None => {
                    object.insert(key.to_string(), Value::String(value.to_string()));
                }
            }
        }
        Ok(serde_json::to_string(&Value::Object(object))?)
    }
}
