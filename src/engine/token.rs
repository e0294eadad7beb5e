//! Tokens passed between actors

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One unit of data travelling through the flow.
///
/// The payload is immutable once the token has been produced; consuming
/// actors take ownership of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    payload: JsonValue,
    origin: String,
}

impl Token {
    /// Create a token produced by the actor at `origin`
    pub fn new(payload: JsonValue, origin: impl Into<String>) -> Self {
        Self {
            payload,
            origin: origin.into(),
        }
    }

    /// The payload carried by this token
    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    /// Full path of the actor that produced this token
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Take the payload, consuming the token
    pub fn into_payload(self) -> JsonValue {
        self.payload
    }

    /// Textual form of the payload (strings are not quoted)
    pub fn payload_string(&self) -> String {
        payload_to_string(&self.payload)
    }
}

/// Render a payload as plain text; strings are emitted without quotes
pub fn payload_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}
