//! Inbound message parsing.

use crate::error::{InvokerError, InvokerResult};
use serde_json::{Map, Value};

/// Literal payload that asks the invoker to shut down.
pub const SENTINEL: &[u8] = b"END";

/// Key overwritten with the replica identifier on every variant.
pub const REPLICA_KEY: &str = "uuid";

/// A decoded frame from the inbound channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The shutdown sentinel.
    Sentinel,
    /// A request to fan out.
    Request(InboundMessage),
}

impl Inbound {
    /// Classify raw bytes. Anything that is neither the sentinel nor a JSON
    /// object is malformed.
    pub fn parse(bytes: &[u8]) -> InvokerResult<Self> {
        if bytes == SENTINEL {
            return Ok(Inbound::Sentinel);
        }
        InboundMessage::from_slice(bytes).map(Inbound::Request)
    }
}

/// An opaque JSON object request.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    fields: Map<String, Value>,
}

impl InboundMessage {
    pub fn from_slice(bytes: &[u8]) -> InvokerResult<Self> {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => Ok(Self { fields }),
            Ok(other) => Err(InvokerError::MalformedMessage(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(InvokerError::MalformedMessage(e.to_string())),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize the message with `"uuid"` set to `replica_id`.
    pub fn replica_payload(&mut self, replica_id: &str) -> InvokerResult<Vec<u8>> {
        self.fields
            .insert(REPLICA_KEY.to_string(), Value::String(replica_id.to_string()));
        Ok(serde_json::to_vec(&self.fields)?)
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
