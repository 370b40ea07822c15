//! Wire envelope and the Reject negative acknowledgment.
//!
//! Every remote frame carries one UTF-8 JSON envelope. The `sender_*` pair
//! is null exactly when the original sender was anonymous; a receiver uses
//! it to route replies and rejections back to the origin.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use axon_runtime::{define_message, REJECT_ID};

use crate::error::{RemoteError, Result};

/// One remote message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// Name of the sending actor, when one was supplied.
    pub sender_actor: Option<String>,
    /// Endpoint replies should be pushed to, when a sender was supplied.
    pub sender_endpoint: Option<String>,
    /// Name of the destination actor at the receiving process.
    pub receiver: String,
    /// Registered wire name of the payload type.
    pub message_type: String,
    /// Encoded payload fields.
    pub message: Value,
}

impl WireEnvelope {
    /// Serialize to one frame's payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| RemoteError::encode(&self.message_type, e))
    }

    /// Parse a received frame payload.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Negative acknowledgment for an undeliverable remote message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reject {
    /// Wire name of the message that could not be delivered.
    pub message_type: String,
    /// Human-readable failure reason.
    pub reason: String,
    /// The addressed receiver name that rejected the message.
    pub rejected_by: String,
}
define_message!(Reject, REJECT_ID);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let env = WireEnvelope {
            sender_actor: Some("ping".into()),
            sender_endpoint: Some("tcp://127.0.0.1:5002".into()),
            receiver: "pong".into(),
            message_type: "Ping".into(),
            message: serde_json::json!({ "count": 3 }),
        };
        let bytes = env.to_bytes().unwrap();
        let parsed = WireEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.receiver, "pong");
        assert_eq!(parsed.message_type, "Ping");
        assert_eq!(parsed.message["count"], 3);
        assert_eq!(parsed.sender_actor.as_deref(), Some("ping"));
    }

    #[test]
    fn anonymous_sender_serializes_as_null() {
        let env = WireEnvelope {
            sender_actor: None,
            sender_endpoint: None,
            receiver: "pong".into(),
            message_type: "Ping".into(),
            message: serde_json::json!({}),
        };
        let value: Value = serde_json::from_slice(&env.to_bytes().unwrap()).unwrap();
        assert!(value["sender_actor"].is_null());
        assert!(value["sender_endpoint"].is_null());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(WireEnvelope::from_bytes(b"not json").is_err());
    }
}
