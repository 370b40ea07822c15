//! Remote transport error types.

use thiserror::Error;

/// Errors surfaced by the remote transport.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The message identity has no registry entry; it cannot leave the
    /// process.
    #[error("message identity {id} is not registered for remote transport")]
    Unregistered { id: u32 },

    /// No decoder is registered for a wire name.
    #[error("unknown wire type: {name}")]
    UnknownWireType { name: String },

    /// A message identity was registered against a different concrete type.
    #[error("message identity {id} registered with a mismatched type")]
    TypeMismatch { id: u32 },

    /// Payload encoding failed.
    #[error("failed to encode '{wire_name}' payload")]
    Encode {
        wire_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Payload decoding failed.
    #[error("failed to decode '{wire_name}' payload")]
    Decode {
        wire_name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed endpoint string.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A frame exceeded the transport's size cap.
    #[error("frame too large: {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    /// Socket-level failure.
    #[error("transport i/o error")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub(crate) fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn encode(wire_name: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            wire_name: wire_name.into(),
            source,
        }
    }

    pub(crate) fn decode(wire_name: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            wire_name: wire_name.into(),
            source,
        }
    }
}

/// Result alias for remote transport operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
