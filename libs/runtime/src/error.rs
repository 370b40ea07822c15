//! Runtime error types.
//!
//! Only recoverable conditions surface as errors. Contract violations
//! (managing a duplicate name, fast_send to self, replying without a return
//! address) are programmer errors and panic instead.

use thiserror::Error;

/// Errors surfaced by the runtime's fallible operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid configuration value.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread for '{actor}'")]
    Spawn {
        actor: String,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn spawn(actor: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            actor: actor.into(),
            source,
        }
    }
}
