//! Cross-Process Transport for Axon Actors
//!
//! Bridges local actors to peer processes over a push/pull socket pair with
//! a JSON envelope. Each process runs one egress actor (the sender, one
//! push connection per peer endpoint) and one ingress actor (the receiver,
//! a bound pull socket polled cooperatively via the Continue self-tick).
//!
//! ```text
//! process B                              process A
//! ┌──────────┐ send_to() ┌────────────┐  frame   ┌────────────┐
//! │ PingActor│──────────▶│RemoteSender│─────────▶│  Receiver  │
//! └────▲─────┘  encode   └────────────┘   TCP    └──────┬─────┘
//!      │        on caller thread                 decode │ + ReplyProxy
//!      │                                                ▼
//!      │       ┌────────────┐  reverse frame   ┌────────────┐
//!      └───────│  Receiver  │◀─────────────────│ PongActor  │
//!              └────────────┘                  │  reply()   │
//!                                              └────────────┘
//! ```
//!
//! Delivery is fire-and-forget: frames survive exactly as long as the TCP
//! connection does, ordering holds per connection, and nothing is retried.
//! Synchronous (`fast_send`) calls stay local-only.
//!
//! A message type crosses the wire only after being registered:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use axon_runtime::define_message;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Ping { count: u64 }
//! define_message!(Ping, 100);
//!
//! axon_remote::register::<Ping>("Ping");
//! ```

pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod framing;
pub mod receiver;
pub mod registry;
pub mod sender;

pub use envelope::{Reject, WireEnvelope};
pub use error::{RemoteError, Result};
pub use receiver::{ReceiverConfig, ReceiverHandle, ReplyProxy};
pub use registry::{decode, encode, is_registered, register, wire_name_of};
pub use sender::{RemoteRef, SenderHandle};

/// Register the transport's own message types. Idempotent; called by the
/// sender and receiver constructors.
pub(crate) fn register_builtin_messages() {
    registry::register::<Reject>("Reject");
}
