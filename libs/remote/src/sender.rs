//! Asynchronous egress: one push socket per peer endpoint.
//!
//! `send_to` does the registry lookup and the JSON encoding on the caller's
//! thread (so serialization work parallelizes across senders and the
//! message can be freed before queuing), then hands an internal request to
//! the sender's own actor. The sender's worker owns the sockets: it wraps
//! the payload in a wire envelope, lazily connects to the peer, and writes
//! one frame. Delivery is fire-and-forget: transmit failures are logged,
//! the cached socket is evicted, and nothing is retried.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use axon_runtime::{define_message, ActorBehavior, ActorRef, HandlerTable, Message, SEND_REQUEST_ID};

use crate::endpoint;
use crate::envelope::{Reject, WireEnvelope};
use crate::error::Result;
use crate::framing;
use crate::registry;

/// Internal transmit request queued to the sender's own mailbox.
pub(crate) struct SendRequest {
    endpoint: String,
    actor_name: String,
    sender_name: Option<String>,
    sender_endpoint: Option<String>,
    wire_name: String,
    payload: Value,
}
define_message!(SendRequest, SEND_REQUEST_ID);

struct SenderShared {
    local_endpoint: String,
    sockets: Mutex<HashMap<String, TcpStream>>,
}

/// The sender's actor behavior: owns the push sockets.
struct RemoteSender {
    shared: Arc<SenderShared>,
}

impl ActorBehavior for RemoteSender {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<SendRequest>(|sender, req, _| {
            sender.transmit(req);
        });
    }
}

impl RemoteSender {
    fn transmit(&self, req: &SendRequest) {
        let envelope = WireEnvelope {
            sender_actor: req.sender_name.clone(),
            sender_endpoint: req.sender_endpoint.clone(),
            receiver: req.actor_name.clone(),
            message_type: req.wire_name.clone(),
            message: req.payload.clone(),
        };
        let bytes = match envelope.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(endpoint = %req.endpoint, error = %e, "failed to serialize envelope");
                return;
            }
        };

        let mut sockets = self.shared.sockets.lock();
        let stream = match sockets.entry(req.endpoint.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let addr = match endpoint::connect_addr(&req.endpoint) {
                    Ok(addr) => addr,
                    Err(e) => {
                        warn!(endpoint = %req.endpoint, error = %e, "undeliverable endpoint");
                        return;
                    }
                };
                match TcpStream::connect(&addr) {
                    Ok(stream) => {
                        let _ = stream.set_nodelay(true);
                        debug!(endpoint = %req.endpoint, addr = %addr, "connected push socket");
                        vacant.insert(stream)
                    }
                    Err(e) => {
                        warn!(endpoint = %req.endpoint, addr = %addr, error = %e, "connect failed; message dropped");
                        return;
                    }
                }
            }
        };
        if let Err(e) = framing::write_frame(stream, &bytes) {
            warn!(
                endpoint = %req.endpoint,
                wire_name = %req.wire_name,
                error = %e,
                "frame write failed; dropping socket"
            );
            sockets.remove(&req.endpoint);
        } else {
            trace!(
                endpoint = %req.endpoint,
                receiver = %req.actor_name,
                wire_name = %req.wire_name,
                "frame sent"
            );
        }
    }
}

/// Handle for sending messages to actors in peer processes.
///
/// Clones share the sender actor and its socket map.
#[derive(Clone)]
pub struct SenderHandle {
    actor: ActorRef,
    shared: Arc<SenderShared>,
}

impl SenderHandle {
    /// Create a sender whose replies route back to `local_endpoint` (this
    /// process's receiver endpoint). Manage the returned handle's
    /// [`actor`](Self::actor) so the egress worker runs.
    pub fn create(local_endpoint: impl Into<String>) -> Self {
        Self::create_named("remote-sender", local_endpoint)
    }

    /// Create a sender with an explicit actor name.
    pub fn create_named(name: impl Into<String>, local_endpoint: impl Into<String>) -> Self {
        crate::register_builtin_messages();
        let shared = Arc::new(SenderShared {
            local_endpoint: local_endpoint.into(),
            sockets: Mutex::new(HashMap::new()),
        });
        let actor = ActorRef::new(
            name,
            RemoteSender {
                shared: Arc::clone(&shared),
            },
        );
        Self { actor, shared }
    }

    /// Send a message to a named actor at a peer endpoint.
    ///
    /// Encoding happens on the calling thread; the call returns as soon as
    /// the transmit request is queued. `sender_name` establishes the reply
    /// route: the peer will address replies to that actor at this sender's
    /// local endpoint.
    ///
    /// Errors when the message type is not registered or fails to encode;
    /// the message is dropped in both cases.
    pub fn send_to(
        &self,
        endpoint: &str,
        actor_name: &str,
        msg: impl Message,
        sender_name: Option<&str>,
    ) -> Result<()> {
        self.send_boxed_to(endpoint, actor_name, Box::new(msg), sender_name)
    }

    /// Type-erased variant of [`send_to`](Self::send_to).
    pub fn send_boxed_to(
        &self,
        endpoint: &str,
        actor_name: &str,
        msg: Box<dyn Message>,
        sender_name: Option<&str>,
    ) -> Result<()> {
        let id = msg.message_id();
        let wire_name =
            registry::wire_name_of(id).ok_or(crate::RemoteError::Unregistered { id })?;
        let payload = registry::encode(&*msg)?;
        drop(msg);

        let req = SendRequest {
            endpoint: endpoint.to_string(),
            actor_name: actor_name.to_string(),
            sender_name: sender_name.map(str::to_string),
            sender_endpoint: sender_name.map(|_| self.shared.local_endpoint.clone()),
            wire_name,
            payload,
        };
        self.actor.send(req, None);
        Ok(())
    }

    /// Send a Reject back to a peer.
    pub(crate) fn send_reject(
        &self,
        endpoint: &str,
        actor_name: &str,
        reject: Reject,
    ) -> Result<()> {
        self.send_to(endpoint, actor_name, reject, None)
    }

    /// Build an opaque reference to a named actor at a peer endpoint.
    pub fn remote_ref(&self, name: impl Into<String>, endpoint: impl Into<String>) -> RemoteRef {
        RemoteRef {
            name: name.into(),
            endpoint: endpoint.into(),
            sender: self.clone(),
        }
    }

    /// The sender as a manageable actor.
    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }

    /// Endpoint peers use to reach this process.
    pub fn local_endpoint(&self) -> &str {
        &self.shared.local_endpoint
    }

    /// Drop every cached socket. Later sends reconnect lazily.
    pub fn close(&self) {
        self.shared.sockets.lock().clear();
    }
}

/// Opaque handle addressing a named actor at a peer endpoint.
///
/// Remote sends are fire-and-forget; there is no remote `fast_send`.
#[derive(Clone)]
pub struct RemoteRef {
    name: String,
    endpoint: String,
    sender: SenderHandle,
}

impl RemoteRef {
    /// Send a message to the remote actor.
    pub fn send(&self, msg: impl Message, sender_name: Option<&str>) -> Result<()> {
        self.sender
            .send_to(&self.endpoint, &self.name, msg, sender_name)
    }

    /// Remote actor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Peer endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Unlisted {
        n: u32,
    }
    define_message!(Unlisted, 320);

    #[test]
    fn unregistered_message_is_refused_on_the_calling_thread() {
        let sender = SenderHandle::create("tcp://127.0.0.1:9100");
        let result = sender.send_to("tcp://127.0.0.1:9101", "pong", Unlisted { n: 1 }, None);
        assert!(matches!(
            result,
            Err(crate::RemoteError::Unregistered { id: 320 })
        ));
        // Nothing was queued to the egress worker.
        assert_eq!(sender.actor().queue_len(), 0);
    }

    #[test]
    fn requests_queue_to_the_egress_worker() {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Listed {
            n: u32,
        }
        define_message!(Listed, 321);
        registry::register::<Listed>("Listed");

        let sender = SenderHandle::create("tcp://127.0.0.1:9100");
        sender
            .send_to("tcp://127.0.0.1:9101", "pong", Listed { n: 1 }, Some("ping"))
            .unwrap();
        assert_eq!(sender.actor().queue_len(), 1);
    }
}
