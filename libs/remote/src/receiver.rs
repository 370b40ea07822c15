//! Ingress: pull socket polling, frame routing, and reply proxies.
//!
//! The receiver is an ordinary actor that cooperatively polls its listener
//! instead of parking in blocking socket reads: on Start it posts itself a
//! Continue, and every Continue performs one bounded poll step (≈10 ms when
//! idle) before re-posting Continue. The actor-owned-thread property is
//! preserved; no hidden I/O thread exists.
//!
//! Each decoded frame produces exactly one local dispatch. When the frame
//! names a sender, a [`ReplyProxy`] is synthesized and installed as the
//! message's sender, so the target actor's ordinary `reply` turns into a
//! reverse-direction remote send.

use std::collections::HashMap;
use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use axon_runtime::{
    ActorBehavior, ActorRef, Address, Continue, HandlerTable, Recipient, Start,
};

use crate::endpoint;
use crate::envelope::{Reject, WireEnvelope};
use crate::error::{RemoteError, Result};
use crate::framing::FrameBuffer;
use crate::registry;
use crate::sender::SenderHandle;

/// Receiver tunables.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// How long one poll step may wait for socket activity when idle.
    pub poll_timeout: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(10),
        }
    }
}

/// Actor-shaped forwarder that turns a local reply into a remote send.
///
/// A proxy has no mailbox and never runs a worker; it lives exactly as long
/// as the receiver that synthesized it.
pub struct ReplyProxy {
    sender: SenderHandle,
    remote_actor: String,
    remote_endpoint: String,
}

impl Recipient for ReplyProxy {
    fn deliver(&self, msg: Box<dyn axon_runtime::Message>, _sender: Option<Address>) {
        if let Err(e) =
            self.sender
                .send_boxed_to(&self.remote_endpoint, &self.remote_actor, msg, None)
        {
            warn!(
                remote_actor = %self.remote_actor,
                endpoint = %self.remote_endpoint,
                error = %e,
                "reply to remote sender dropped"
            );
        }
    }

    fn recipient_name(&self) -> &str {
        &self.remote_actor
    }
}

struct Conn {
    stream: TcpStream,
    frames: FrameBuffer,
    peer: SocketAddr,
}

type PeerMap = Arc<Mutex<HashMap<String, ActorRef>>>;

/// The receiver's actor behavior: owns the listener and its connections.
struct RemoteReceiver {
    listener: TcpListener,
    conns: Vec<Conn>,
    peers: PeerMap,
    sender: SenderHandle,
    proxies: Vec<Arc<ReplyProxy>>,
    config: ReceiverConfig,
}

impl ActorBehavior for RemoteReceiver {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Start>(|_, _, ctx| {
            debug!(receiver = %ctx.name(), "remote receiver polling started");
            ctx.address().send(Continue, Some(ctx.address()));
        });
        table.on::<Continue>(|recv, _, ctx| {
            for frame in recv.poll_once() {
                recv.handle_frame(&frame);
            }
            ctx.address().send(Continue, Some(ctx.address()));
        });
    }
}

impl RemoteReceiver {
    /// One bounded poll step: accept, read, and when nothing arrived yet,
    /// wait briefly for activity and read once more.
    fn poll_once(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        self.accept_new();
        self.read_ready(&mut frames);
        if frames.is_empty() {
            self.wait_for_activity();
            self.accept_new();
            self.read_ready(&mut frames);
        }
        frames
    }

    fn accept_new(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!(%peer, error = %e, "rejecting connection");
                        continue;
                    }
                    let _ = stream.set_nodelay(true);
                    debug!(%peer, "accepted push connection");
                    self.conns.push(Conn {
                        stream,
                        frames: FrameBuffer::new(),
                        peer,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    /// Drain readable bytes from every connection; extract complete frames
    /// in per-connection arrival order.
    fn read_ready(&mut self, frames: &mut Vec<Vec<u8>>) {
        let mut buf = [0u8; 8192];
        self.conns.retain_mut(|conn| {
            loop {
                match conn.stream.read(&mut buf) {
                    Ok(0) => {
                        debug!(peer = %conn.peer, "peer closed connection");
                        return false;
                    }
                    Ok(n) => conn.frames.extend(&buf[..n]),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(peer = %conn.peer, error = %e, "read failed; dropping connection");
                        return false;
                    }
                }
            }
            loop {
                match conn.frames.next_frame() {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => break,
                    Err(e) => {
                        warn!(peer = %conn.peer, error = %e, "corrupt stream; dropping connection");
                        return false;
                    }
                }
            }
            true
        });
    }

    /// Park in poll(2) until the listener or a connection turns readable,
    /// bounded by the configured poll timeout.
    #[cfg(unix)]
    fn wait_for_activity(&self) {
        use std::os::unix::io::AsRawFd;

        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(self.conns.len() + 1);
        fds.push(libc::pollfd {
            fd: self.listener.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        });
        for conn in &self.conns {
            fds.push(libc::pollfd {
                fd: conn.stream.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            });
        }
        let timeout_ms = self.config.poll_timeout.as_millis().min(i32::MAX as u128) as i32;
        // SAFETY: fds points at a live array of fds.len() pollfd entries.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let e = std::io::Error::last_os_error();
            if e.kind() != std::io::ErrorKind::Interrupted {
                warn!(error = %e, "poll failed");
            }
        }
    }

    #[cfg(not(unix))]
    fn wait_for_activity(&self) {
        std::thread::sleep(self.config.poll_timeout);
    }

    fn handle_frame(&mut self, bytes: &[u8]) {
        let envelope = match WireEnvelope::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                // No sender is known for an unparseable frame; drop it.
                debug!(error = %e, "dropping unparseable frame");
                return;
            }
        };
        let WireEnvelope {
            sender_actor,
            sender_endpoint,
            receiver,
            message_type,
            message,
        } = envelope;
        let reply_route = sender_actor.zip(sender_endpoint);

        let target = self.peers.lock().get(&receiver).cloned();
        let Some(target) = target else {
            warn!(receiver = %receiver, wire_name = %message_type, "remote message for unknown actor");
            if let Some((actor, endpoint)) = reply_route {
                self.reject(
                    &endpoint,
                    &actor,
                    &message_type,
                    format!("Actor '{receiver}' not found"),
                    receiver,
                );
            }
            return;
        };

        let msg = match registry::decode(&message_type, &message) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(wire_name = %message_type, error = %e, "undeliverable remote message");
                if let Some((actor, endpoint)) = reply_route {
                    let reason = match e {
                        RemoteError::UnknownWireType { name } => {
                            format!("Unknown message type: {name}")
                        }
                        other => format!("Malformed payload for {message_type}: {other}"),
                    };
                    self.reject(&endpoint, &actor, &message_type, reason, receiver);
                }
                return;
            }
        };

        let reply_addr = reply_route.map(|(actor, remote_endpoint)| {
            let proxy = Arc::new(ReplyProxy {
                sender: self.sender.clone(),
                remote_actor: actor,
                remote_endpoint,
            });
            let addr = Address::new(&proxy);
            self.proxies.push(proxy);
            addr
        });

        trace!(receiver = %target.name(), wire_name = %message_type, "dispatching remote message");
        target.send_boxed(msg, reply_addr);
    }

    fn reject(
        &self,
        endpoint: &str,
        actor: &str,
        message_type: &str,
        reason: String,
        rejected_by: String,
    ) {
        debug!(%endpoint, %actor, %reason, "sending reject");
        let reject = Reject {
            message_type: message_type.to_string(),
            reason,
            rejected_by,
        };
        if let Err(e) = self.sender.send_reject(endpoint, actor, reject) {
            warn!(%endpoint, error = %e, "failed to send reject");
        }
    }
}

/// Handle for a bound remote receiver.
#[derive(Clone)]
pub struct ReceiverHandle {
    actor: ActorRef,
    peers: PeerMap,
    bound: SocketAddr,
}

impl ReceiverHandle {
    /// Bind a receiver on `bind_endpoint` (wildcard hosts allowed).
    ///
    /// `sender` is used for Rejects and must be managed alongside the
    /// returned receiver's [`actor`](Self::actor).
    pub fn create(bind_endpoint: &str, sender: &SenderHandle) -> Result<Self> {
        Self::with_config(bind_endpoint, sender, ReceiverConfig::default())
    }

    /// Bind a receiver with explicit tunables.
    pub fn with_config(
        bind_endpoint: &str,
        sender: &SenderHandle,
        config: ReceiverConfig,
    ) -> Result<Self> {
        crate::register_builtin_messages();
        let addr = endpoint::bind_addr(bind_endpoint)?;
        let listener = TcpListener::bind(&addr)?;
        listener.set_nonblocking(true)?;
        let bound = listener.local_addr()?;
        debug!(endpoint = %bind_endpoint, %bound, "remote receiver bound");

        let peers: PeerMap = Arc::new(Mutex::new(HashMap::new()));
        let actor = ActorRef::new(
            "remote-receiver",
            RemoteReceiver {
                listener,
                conns: Vec::new(),
                peers: Arc::clone(&peers),
                sender: sender.clone(),
                proxies: Vec::new(),
                config,
            },
        );
        Ok(Self { actor, peers, bound })
    }

    /// Expose a local actor to remote senders under `name`.
    pub fn register_actor(&self, name: impl Into<String>, actor: &ActorRef) {
        self.peers.lock().insert(name.into(), actor.clone());
    }

    /// Remove a previously registered actor.
    pub fn unregister_actor(&self, name: &str) {
        self.peers.lock().remove(name);
    }

    /// The receiver as a manageable actor.
    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }

    /// The socket address the listener actually bound (useful with port 0).
    pub fn bound_addr(&self) -> SocketAddr {
        self.bound
    }
}
