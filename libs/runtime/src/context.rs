//! Dispatch context and weak actor addressing.
//!
//! Handlers never see the runtime cell directly; they receive a [`Context`]
//! scoped to the current dispatch. The context carries the reply route (the
//! original sender), the fast/slow dispatch mode, and the self address.
//!
//! [`Address`] is the routing handle placed on in-flight messages. It is
//! deliberately weak: a message never keeps its sender or destination alive,
//! it only remembers where to route a reply if that party still exists.

use std::sync::{Arc, Weak};

use tracing::trace;

use crate::actor::ActorCell;
use crate::message::Message;

/// Anything a message can be delivered to.
///
/// Implemented by the local actor cell and by remote reply proxies; a reply
/// flows through whichever implementation the sender address points at.
pub trait Recipient: Send + Sync {
    /// Deliver a message asynchronously. Infallible by contract: delivery
    /// problems are logged and the message is dropped.
    fn deliver(&self, msg: Box<dyn Message>, sender: Option<Address>);

    /// Name used in logs and for remote reply routing.
    fn recipient_name(&self) -> &str;
}

/// Weak, cheaply clonable handle used to route messages and replies.
#[derive(Clone)]
pub struct Address {
    target: Weak<dyn Recipient>,
}

impl Address {
    /// Build an address for any recipient.
    pub fn new<R: Recipient + 'static>(recipient: &Arc<R>) -> Self {
        let erased: Arc<dyn Recipient> = recipient.clone();
        Self {
            target: Arc::downgrade(&erased),
        }
    }

    pub(crate) fn for_cell(cell: &Arc<ActorCell>) -> Self {
        Self::new(cell)
    }

    /// Send a message to the addressed recipient.
    ///
    /// Silently dropped (with a trace log) when the recipient is gone.
    pub fn send(&self, msg: impl Message, sender: Option<Address>) {
        self.send_boxed(Box::new(msg), sender);
    }

    /// Type-erased variant of [`send`](Self::send).
    pub fn send_boxed(&self, msg: Box<dyn Message>, sender: Option<Address>) {
        match self.target.upgrade() {
            Some(recipient) => recipient.deliver(msg, sender),
            None => trace!("message dropped: recipient no longer exists"),
        }
    }

    /// Name of the recipient, if it still exists.
    pub fn name(&self) -> Option<String> {
        self.target
            .upgrade()
            .map(|r| r.recipient_name().to_string())
    }

    /// `true` when this address points at the given cell.
    pub(crate) fn points_to(&self, cell: &Arc<ActorCell>) -> bool {
        self.target.as_ptr() as *const () == Arc::as_ptr(cell) as *const ()
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Address")
            .field("recipient", &self.name())
            .finish()
    }
}

/// Per-dispatch view handed to message handlers.
pub struct Context<'a> {
    pub(crate) cell: &'a Arc<ActorCell>,
    pub(crate) sender: Option<&'a Address>,
    pub(crate) dest: Option<&'a Weak<ActorCell>>,
    pub(crate) reply_slot: &'a mut Option<Box<dyn Message>>,
    pub(crate) fast: bool,
    pub(crate) last: bool,
}

impl Context<'_> {
    /// Name of the actor handling the current message.
    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Address of the actor handling the current message.
    pub fn address(&self) -> Address {
        Address::for_cell(self.cell)
    }

    /// Address of the message sender, when one was supplied.
    pub fn sender(&self) -> Option<&Address> {
        self.sender
    }

    /// Reply to the current message.
    ///
    /// Under `fast_send` the reply is captured and returned to the caller;
    /// under asynchronous dispatch it is sent back to the original sender.
    ///
    /// # Panics
    ///
    /// Panics when called from an asynchronous dispatch with no sender.
    pub fn reply(&mut self, msg: impl Message) {
        self.reply_boxed(Box::new(msg));
    }

    /// Type-erased variant of [`reply`](Self::reply).
    pub fn reply_boxed(&mut self, msg: Box<dyn Message>) {
        if self.fast {
            *self.reply_slot = Some(msg);
        } else {
            let sender = self.sender.expect("reply with no return address");
            sender.send_boxed(msg, Some(self.address()));
        }
    }

    /// `true` when the current message arrived via `fast_send`.
    pub fn is_fast(&self) -> bool {
        self.fast
    }

    /// `true` when this message drained the mailbox.
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Messages dispatched by this actor so far, including the current one.
    pub fn message_count(&self) -> u64 {
        self.cell.message_count()
    }

    /// Stop this actor after the current message completes.
    pub fn stop(&mut self) {
        self.cell.set_terminated();
    }

    /// Post a Shutdown message to this actor's own mailbox.
    pub fn terminate(&self) {
        self.cell.post_shutdown();
    }

    pub(crate) fn cell(&self) -> &Arc<ActorCell> {
        self.cell
    }

    pub(crate) fn dest(&self) -> Option<&Weak<ActorCell>> {
        self.dest
    }

    pub(crate) fn sender_is(&self, cell: &Arc<ActorCell>) -> bool {
        self.sender.map_or(false, |a| a.points_to(cell))
    }
}
