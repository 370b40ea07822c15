//! Actor cells, behaviors, and the dispatch paths.
//!
//! Every actor is an [`ActorCell`]: a mailbox, a handler table wrapped in a
//! dispatch mutex, and lifecycle flags. User code supplies an
//! [`ActorBehavior`] with registered handlers; the runtime owns the cell and
//! drives it from a dedicated worker thread (or from the owning Group's
//! thread for group members).
//!
//! Two delivery paths share one dispatch core:
//!
//! - **Asynchronous** ([`ActorRef::send`]): the message is consumed into the
//!   destination mailbox and dispatched later on the destination's thread.
//! - **Synchronous** ([`ActorRef::fast_send`]): the handler runs immediately
//!   on the caller's thread and may produce a reply observed before the call
//!   returns.
//!
//! Both paths hold the per-actor dispatch mutex across handler execution, so
//! message handling within one actor is strictly serial. The mutex is not
//! reentrant: a handler running under `fast_send` must not `fast_send` back
//! into the same actor.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::RuntimeConfig;
use crate::context::{Address, Context, Recipient};
use crate::group::GroupRoster;
use crate::handlers::HandlerTable;
use crate::mailbox::Mailbox;
use crate::message::{Message, Shutdown, SHUTDOWN_ID};
use crate::placement::{self, Placement};

/// User-defined actor logic.
///
/// Handlers are registered once, at construction, against concrete message
/// types. The lifecycle hooks run on the actor's worker thread (or on the
/// owning Group's thread for group members).
pub trait ActorBehavior: Send + 'static {
    /// Register message handlers. Called once while the actor is built.
    fn register_handlers(_table: &mut HandlerTable<Self>)
    where
        Self: Sized,
    {
    }

    /// Runs before the first message is processed.
    fn on_start(&mut self, _ctx: &mut Context<'_>) {}

    /// Runs after the worker loop ends (or during managed shutdown).
    fn on_stop(&mut self, _ctx: &mut Context<'_>) {}

    /// Fallback for messages with no registered handler. Default: no-op.
    fn unhandled(&mut self, _msg: &dyn Message, _ctx: &mut Context<'_>) {}
}

/// Type-erased behavior stored inside the dispatch core.
pub(crate) trait AnyBehavior: Send {
    fn dispatch(&mut self, msg: &dyn Message, ctx: &mut Context<'_>);
    fn on_start(&mut self, ctx: &mut Context<'_>);
    fn on_stop(&mut self, ctx: &mut Context<'_>);
}

pub(crate) struct BehaviorCell<A: ActorBehavior> {
    pub(crate) actor: A,
    pub(crate) handlers: HandlerTable<A>,
}

impl<A: ActorBehavior> AnyBehavior for BehaviorCell<A> {
    fn dispatch(&mut self, msg: &dyn Message, ctx: &mut Context<'_>) {
        // Resolve (and memoize) first, then invoke: the lookup mutates the
        // cache while the invocation needs `&mut self.actor`.
        match self.handlers.lookup(msg) {
            Some(handler) => handler(&mut self.actor, msg, ctx),
            None => self.actor.unhandled(msg, ctx),
        }
    }

    fn on_start(&mut self, ctx: &mut Context<'_>) {
        self.actor.on_start(ctx);
    }

    fn on_stop(&mut self, ctx: &mut Context<'_>) {
        self.actor.on_stop(ctx);
    }
}

/// What kind of cell this is; groups carry their member roster.
pub(crate) enum CellKind {
    Plain,
    Group(GroupRoster),
}

/// A queued message together with its routing metadata.
///
/// Sender and destination are weak: in-flight messages never keep actors
/// alive.
pub(crate) struct Envelope {
    pub(crate) msg: Box<dyn Message>,
    pub(crate) sender: Option<Address>,
    pub(crate) dest: Weak<ActorCell>,
}

pub(crate) struct DispatchCore {
    pub(crate) behavior: Box<dyn AnyBehavior>,
    pub(crate) reply_slot: Option<Box<dyn Message>>,
}

/// Runtime state of one actor.
pub(crate) struct ActorCell {
    name: String,
    pub(crate) mailbox: Mailbox<Envelope>,
    pub(crate) core: Mutex<DispatchCore>,
    pub(crate) kind: CellKind,
    terminated: AtomicBool,
    ended: AtomicBool,
    managed: AtomicBool,
    in_group: AtomicBool,
    group: OnceLock<Weak<ActorCell>>,
    self_weak: Weak<ActorCell>,
    msg_count: AtomicU64,
    thread_id: AtomicI64,
    placement: OnceLock<Placement>,
}

impl ActorCell {
    pub(crate) fn build(
        name: String,
        behavior: Box<dyn AnyBehavior>,
        kind: CellKind,
        mailbox_capacity: usize,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            name,
            mailbox: Mailbox::with_capacity(mailbox_capacity),
            core: Mutex::new(DispatchCore {
                behavior,
                reply_slot: None,
            }),
            kind,
            terminated: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            managed: AtomicBool::new(false),
            in_group: AtomicBool::new(false),
            group: OnceLock::new(),
            self_weak: weak.clone(),
            msg_count: AtomicU64::new(0),
            thread_id: AtomicI64::new(0),
            placement: OnceLock::new(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_group(&self) -> bool {
        matches!(self.kind, CellKind::Group(_))
    }

    pub(crate) fn roster(&self) -> Option<&GroupRoster> {
        match &self.kind {
            CellKind::Group(roster) => Some(roster),
            CellKind::Plain => None,
        }
    }

    /// Queue a message for asynchronous dispatch.
    ///
    /// Messages to a terminated actor are silently dropped. Group members
    /// route into the owning group's mailbox.
    pub(crate) fn enqueue(&self, msg: Box<dyn Message>, sender: Option<Address>) {
        if self.terminated.load(Ordering::Acquire) {
            debug!(
                actor = %self.name,
                id = msg.message_id(),
                "message dropped: actor terminated"
            );
            return;
        }
        let env = Envelope {
            msg,
            sender,
            dest: self.self_weak.clone(),
        };
        match self.group_cell() {
            Some(group) => group.mailbox.push(env),
            None => self.mailbox.push(env),
        }
    }

    /// Post a Shutdown message to this actor's own mailbox.
    pub(crate) fn post_shutdown(&self) {
        self.enqueue(Box::new(Shutdown), None);
    }

    /// Push a terminal Shutdown past the terminated check so a blocked
    /// worker wakes up and exits. Managed-shutdown internal path only.
    pub(crate) fn wake_for_shutdown(&self) {
        self.mailbox.push(Envelope {
            msg: Box::new(Shutdown),
            sender: None,
            dest: self.self_weak.clone(),
        });
    }

    pub(crate) fn set_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_managed(&self) -> bool {
        self.managed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn join_group(&self, group: &Arc<ActorCell>) {
        assert!(
            !self.in_group.swap(true, Ordering::AcqRel),
            "actor '{}' already belongs to a group",
            self.name
        );
        assert!(
            !self.managed.load(Ordering::Acquire),
            "actor '{}' is already managed; add it to the group first",
            self.name
        );
        self.group
            .set(Arc::downgrade(group))
            .unwrap_or_else(|_| unreachable!("group link set twice"));
    }

    pub(crate) fn is_in_group(&self) -> bool {
        self.in_group.load(Ordering::Acquire)
    }

    fn group_cell(&self) -> Option<Arc<ActorCell>> {
        self.group.get().and_then(Weak::upgrade)
    }

    pub(crate) fn message_count(&self) -> u64 {
        self.msg_count.load(Ordering::Relaxed)
    }

    pub(crate) fn thread_id(&self) -> i64 {
        self.thread_id.load(Ordering::Relaxed)
    }

    pub(crate) fn set_placement(&self, placement: Placement) {
        self.placement
            .set(placement)
            .unwrap_or_else(|_| unreachable!("placement set twice"));
    }

    pub(crate) fn placement(&self) -> Placement {
        self.placement.get().cloned().unwrap_or_default()
    }
}

impl Recipient for ActorCell {
    fn deliver(&self, msg: Box<dyn Message>, sender: Option<Address>) {
        self.enqueue(msg, sender);
    }

    fn recipient_name(&self) -> &str {
        &self.name
    }
}

/// Dispatch one message on the destination's dispatch core.
///
/// The message is borrowed: the caller (worker loop, fast_send, or a group
/// forwarding a member's message) owns it and frees it exactly once.
pub(crate) fn dispatch_on(
    cell: &Arc<ActorCell>,
    msg: &dyn Message,
    sender: Option<&Address>,
    dest: Option<&Weak<ActorCell>>,
    last: bool,
) {
    let mut core = cell.core.lock();
    cell.msg_count.fetch_add(1, Ordering::Relaxed);
    let core = &mut *core;
    let mut ctx = Context {
        cell,
        sender,
        dest,
        reply_slot: &mut core.reply_slot,
        fast: false,
        last,
    };
    core.behavior.dispatch(msg, &mut ctx);
}

/// Synchronous dispatch in the caller's thread.
///
/// Serialized against all other dispatch on the same actor by the dispatch
/// mutex, which is held across handler execution.
pub(crate) fn fast_dispatch(
    cell: &Arc<ActorCell>,
    msg: &dyn Message,
    sender: Option<&Address>,
) -> Option<Box<dyn Message>> {
    if let Some(sender) = sender {
        assert!(
            !sender.points_to(cell),
            "fast_send to self: {}",
            cell.name()
        );
    }
    let mut core = cell.core.lock();
    cell.msg_count.fetch_add(1, Ordering::Relaxed);
    core.reply_slot = None;
    if cell.terminated.load(Ordering::Acquire) {
        return None;
    }
    let core = &mut *core;
    let mut ctx = Context {
        cell,
        sender,
        dest: None,
        reply_slot: &mut core.reply_slot,
        fast: true,
        last: true,
    };
    core.behavior.dispatch(msg, &mut ctx);
    core.reply_slot.take()
}

pub(crate) fn run_start_hook(cell: &Arc<ActorCell>) {
    let mut core = cell.core.lock();
    let core = &mut *core;
    let mut ctx = Context {
        cell,
        sender: None,
        dest: None,
        reply_slot: &mut core.reply_slot,
        fast: false,
        last: false,
    };
    core.behavior.on_start(&mut ctx);
}

/// Run the stop hook at most once, whether shutdown came from the worker
/// loop or from the Manager.
pub(crate) fn run_end_hook_once(cell: &Arc<ActorCell>) {
    if cell.ended.swap(true, Ordering::AcqRel) {
        return;
    }
    let mut core = cell.core.lock();
    let core = &mut *core;
    let mut ctx = Context {
        cell,
        sender: None,
        dest: None,
        reply_slot: &mut core.reply_slot,
        fast: false,
        last: false,
    };
    core.behavior.on_stop(&mut ctx);
}

/// The worker loop: pop, dispatch, drain to Shutdown, run the stop hook.
pub(crate) fn run_worker(cell: Arc<ActorCell>) {
    cell.thread_id
        .store(placement::current_thread_id(), Ordering::Relaxed);
    info!(actor = %cell.name(), tid = cell.thread_id(), "worker thread started");

    run_start_hook(&cell);

    loop {
        let (env, last) = cell.mailbox.pop();
        if cell.is_terminated() {
            // Terminal shutdown already delivered synchronously; the wake
            // message exists only to unblock the pop.
            break;
        }
        let is_shutdown = env.msg.message_id() == SHUTDOWN_ID;
        dispatch_on(&cell, &*env.msg, env.sender.as_ref(), Some(&env.dest), last);
        if is_shutdown || cell.is_terminated() {
            break;
        }
    }

    cell.set_terminated();
    run_end_hook_once(&cell);
    trace!(actor = %cell.name(), "worker thread exiting");
}

/// Shared handle to a local actor.
///
/// Cloning is cheap; all clones address the same cell. The handle owned by
/// the creator (and the Manager or Group it is registered with) keeps the
/// actor alive; [`Address`]es derived from it do not.
#[derive(Clone)]
pub struct ActorRef {
    cell: Arc<ActorCell>,
}

impl ActorRef {
    /// Build an actor with the default runtime configuration.
    pub fn new<A: ActorBehavior>(name: impl Into<String>, behavior: A) -> Self {
        Self::with_config(name, behavior, &RuntimeConfig::default())
    }

    /// Build an actor with an explicit runtime configuration.
    pub fn with_config<A: ActorBehavior>(
        name: impl Into<String>,
        behavior: A,
        config: &RuntimeConfig,
    ) -> Self {
        let mut handlers = HandlerTable::new();
        A::register_handlers(&mut handlers);
        let cell = ActorCell::build(
            name.into(),
            Box::new(BehaviorCell {
                actor: behavior,
                handlers,
            }),
            CellKind::Plain,
            config.mailbox_capacity,
        );
        Self { cell }
    }

    pub(crate) fn from_cell(cell: Arc<ActorCell>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<ActorCell> {
        &self.cell
    }

    /// The actor's name.
    pub fn name(&self) -> &str {
        self.cell.name()
    }

    /// Weak routing handle for this actor.
    pub fn address(&self) -> Address {
        Address::for_cell(&self.cell)
    }

    /// Send a message asynchronously (fire-and-forget).
    ///
    /// The message is consumed; delivery to a terminated actor is a silent
    /// drop.
    pub fn send(&self, msg: impl Message, sender: Option<Address>) {
        self.send_boxed(Box::new(msg), sender);
    }

    /// Type-erased variant of [`send`](Self::send).
    pub fn send_boxed(&self, msg: Box<dyn Message>, sender: Option<Address>) {
        self.cell.enqueue(msg, sender);
    }

    /// Send a message synchronously and collect the optional reply.
    ///
    /// The handler runs in the calling thread before this returns.
    ///
    /// # Panics
    ///
    /// Panics when `sender` addresses this same actor.
    pub fn fast_send(
        &self,
        msg: impl Message,
        sender: Option<&Address>,
    ) -> Option<Box<dyn Message>> {
        fast_dispatch(&self.cell, &msg, sender)
    }

    /// Initiate graceful shutdown by posting Shutdown to self.
    pub fn terminate(&self) {
        self.cell.post_shutdown();
    }

    /// Pending messages in this actor's own mailbox.
    pub fn queue_len(&self) -> usize {
        self.cell.mailbox.len()
    }

    /// Messages dispatched by this actor so far.
    pub fn message_count(&self) -> u64 {
        self.cell.message_count()
    }

    /// OS thread id of the worker, once running (0 before that).
    pub fn thread_id(&self) -> i64 {
        self.cell.thread_id()
    }

    /// `true` once the actor has stopped accepting messages.
    pub fn is_terminated(&self) -> bool {
        self.cell.is_terminated()
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("name", &self.name())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}
