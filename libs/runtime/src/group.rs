//! Cooperative actor groups: many actors, one worker thread.
//!
//! A Group is itself an actor. Members added to it stop owning a thread;
//! their asynchronous sends are routed into the Group's mailbox, and the
//! Group's worker dispatches them one at a time. Members therefore never
//! execute concurrently with each other, while each still gets its own
//! dispatch mutex, handler table, and message counter.
//!
//! The Group reacts to three shapes of traffic:
//!
//! - Start from outside: run each member's start hook and deliver Start to
//!   each member synchronously, in insertion order.
//! - Shutdown from outside: deliver Shutdown to each member synchronously,
//!   then run each member's stop hook.
//! - Anything else: forward to the member the message was addressed to,
//!   preserving the original sender as the reply route.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::actor::{
    dispatch_on, fast_dispatch, run_end_hook_once, run_start_hook, ActorBehavior, ActorCell,
    ActorRef, BehaviorCell, CellKind,
};
use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::handlers::HandlerTable;
use crate::message::{Message, Shutdown, Start};

/// Insertion-ordered member list plus a name index.
pub(crate) struct GroupRoster {
    inner: Mutex<RosterInner>,
}

struct RosterInner {
    members: Vec<Arc<ActorCell>>,
    by_name: HashMap<String, Arc<ActorCell>>,
}

impl GroupRoster {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RosterInner {
                members: Vec::new(),
                by_name: HashMap::new(),
            }),
        }
    }

    fn add(&self, member: Arc<ActorCell>) {
        let mut inner = self.inner.lock();
        assert!(
            !inner.by_name.contains_key(member.name()),
            "group already contains a member named '{}'",
            member.name()
        );
        inner
            .by_name
            .insert(member.name().to_string(), Arc::clone(&member));
        inner.members.push(member);
    }

    /// Snapshot of the members in insertion order.
    pub(crate) fn members(&self) -> Vec<Arc<ActorCell>> {
        self.inner.lock().members.clone()
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<ActorCell>> {
        self.inner.lock().by_name.get(name).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().members.len()
    }
}

struct GroupBehavior;

impl ActorBehavior for GroupBehavior {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Start>(|_, msg, ctx| {
            if ctx.sender_is(ctx.cell()) {
                forward(msg, ctx);
            } else {
                fan_out_start(ctx);
            }
        });
        table.on::<Shutdown>(|_, msg, ctx| {
            if ctx.sender_is(ctx.cell()) {
                forward(msg, ctx);
            } else {
                fan_out_shutdown(ctx);
            }
        });
    }

    fn unhandled(&mut self, msg: &dyn Message, ctx: &mut Context<'_>) {
        forward(msg, ctx);
    }
}

fn fan_out_start(ctx: &mut Context<'_>) {
    let roster = ctx.cell().roster().expect("group cell without roster");
    let group_addr = ctx.address();
    for member in roster.members() {
        debug!(group = %ctx.name(), member = %member.name(), "starting group member");
        run_start_hook(&member);
        let _ = fast_dispatch(&member, &Start, Some(&group_addr));
    }
}

fn fan_out_shutdown(ctx: &mut Context<'_>) {
    let roster = ctx.cell().roster().expect("group cell without roster");
    let group_addr = ctx.address();
    for member in roster.members() {
        debug!(group = %ctx.name(), member = %member.name(), "stopping group member");
        let _ = fast_dispatch(&member, &Shutdown, Some(&group_addr));
        run_end_hook_once(&member);
    }
}

/// Dispatch a member-addressed message on the member, borrowed from the
/// Group's worker loop (which frees it exactly once).
fn forward(msg: &dyn Message, ctx: &mut Context<'_>) {
    assert!(
        !ctx.is_fast(),
        "cannot forward a fast-send message through a group"
    );
    let Some(dest) = ctx.dest().and_then(Weak::upgrade) else {
        trace!(group = %ctx.name(), "forward dropped: destination gone");
        return;
    };
    if Arc::ptr_eq(&dest, ctx.cell()) {
        trace!(
            group = %ctx.name(),
            id = msg.message_id(),
            "unhandled message addressed to the group itself; ignored"
        );
        return;
    }
    dispatch_on(&dest, msg, ctx.sender(), None, ctx.is_last());
}

/// An actor whose worker thread multiplexes a set of member actors.
pub struct Group {
    actor: ActorRef,
}

impl Group {
    /// Create an empty group with the default runtime configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, &RuntimeConfig::default())
    }

    /// Create an empty group with an explicit runtime configuration.
    pub fn with_config(name: impl Into<String>, config: &RuntimeConfig) -> Self {
        let mut handlers = HandlerTable::new();
        GroupBehavior::register_handlers(&mut handlers);
        let cell = ActorCell::build(
            name.into(),
            Box::new(BehaviorCell {
                actor: GroupBehavior,
                handlers,
            }),
            CellKind::Group(GroupRoster::new()),
            config.mailbox_capacity,
        );
        Self {
            actor: ActorRef::from_cell(cell),
        }
    }

    /// Add a member. The member's sends now route through this group.
    ///
    /// # Panics
    ///
    /// Panics when the member is a group, already belongs to a group, is
    /// already managed, or duplicates an existing member name.
    pub fn add(&self, member: &ActorRef) {
        assert!(
            !member.cell().is_group(),
            "nested groups are not supported"
        );
        member.cell().join_group(self.actor.cell());
        self.roster().add(Arc::clone(member.cell()));
    }

    /// The group as an actor (manage it, address it, terminate it).
    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<ActorRef> {
        self.roster().get(name).map(ActorRef::from_cell)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.roster().len()
    }

    /// `true` when the group has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn roster(&self) -> &GroupRoster {
        self.actor.cell().roster().expect("group cell without roster")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::define_message;

    struct Step {
        n: u32,
    }
    define_message!(Step, 160);

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        started: Arc<AtomicUsize>,
    }

    impl ActorBehavior for Recorder {
        fn register_handlers(table: &mut HandlerTable<Self>) {
            table.on::<Start>(|rec, _, _| {
                rec.log.lock().push(format!("{}:start-msg", rec.label));
            });
            table.on::<Step>(|rec, msg, _| {
                rec.log.lock().push(format!("{}:step-{}", rec.label, msg.n));
            });
        }

        fn on_start(&mut self, _ctx: &mut Context<'_>) {
            self.started.fetch_add(1, Ordering::SeqCst);
            self.log.lock().push(format!("{}:init", self.label));
        }
    }

    fn recorder(
        label: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        started: &Arc<AtomicUsize>,
    ) -> ActorRef {
        ActorRef::new(
            label,
            Recorder {
                label,
                log: Arc::clone(log),
                started: Arc::clone(started),
            },
        )
    }

    #[test]
    fn start_fan_out_runs_in_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicUsize::new(0));
        let group = Group::new("workers");
        let a = recorder("a", &log, &started);
        let b = recorder("b", &log, &started);
        group.add(&a);
        group.add(&b);

        let _ = group.actor().fast_send(Start, None);

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(
            *log.lock(),
            vec!["a:init", "a:start-msg", "b:init", "b:start-msg"]
        );
    }

    #[test]
    fn member_sends_route_through_group_mailbox() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicUsize::new(0));
        let group = Group::new("workers");
        let a = recorder("a", &log, &started);
        group.add(&a);

        a.send(Step { n: 1 }, None);
        assert_eq!(a.queue_len(), 0);
        assert_eq!(group.actor().queue_len(), 1);

        // Drain the group mailbox the way its worker loop would.
        let (env, last) = group.actor().cell().mailbox.pop();
        dispatch_on(
            group.actor().cell(),
            &*env.msg,
            env.sender.as_ref(),
            Some(&env.dest),
            last,
        );
        assert_eq!(*log.lock(), vec!["a:step-1"]);
        assert_eq!(a.message_count(), 1);
    }

    #[test]
    #[should_panic(expected = "already belongs to a group")]
    fn double_membership_is_fatal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicUsize::new(0));
        let g1 = Group::new("g1");
        let g2 = Group::new("g2");
        let a = recorder("a", &log, &started);
        g1.add(&a);
        g2.add(&a);
    }

    #[test]
    fn member_lookup_by_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicUsize::new(0));
        let group = Group::new("workers");
        group.add(&recorder("a", &log, &started));
        assert!(group.member("a").is_some());
        assert!(group.member("z").is_none());
        assert_eq!(group.len(), 1);
    }
}
