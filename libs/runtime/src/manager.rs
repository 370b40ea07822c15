//! Actor lifecycle management: registration, startup, placement, shutdown.
//!
//! The Manager owns one worker thread per managed actor (a Group counts as
//! one actor and one thread). Startup delivers Start to every actor before
//! any worker runs; shutdown drains each actor to a terminal Shutdown, runs
//! its stop hook exactly once, joins every worker, and returns control to
//! the caller.
//!
//! The Manager is itself addressable as an actor: `terminate()` posts a
//! Shutdown to its own mailbox, which `end()` drains on the calling thread.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, trace, warn};

use crate::actor::{
    fast_dispatch, run_end_hook_once, run_worker, ActorBehavior, ActorCell, ActorRef,
    BehaviorCell, CellKind,
};
use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::handlers::HandlerTable;
use crate::message::{Shutdown, Start, SHUTDOWN_ID, START_ID};
use crate::placement::{self, Placement};

/// Point-in-time view of one managed actor.
#[derive(Debug, Clone)]
pub struct ActorStats {
    /// OS thread id of the worker (0 until the worker has started).
    pub thread_id: i64,
    /// Messages dispatched so far.
    pub messages_processed: u64,
    /// Messages waiting in the actor's own mailbox.
    pub queue_depth: usize,
}

struct ManagerBehavior;

impl ActorBehavior for ManagerBehavior {}

/// Lifecycle controller for a set of actors.
pub struct Manager {
    cell: Arc<ActorCell>,
    actors: Vec<Arc<ActorCell>>,
    threads: Vec<JoinHandle<()>>,
    managed: BTreeMap<String, Arc<ActorCell>>,
    expanded: BTreeMap<String, Arc<ActorCell>>,
    initialized: bool,
}

impl Manager {
    /// Create a manager named `manager`.
    pub fn new() -> Self {
        Self::named("manager")
    }

    /// Create a manager with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        let mut handlers = HandlerTable::new();
        ManagerBehavior::register_handlers(&mut handlers);
        let cell = ActorCell::build(
            name.into(),
            Box::new(BehaviorCell {
                actor: ManagerBehavior,
                handlers,
            }),
            CellKind::Plain,
            RuntimeConfig::default().mailbox_capacity,
        );
        Self {
            cell,
            actors: Vec::new(),
            threads: Vec::new(),
            managed: BTreeMap::new(),
            expanded: BTreeMap::new(),
            initialized: false,
        }
    }

    /// Register an actor (or group) to be managed.
    ///
    /// # Panics
    ///
    /// Panics on duplicate names (including group members already managed
    /// elsewhere), on managing a group member directly, on re-managing an
    /// actor, on an empty group, and on out-of-range affinity cores.
    pub fn manage(&mut self, actor: &ActorRef, placement: Placement) {
        let cell = actor.cell();
        assert!(
            !cell.is_in_group(),
            "actor '{}' belongs to a group; manage the group instead",
            cell.name()
        );

        let name = cell.name().to_string();
        assert!(
            !self.managed.contains_key(&name) && !self.expanded.contains_key(&name),
            "an actor named '{name}' is already managed"
        );

        let cores = placement::logical_cores();
        for &core in &placement.affinity {
            assert!(
                core < cores,
                "core id {core} out of range (machine has {cores} logical cores)"
            );
        }

        assert!(
            !cell.mark_managed(),
            "actor '{name}' is already managed"
        );

        if let Some(roster) = cell.roster() {
            let members = roster.members();
            assert!(
                !members.is_empty(),
                "add members to group '{name}' before managing it"
            );
            for member in members {
                let member_name = member.name().to_string();
                assert!(
                    !self.expanded.contains_key(&member_name)
                        && !self.managed.contains_key(&member_name),
                    "group member '{member_name}' is already managed elsewhere"
                );
                self.expanded.insert(member_name, member);
            }
        }

        cell.set_placement(placement);
        self.managed.insert(name.clone(), Arc::clone(cell));
        self.expanded.insert(name, Arc::clone(cell));
        self.actors.push(Arc::clone(cell));
    }

    /// Start every managed actor.
    ///
    /// Delivers Start to each actor in insertion order on the calling thread
    /// (a Group fans out to its members here), then spawns the worker
    /// threads and applies their placement, then posts Start to the manager
    /// itself.
    pub fn init(&mut self) -> Result<(), RuntimeError> {
        assert!(!self.initialized, "manager initialized twice");
        self.initialized = true;

        for cell in &self.actors {
            debug!(actor = %cell.name(), "delivering start");
            let _ = fast_dispatch(cell, &Start, None);
        }

        for cell in &self.actors {
            let worker_cell = Arc::clone(cell);
            let handle = thread::Builder::new()
                .name(cell.name().to_string())
                .spawn(move || {
                    apply_placement(&worker_cell);
                    run_worker(worker_cell);
                })
                .map_err(|e| RuntimeError::spawn(cell.name(), e))?;
            self.threads.push(handle);
        }

        self.cell.enqueue(Box::new(Start), None);
        info!(manager = %self.cell.name(), actors = self.actors.len(), "manager initialized");
        Ok(())
    }

    /// Run the manager loop until Shutdown, then join every worker.
    ///
    /// Blocks the calling thread. Returns once all workers have exited.
    pub fn end(&mut self) {
        loop {
            let (env, _last) = self.cell.mailbox.pop();
            match env.msg.message_id() {
                SHUTDOWN_ID => {
                    info!(manager = %self.cell.name(), "shutting down managed actors");
                    self.shutdown_all();
                    break;
                }
                START_ID => trace!(manager = %self.cell.name(), "manager started"),
                other => trace!(manager = %self.cell.name(), id = other, "manager ignoring message"),
            }
        }

        for handle in self.threads.drain(..) {
            if let Err(panic) = handle.join() {
                error!(?panic, "worker thread panicked");
            }
        }
        info!(manager = %self.cell.name(), "all workers joined");
    }

    fn shutdown_all(&self) {
        for cell in &self.actors {
            debug!(actor = %cell.name(), "stopping actor");
            run_end_hook_once(cell);
            let _ = fast_dispatch(cell, &Shutdown, None);
            cell.set_terminated();
            // Unblock a worker parked in mailbox pop.
            cell.wake_for_shutdown();
        }
    }

    /// Post a Shutdown to the manager's own mailbox.
    pub fn terminate(&self) {
        self.cell.post_shutdown();
    }

    /// The manager as an addressable actor.
    pub fn handle(&self) -> ActorRef {
        ActorRef::from_cell(Arc::clone(&self.cell))
    }

    /// Stats per top-level managed actor.
    pub fn stats(&self) -> BTreeMap<String, ActorStats> {
        self.managed
            .iter()
            .map(|(name, cell)| {
                (
                    name.clone(),
                    ActorStats {
                        thread_id: cell.thread_id(),
                        messages_processed: cell.message_count(),
                        queue_depth: cell.mailbox.len(),
                    },
                )
            })
            .collect()
    }

    /// Total pending messages across all managed actors.
    pub fn total_queue_length(&self) -> usize {
        self.actors.iter().map(|cell| cell.mailbox.len()).sum()
    }

    /// Names of every managed actor, with groups expanded to their members.
    pub fn managed_names(&self) -> Vec<String> {
        self.expanded.keys().cloned().collect()
    }

    /// Find a managed actor (or group member) by name.
    pub fn actor_by_name(&self, name: &str) -> Option<ActorRef> {
        self.expanded
            .get(name)
            .map(|cell| ActorRef::from_cell(Arc::clone(cell)))
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_placement(cell: &Arc<ActorCell>) {
    let placement = cell.placement();
    if !placement.affinity.is_empty() {
        match placement::pin_current_thread(&placement.affinity) {
            Ok(()) => debug!(actor = %cell.name(), cores = ?placement.affinity, "pinned worker"),
            Err(e) => warn!(
                actor = %cell.name(),
                cores = ?placement.affinity,
                error = %e,
                "could not set thread affinity"
            ),
        }
    }
    if placement.priority > 0 {
        match placement::set_current_priority(placement.class, placement.priority) {
            Ok(()) => debug!(
                actor = %cell.name(),
                class = ?placement.class,
                priority = placement.priority,
                "applied scheduling class"
            ),
            Err(e) => warn!(
                actor = %cell.name(),
                class = ?placement.class,
                priority = placement.priority,
                error = %e,
                "could not apply scheduling class; running at default priority"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;

    struct Idle;
    impl ActorBehavior for Idle {}

    #[test]
    #[should_panic(expected = "already managed")]
    fn duplicate_names_are_fatal() {
        let mut mgr = Manager::new();
        mgr.manage(&ActorRef::new("worker", Idle), Placement::default());
        mgr.manage(&ActorRef::new("worker", Idle), Placement::default());
    }

    #[test]
    #[should_panic(expected = "manage the group instead")]
    fn managing_a_group_member_is_fatal() {
        let group = Group::new("pool");
        let member = ActorRef::new("member", Idle);
        group.add(&member);
        let mut mgr = Manager::new();
        mgr.manage(&member, Placement::default());
    }

    #[test]
    #[should_panic(expected = "before managing it")]
    fn managing_an_empty_group_is_fatal() {
        let group = Group::new("pool");
        let mut mgr = Manager::new();
        mgr.manage(group.actor(), Placement::default());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_core_is_fatal() {
        let mut mgr = Manager::new();
        mgr.manage(
            &ActorRef::new("worker", Idle),
            Placement::pinned([usize::MAX]),
        );
    }

    #[test]
    #[should_panic(expected = "already managed elsewhere")]
    fn member_name_collision_across_groups_is_fatal() {
        let g1 = Group::new("g1");
        g1.add(&ActorRef::new("dup", Idle));
        let g2 = Group::new("g2");
        g2.add(&ActorRef::new("dup", Idle));
        let mut mgr = Manager::new();
        mgr.manage(g1.actor(), Placement::default());
        mgr.manage(g2.actor(), Placement::default());
    }

    #[test]
    fn expanded_names_include_group_members() {
        let group = Group::new("pool");
        group.add(&ActorRef::new("a", Idle));
        group.add(&ActorRef::new("b", Idle));
        let mut mgr = Manager::new();
        mgr.manage(group.actor(), Placement::default());
        mgr.manage(&ActorRef::new("solo", Idle), Placement::default());

        let names = mgr.managed_names();
        assert_eq!(names, vec!["a", "b", "pool", "solo"]);
        assert!(mgr.actor_by_name("b").is_some());
        assert!(mgr.actor_by_name("ghost").is_none());
    }
}
