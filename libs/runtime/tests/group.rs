//! Group semantics: single-thread multiplexing of member actors.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use axon_runtime::{
    define_message, ActorBehavior, ActorRef, Group, HandlerTable, Manager, Placement, Start,
};

struct Work;
define_message!(Work, 130);

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    worker_tid: AtomicI64,
}

struct Member {
    label: &'static str,
    shared: Arc<Shared>,
    done: mpsc::Sender<&'static str>,
}

impl ActorBehavior for Member {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Start>(|member, _, _| {
            member
                .shared
                .events
                .lock()
                .unwrap()
                .push(format!("{}:start", member.label));
        });
        table.on::<Work>(|member, _, _| {
            let active = member.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
            member.shared.peak.fetch_max(active, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            member.shared.active.fetch_sub(1, Ordering::SeqCst);

            let tid = axon_runtime::placement::current_thread_id();
            let previous = member.shared.worker_tid.swap(tid, Ordering::SeqCst);
            assert!(
                previous == 0 || previous == tid,
                "group members handled on different threads"
            );
            let _ = member.done.send(member.label);
        });
    }

    fn on_start(&mut self, _ctx: &mut axon_runtime::Context<'_>) {
        self.shared
            .events
            .lock()
            .unwrap()
            .push(format!("{}:init", self.label));
    }
}

#[test]
fn group_starts_members_in_order_and_serializes_them() {
    let shared = Arc::new(Shared::default());
    let (done_tx, done_rx) = mpsc::channel();

    let group = Group::new("pool");
    for label in ["a", "b", "c"] {
        group.add(&ActorRef::new(
            label,
            Member {
                label,
                shared: Arc::clone(&shared),
                done: done_tx.clone(),
            },
        ));
    }

    let mut manager = Manager::new();
    manager.manage(group.actor(), Placement::default());
    manager.init().unwrap();

    // Start fan-out ran on this thread during init, in insertion order:
    // each member's init hook, then its Start handler.
    assert_eq!(
        *shared.events.lock().unwrap(),
        vec!["a:init", "a:start", "b:init", "b:start", "c:init", "c:start"]
    );

    // Asynchronous messages to members are all handled on the group's
    // single worker thread, one at a time.
    for label in ["a", "b", "c"] {
        let member = group.member(label).unwrap();
        member.send(Work, None);
        member.send(Work, None);
    }
    for _ in 0..6 {
        done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("member never handled work");
    }

    assert_eq!(shared.peak.load(Ordering::SeqCst), 1, "members overlapped");

    let stats = manager.stats();
    let group_tid = stats["pool"].thread_id;
    assert_eq!(shared.worker_tid.load(Ordering::SeqCst), group_tid);

    // Member mailboxes stay empty; everything flowed through the group.
    assert_eq!(group.member("a").unwrap().queue_len(), 0);

    manager.terminate();
    manager.end();
}

#[test]
fn group_counts_member_dispatches_individually() {
    let shared = Arc::new(Shared::default());
    let (done_tx, done_rx) = mpsc::channel();

    let group = Group::new("pool");
    let a = ActorRef::new(
        "a",
        Member {
            label: "a",
            shared: Arc::clone(&shared),
            done: done_tx.clone(),
        },
    );
    let b = ActorRef::new(
        "b",
        Member {
            label: "b",
            shared: Arc::clone(&shared),
            done: done_tx,
        },
    );
    group.add(&a);
    group.add(&b);

    let mut manager = Manager::new();
    manager.manage(group.actor(), Placement::default());
    manager.init().unwrap();

    a.send(Work, None);
    a.send(Work, None);
    b.send(Work, None);
    for _ in 0..3 {
        done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("member never handled work");
    }

    // Start (fast) + forwarded work, tracked per member.
    assert_eq!(a.message_count(), 3);
    assert_eq!(b.message_count(), 2);

    manager.terminate();
    manager.end();
}
