//! Mailbox backpressure: overflow absorbs bursts without dropping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use axon_runtime::{
    define_message, ActorBehavior, ActorRef, HandlerTable, Manager, Placement, RuntimeConfig,
};

struct Job;
define_message!(Job, 110);

struct SlowConsumer {
    handled: Arc<AtomicUsize>,
    expected: usize,
    done: mpsc::Sender<()>,
}

impl ActorBehavior for SlowConsumer {
    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on::<Job>(|actor, _, _| {
            thread::sleep(Duration::from_millis(1));
            if actor.handled.fetch_add(1, Ordering::SeqCst) + 1 == actor.expected {
                let _ = actor.done.send(());
            }
        });
    }
}

#[test]
fn burst_overflows_ring_without_drops() {
    const TOTAL: usize = 400;
    const RING: usize = 16;

    let handled = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = mpsc::channel();

    let config = RuntimeConfig {
        mailbox_capacity: RING,
    };
    let mut manager = Manager::new();
    let consumer = ActorRef::with_config(
        "consumer",
        SlowConsumer {
            handled: Arc::clone(&handled),
            expected: TOTAL,
            done: done_tx,
        },
        &config,
    );
    manager.manage(&consumer, Placement::default());
    manager.init().unwrap();

    for _ in 0..TOTAL {
        consumer.send(Job, None);
    }

    // The producer outran the 1ms-per-message consumer: the queue must have
    // spilled past the ring without stalling the producer or dropping.
    let depth = consumer.queue_len();
    assert!(
        depth > RING,
        "expected backlog above ring capacity, got {depth}"
    );
    assert!(depth <= TOTAL);

    done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("consumer never finished");
    assert_eq!(handled.load(Ordering::SeqCst), TOTAL);
    assert_eq!(consumer.queue_len(), 0);

    manager.terminate();
    manager.end();

    // Conservation: everything sent was handled, nothing remains queued.
    assert_eq!(handled.load(Ordering::SeqCst), TOTAL);
    assert_eq!(consumer.queue_len(), 0);
}
