//! Timer utilities: external producers of Timeout messages.
//!
//! Timers are deliberately not actors. Each call spawns a detached thread
//! that sleeps and then delivers a [`Timeout`] to the subscriber's address;
//! if the subscriber is gone by then, the message is dropped like any other
//! send to a dead actor.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::context::Address;
use crate::message::Timeout;

/// One-shot wake-up scheduling.
pub struct Timer;

impl Timer {
    /// Deliver `Timeout { data }` to `subscriber` after `delay`.
    pub fn wake_up_in(subscriber: Address, delay: Duration, data: i64) {
        thread::spawn(move || {
            thread::sleep(delay);
            subscriber.send(Timeout { data }, None);
        });
    }

    /// Deliver `Timeout { data }` at the next `interval_ms` boundary.
    ///
    /// Boundaries are aligned to the wall clock, so cooperating processes
    /// wake at the same instants.
    pub fn wake_up_at_interval(subscriber: Address, interval_ms: u64, data: i64) {
        let interval_ms = interval_ms.max(1);
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let wait_ms = interval_ms - (now_ms % interval_ms);
        Self::wake_up_in(subscriber, Duration::from_millis(wait_ms), data);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::actor::{ActorBehavior, ActorRef};
    use crate::handlers::HandlerTable;

    struct Sleeper {
        woke: mpsc::Sender<i64>,
    }

    impl ActorBehavior for Sleeper {
        fn register_handlers(table: &mut HandlerTable<Self>) {
            table.on::<Timeout>(|sleeper, msg, _| {
                let _ = sleeper.woke.send(msg.data);
            });
        }
    }

    #[test]
    fn wake_up_delivers_timeout() {
        let (tx, rx) = mpsc::channel();
        let actor = ActorRef::new("sleeper", Sleeper { woke: tx });
        Timer::wake_up_in(actor.address(), Duration::from_millis(10), 7);

        // No worker thread in this test; dispatch the queued Timeout by hand
        // once it lands.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while actor.queue_len() == 0 {
            assert!(std::time::Instant::now() < deadline, "timer never fired");
            thread::sleep(Duration::from_millis(5));
        }
        let (env, last) = actor.cell().mailbox.pop();
        crate::actor::dispatch_on(actor.cell(), &*env.msg, env.sender.as_ref(), None, last);
        assert_eq!(rx.try_recv().unwrap(), 7);
    }
}
