//! Blocking actor mailbox: bounded ring with unbounded overflow.
//!
//! The steady-state path stays inside a fixed-capacity ring; when producers
//! outrun the consumer the ring spills into an unbounded overflow deque, so
//! `push` never blocks and never fails. FIFO order is preserved across the
//! (ring, overflow) pair: once the overflow is non-empty, new items go to its
//! tail until both queues drain in order.
//!
//! The consumer side blocks on a condition variable when both queues are
//! empty; spurious wakeups are absorbed by the wait predicate.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Default ring capacity for actor mailboxes.
pub const DEFAULT_CAPACITY: usize = 64;

struct Queues<T> {
    ring: VecDeque<T>,
    overflow: VecDeque<T>,
}

/// Many-producer, single-consumer blocking queue.
pub struct Mailbox<T> {
    inner: Mutex<Queues<T>>,
    available: Condvar,
    capacity: usize,
}

impl<T> Mailbox<T> {
    /// Create a mailbox with the default ring capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a mailbox with an explicit ring capacity.
    ///
    /// The capacity bounds only the ring; overflow growth is unbounded.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "mailbox capacity must be non-zero");
        Self {
            inner: Mutex::new(Queues {
                ring: VecDeque::with_capacity(capacity),
                overflow: VecDeque::new(),
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue an item. Never blocks the producer.
    pub fn push(&self, item: T) {
        {
            let mut q = self.inner.lock();
            if !q.overflow.is_empty() || q.ring.len() == self.capacity {
                q.overflow.push_back(item);
            } else {
                q.ring.push_back(item);
            }
        }
        self.available.notify_one();
    }

    /// Dequeue the head item, blocking while the mailbox is empty.
    ///
    /// The second element is `true` when this pop drained the mailbox.
    pub fn pop(&self) -> (T, bool) {
        let mut q = self.inner.lock();
        while q.ring.is_empty() && q.overflow.is_empty() {
            self.available.wait(&mut q);
        }
        let item = if let Some(item) = q.ring.pop_front() {
            item
        } else {
            // Overflow is non-empty: the wait predicate saw one of the two.
            q.overflow.pop_front().unwrap()
        };
        let last = q.ring.is_empty() && q.overflow.is_empty();
        (item, last)
    }

    /// Inspect the head item without removing it.
    pub fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let q = self.inner.lock();
        q.ring.front().or_else(|| q.overflow.front()).map(f)
    }

    /// Number of queued items across ring and overflow.
    pub fn len(&self) -> usize {
        let q = self.inner.lock();
        q.ring.len() + q.overflow.len()
    }

    /// `true` when no items are queued.
    pub fn is_empty(&self) -> bool {
        let q = self.inner.lock();
        q.ring.is_empty() && q.overflow.is_empty()
    }

    /// Ring capacity this mailbox was built with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
