//! # Sweep Hand-off Queue
//!
//! Bounded queue between the sweep producer and the clustering worker.
//!
//! The producer finalizes a sweep every few hundred milliseconds while a
//! clustering pass can take longer, so the queue is kept short (default 2).
//! What happens when it is full is an explicit [`OverflowPolicy`]:
//!
//! - `DropOldest`: the oldest queued sweep is displaced and returned to the
//!   caller, the producer never stalls
//! - `Block`: the producer waits for the worker to take an item
//!
//! Closing the queue wakes both sides. The worker drains what is left, then
//! [`HandoffQueue::pop`] returns `None`.
//!
//! ```rust
//! use sweepscope_core::handoff::{HandoffQueue, OverflowPolicy};
//!
//! let queue = HandoffQueue::new(2, OverflowPolicy::DropOldest);
//! queue.push(1).unwrap();
//! queue.push(2).unwrap();
//! assert_eq!(queue.push(3).unwrap(), Some(1));
//! assert_eq!(queue.dropped(), 1);
//!
//! queue.close();
//! assert_eq!(queue.pop(), Some(2));
//! assert_eq!(queue.pop(), Some(3));
//! assert_eq!(queue.pop(), None);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::types::{SweepError, SweepResult};

/// Default number of finalized sweeps that may wait for the worker.
pub const DEFAULT_HANDOFF_CAPACITY: usize = 2;

/// Full-queue behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Displace the oldest queued item
    #[default]
    DropOldest,
    /// Block the producer until space is available
    Block,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-thread queue with close semantics.
pub struct HandoffQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T> HandoffQueue<T> {
    /// Create a queue. Capacity is at least 1.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Queue state stays consistent across a panicking holder
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue `item`.
    ///
    /// Returns the displaced item under `DropOldest` when the queue was full.
    /// Fails with [`SweepError::QueueClosed`] once the queue is closed.
    pub fn push(&self, item: T) -> SweepResult<Option<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(SweepError::QueueClosed);
        }

        let mut displaced = None;
        match self.policy {
            OverflowPolicy::DropOldest => {
                if state.items.len() >= self.capacity {
                    displaced = state.items.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            OverflowPolicy::Block => {
                while state.items.len() >= self.capacity && !state.closed {
                    state = self.not_full.wait(state).unwrap_or_else(|e| e.into_inner());
                }
                if state.closed {
                    return Err(SweepError::QueueClosed);
                }
            }
        }

        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(displaced)
    }

    /// Dequeue the oldest item, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Non-blocking dequeue.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Refuse further pushes and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Close the queue and discard everything still pending.
    ///
    /// Returns the number of items discarded.
    pub fn abort(&self) -> usize {
        let discarded = {
            let mut state = self.lock();
            state.closed = true;
            let n = state.items.len();
            state.items.clear();
            n
        };
        self.not_empty.notify_all();
        self.not_full.notify_all();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items displaced by `DropOldest` since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> std::fmt::Debug for HandoffQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffQueue")
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("len", &self.len())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let q = HandoffQueue::new(4, OverflowPolicy::Block);
        for i in 0..4 {
            assert_eq!(q.push(i).unwrap(), None);
        }
        assert_eq!(q.len(), 4);
        for i in 0..4 {
            assert_eq!(q.try_pop(), Some(i));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn test_drop_oldest_counts() {
        let q = HandoffQueue::new(2, OverflowPolicy::DropOldest);
        q.push('a').unwrap();
        q.push('b').unwrap();
        assert_eq!(q.push('c').unwrap(), Some('a'));
        assert_eq!(q.push('d').unwrap(), Some('b'));
        assert_eq!(q.dropped(), 2);
        assert_eq!(q.try_pop(), Some('c'));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let q = HandoffQueue::new(0, OverflowPolicy::DropOldest);
        assert_eq!(q.capacity(), 1);
        q.push(1).unwrap();
        assert_eq!(q.push(2).unwrap(), Some(1));
    }

    #[test]
    fn test_closed_rejects_push() {
        let q = HandoffQueue::new(2, OverflowPolicy::Block);
        q.push(1).unwrap();
        q.close();
        assert!(q.is_closed());
        assert_eq!(q.push(2), Err(SweepError::QueueClosed));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_abort_discards_pending() {
        let q = HandoffQueue::new(2, OverflowPolicy::DropOldest);
        q.push(1).unwrap();
        q.push(2).unwrap();
        assert_eq!(q.abort(), 2);
        assert!(q.is_closed());
        assert_eq!(q.pop(), None);
        assert_eq!(q.push(3), Err(SweepError::QueueClosed));
    }

    #[test]
    fn test_block_waits_for_consumer() {
        let q = Arc::new(HandoffQueue::new(1, OverflowPolicy::Block));
        q.push(0u32).unwrap();

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push(1).map(|d| d.is_none()))
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(q.pop(), Some(0));
        assert_eq!(producer.join().unwrap(), Ok(true));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.dropped(), 0);
    }

    #[test]
    fn test_close_wakes_blocked_consumer() {
        let q: Arc<HandoffQueue<u8>> = Arc::new(HandoffQueue::new(2, OverflowPolicy::Block));
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop())
        };
        thread::sleep(Duration::from_millis(50));
        q.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_policy_serde_names() {
        let p: OverflowPolicy = serde_yaml::from_str("drop_oldest").unwrap();
        assert_eq!(p, OverflowPolicy::DropOldest);
        let p: OverflowPolicy = serde_yaml::from_str("block").unwrap();
        assert_eq!(p, OverflowPolicy::Block);
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropOldest);
    }
}
