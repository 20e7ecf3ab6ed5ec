// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Blocking queue (§4.6): a bounded SPSC queue with timed waits.
//!
//! `examples/original_source/inc/etfw/msg/BlockingMsgQueue.hpp` backs this
//! with a counting semaphore whose value always equals the queue length.
//! `std::sync::Condvar` gives the same observable behavior without a
//! separate counter: `VecDeque::len()` *is* the queue length, so there is
//! nothing to keep in sync.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Hard upper bound on any bounded queue (§6 `queue_depth_limit`),
/// documented as the original's counting semaphore's value range.
pub const QUEUE_DEPTH_LIMIT: usize = 255;

/// A bounded queue of depth `D` (§4.6). `D` must not exceed
/// [`QUEUE_DEPTH_LIMIT`].
pub struct BlockingQueue<T, const D: usize> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T, const D: usize> Default for BlockingQueue<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const D: usize> BlockingQueue<T, D> {
    pub fn new() -> Self {
        assert!(
            D <= QUEUE_DEPTH_LIMIT,
            "queue depth {D} exceeds the {QUEUE_DEPTH_LIMIT}-entry hard upper bound"
        );
        Self {
            items: Mutex::new(VecDeque::with_capacity(D)),
            not_empty: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= D
    }

    /// `push(item)` (§4.6): non-blocking enqueue. Returns `false` if full.
    pub fn push(&self, item: T) -> bool {
        let mut items = self.items.lock().unwrap();
        if items.len() >= D {
            return false;
        }
        items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// `front(out)` (§4.6): non-blocking dequeue of the head, or `None`.
    pub fn front(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }

    /// `front(out, timeout_ms)` (§4.6): blocks up to `timeout` for an item.
    pub fn front_timeout(&self, timeout: Duration) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let (guard, result) = self.not_empty.wait_timeout(items, timeout).unwrap();
            items = guard;
            if result.timed_out() {
                return items.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn push_then_front_is_fifo() {
        let q: BlockingQueue<u32, 4> = BlockingQueue::new();
        assert!(q.push(1));
        assert!(q.push(2));
        assert_eq!(q.front(), Some(1));
        assert_eq!(q.front(), Some(2));
        assert_eq!(q.front(), None);
    }

    #[test]
    fn push_returns_false_when_full() {
        let q: BlockingQueue<u32, 2> = BlockingQueue::new();
        assert!(q.push(1));
        assert!(q.push(2));
        assert!(!q.push(3));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn front_timeout_returns_none_on_empty_timeout() {
        let q: BlockingQueue<u32, 2> = BlockingQueue::new();
        let start = std::time::Instant::now();
        assert_eq!(q.front_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn front_timeout_wakes_on_push_from_another_thread() {
        let q: Arc<BlockingQueue<u32, 2>> = Arc::new(BlockingQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            q2.push(42);
        });
        let got = q.front_timeout(Duration::from_secs(1));
        handle.join().unwrap();
        assert_eq!(got, Some(42));
    }

    #[test]
    #[should_panic]
    fn depth_over_255_is_rejected_at_construction() {
        let _q: BlockingQueue<u32, 256> = BlockingQueue::new();
    }
}
