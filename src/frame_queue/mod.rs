//! BoundedFrameQueue - capture to processing hand-off
//!
//! Fixed capacity, producer never blocks. When the queue is full the newly
//! captured frame is dropped so processing always works on recent frames.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Default queue depth per session
pub const DEFAULT_CAPACITY: usize = 30;

/// Outcome of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Enqueued,
    Dropped,
}

/// Bounded drop-newest queue
pub struct BoundedFrameQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> BoundedFrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Non-blocking enqueue
    pub fn push(&self, item: T) -> PushOutcome {
        match self.tx.try_send(item) {
            Ok(()) => PushOutcome::Enqueued,
            // both ends live in self, so Disconnected cannot happen while we exist
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Dropped
            }
        }
    }

    /// Non-blocking dequeue
    pub fn try_pop(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Discard everything currently queued
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames dropped because the queue was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Default for BoundedFrameQueue<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_drop_newest_when_full() {
        let queue = BoundedFrameQueue::new(3);
        for i in 0..3 {
            assert_eq!(queue.push(i), PushOutcome::Enqueued);
        }
        assert_eq!(queue.push(99), PushOutcome::Dropped);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_count(), 1);

        // oldest frames survive, the rejected one never shows up
        assert_eq!(queue.try_pop(), Some(0));
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), Some(2));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_fast_producer_never_exceeds_capacity() {
        let queue = Arc::new(BoundedFrameQueue::new(DEFAULT_CAPACITY));
        let producer = {
            let queue = queue.clone();
            std::thread::spawn(move || {
                let mut max_seen = 0;
                for i in 0..10_000u32 {
                    queue.push(i);
                    max_seen = max_seen.max(queue.len());
                }
                max_seen
            })
        };

        let mut popped = 0;
        while !producer.is_finished() {
            if queue.try_pop().is_some() {
                popped += 1;
            }
        }
        let max_seen = producer.join().unwrap();
        popped += queue.clear();

        assert!(max_seen <= DEFAULT_CAPACITY);
        assert_eq!(popped as u64 + queue.dropped_count(), 10_000);
    }

    #[test]
    fn test_no_drops_below_capacity() {
        let queue = BoundedFrameQueue::new(4);
        for round in 0..100 {
            assert_eq!(queue.push(round), PushOutcome::Enqueued);
            assert_eq!(queue.try_pop(), Some(round));
        }
        assert_eq!(queue.dropped_count(), 0);
        assert!(queue.is_empty());
    }
}
