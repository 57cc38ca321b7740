//! In-memory queue of outgoing events.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::PendingEvent;

/// Bounded in-memory queue of pending events.
///
/// Admission prepends: the newest event sits at the head of the queue. When the queue is over
/// capacity the oldest entry (at the tail) is dropped, so retention favors the most recent
/// events. Taking a batch swaps the whole queue out in one step, so events logged while a batch
/// is in flight land in the next batch.
#[derive(Clone)]
pub struct EventBatcher {
    max_pending_events: usize,
    queue: Arc<Mutex<VecDeque<PendingEvent>>>,
}

impl EventBatcher {
    /// Create a queue holding at most `max_pending_events` events.
    pub fn new(max_pending_events: usize) -> EventBatcher {
        EventBatcher {
            max_pending_events,
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Enqueue `event` at the head, dropping the oldest entry when over capacity.
    pub fn push(&self, event: PendingEvent) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_front(event);
        while queue.len() > self.max_pending_events {
            queue.pop_back();
        }
    }

    /// Swap the queue for an empty one and return its contents, newest first.
    pub fn take_batch(&self) -> Vec<PendingEvent> {
        let mut queue = self.queue.lock().unwrap();
        std::mem::take(&mut *queue).into()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}
