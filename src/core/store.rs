use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::core::message::{Message, QueueName};

/// [`MessageStore`] buffers messages that arrived while nobody was waiting.
///
/// A single mutex covers the whole name → queue map. A name is present only
/// while it has at least one pending message.
#[derive(Debug, Default)]
pub struct MessageStore {
    queues: Mutex<HashMap<QueueName, VecDeque<Message>>>,
}

impl MessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` to the tail of the queue for `name`.
    pub fn push(&self, name: &str, message: Message) {
        let mut queues = self.lock();
        let queue = queues.entry(name.to_owned()).or_default();
        queue.push_back(message);
        trace!(target: "pollmq::store", queue = name, depth = queue.len(), "buffered message");
    }

    /// Removes and returns the oldest message for `name`.
    ///
    /// The key is dropped as soon as its queue runs empty.
    pub fn pop(&self, name: &str) -> Option<Message> {
        let mut queues = self.lock();
        let queue = queues.get_mut(name)?;
        let message = queue.pop_front();
        if queue.is_empty() {
            queues.remove(name);
        }
        message
    }

    /// Number of buffered messages for `name` (0 for unknown names).
    pub fn len(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, VecDeque::len)
    }

    /// Number of names with at least one buffered message.
    pub fn queue_count(&self) -> usize {
        self.lock().len()
    }

    /// Total buffered messages across every name.
    pub fn total_len(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // is still safe to reuse.
    fn lock(&self) -> MutexGuard<'_, HashMap<QueueName, VecDeque<Message>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
