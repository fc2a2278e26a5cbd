use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::trace;

use crate::core::message::{Message, QueueName};

/// Identity of one registered waiter.
///
/// Ids grow monotonically, so ordering by id is ordering by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// The consumer side of a registration: its id plus the receiving end of
/// the single-slot hand-off channel.
#[derive(Debug)]
pub struct WaiterHandle {
    pub id: WaiterId,
    pub receiver: oneshot::Receiver<Message>,
}

/// A sender slot is `None` once a message went through it. The slot stays
/// in place until the owner deregisters.
type Slots = BTreeMap<WaiterId, Option<oneshot::Sender<Message>>>;

/// [`WaiterRegistry`] tracks consumers blocked on a queue name.
///
/// Producers hand messages straight to the longest-waiting consumer through
/// a oneshot channel. Delivery never blocks and never removes the slot;
/// removal is always done by the waiting side via [`WaiterRegistry::deregister`].
#[derive(Debug, Default)]
pub struct WaiterRegistry {
    waiters: Mutex<HashMap<QueueName, Slots>>,
    next_id: AtomicU64,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new waiter at the tail of `name`'s line.
    pub fn register(&self, name: &str) -> WaiterHandle {
        let id = WaiterId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = oneshot::channel();

        self.lock()
            .entry(name.to_owned())
            .or_default()
            .insert(id, Some(sender));
        trace!(target: "pollmq::waiters", queue = name, waiter = %id, "registered");

        WaiterHandle { id, receiver }
    }

    /// Removes waiter `id` from `name`'s line.
    ///
    /// Idempotent: returns `false` when the waiter is already gone.
    pub fn deregister(&self, name: &str, id: WaiterId) -> bool {
        let mut waiters = self.lock();
        let Some(slots) = waiters.get_mut(name) else {
            return false;
        };
        let removed = slots.remove(&id).is_some();
        if slots.is_empty() {
            waiters.remove(name);
        }
        if removed {
            trace!(target: "pollmq::waiters", queue = name, waiter = %id, "deregistered");
        }
        removed
    }

    /// Hands `message` to the longest-waiting consumer of `name` that has
    /// not been served yet.
    ///
    /// Gives the message back when no such consumer exists.
    pub fn try_deliver(&self, name: &str, message: Message) -> Result<(), Message> {
        let mut waiters = self.lock();
        let Some(slots) = waiters.get_mut(name) else {
            return Err(message);
        };

        let mut message = message;
        for (id, slot) in slots.iter_mut() {
            // `send` consumes the sender: a slot can only ever be used once.
            let Some(sender) = slot.take() else {
                continue;
            };
            match sender.send(message) {
                Ok(()) => {
                    trace!(target: "pollmq::waiters", queue = name, waiter = %id, "handed off");
                    return Ok(());
                }
                // Receiver already gone; offer it to the next in line.
                Err(returned) => message = returned,
            }
        }
        Err(message)
    }

    /// Number of registered waiters for `name`, served or not.
    pub fn waiting(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, BTreeMap::len)
    }

    /// Number of names with at least one registered waiter.
    pub fn name_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueueName, Slots>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
