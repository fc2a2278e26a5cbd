//! Produce/consume coordination on top of [`MessageStore`] and [`WaiterRegistry`].
//!
//! A produce first tries to hand the message to a consumer that is already
//! waiting and only buffers it when nobody is. A consume first drains the
//! buffer and only then, if asked to, waits for a hand-off until its deadline.
//!
//! The two structures are locked independently and never at the same time.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;

use crate::core::message::Message;
use crate::core::store::MessageStore;
use crate::core::waiters::{WaiterId, WaiterRegistry};
use crate::metrics::BrokerStats;

/// Where a produced message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Given directly to a waiting consumer.
    HandedOff,
    /// Appended to the buffered queue.
    Buffered,
}

/// The queue engine. Construct once and share behind an `Arc`.
#[derive(Debug, Default)]
pub struct Broker {
    store: MessageStore,
    waiters: WaiterRegistry,
    stats: BrokerStats,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposits `message` under `name`. Never fails.
    pub fn produce(&self, name: &str, message: Message) -> Routed {
        self.stats.inc_produced();
        let routed = self.route(name, message);
        match routed {
            Routed::HandedOff => self.stats.inc_handed_off(),
            Routed::Buffered => self.stats.inc_buffered(),
        }
        debug!(target: "pollmq::broker", queue = name, ?routed, "produced");
        routed
    }

    /// Returns the oldest buffered message for `name`, without waiting.
    pub fn consume_no_wait(&self, name: &str) -> Option<Message> {
        let message = self.store.pop(name)?;
        self.stats.inc_consumed();
        Some(message)
    }

    /// Returns the oldest message for `name`, waiting up to `wait` for a
    /// producer when nothing is buffered.
    ///
    /// Dropping the returned future before it completes is safe: the waiter
    /// is deregistered and a message that already reached it is routed again.
    pub async fn consume_wait(&self, name: &str, wait: Duration) -> Option<Message> {
        if let Some(message) = self.consume_no_wait(name) {
            return Some(message);
        }

        let mut guard = WaitGuard::register(self, name);
        let delivered = tokio::select! {
            received = &mut guard.receiver => received.ok(),
            _ = tokio::time::sleep(wait) => None,
        };

        // A producer may have slipped in between the deadline and the
        // deregistration; whatever is in the slot then still belongs to us.
        let message = match delivered {
            Some(message) => {
                guard.release();
                Some(message)
            }
            None => guard.release(),
        };

        match message {
            Some(message) => {
                self.stats.inc_consumed();
                Some(message)
            }
            None => {
                self.stats.inc_wait_timeouts();
                debug!(target: "pollmq::broker", queue = name, ?wait, "wait expired");
                None
            }
        }
    }

    /// Dispatch helper: waits only when `wait` is given.
    pub async fn consume(&self, name: &str, wait: Option<Duration>) -> Option<Message> {
        match wait {
            Some(wait) => self.consume_wait(name, wait).await,
            None => self.consume_no_wait(name),
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn waiters(&self) -> &WaiterRegistry {
        &self.waiters
    }

    pub fn stats(&self) -> &BrokerStats {
        &self.stats
    }

    /// Hand-off first, buffer otherwise. Counting is left to the caller.
    fn route(&self, name: &str, message: Message) -> Routed {
        match self.waiters.try_deliver(name, message) {
            Ok(()) => Routed::HandedOff,
            Err(message) => {
                self.store.push(name, message);
                Routed::Buffered
            }
        }
    }
}

/// Registration of one waiting consumer. Deregisters exactly once, either
/// through [`WaitGuard::release`] or on drop.
struct WaitGuard<'a> {
    broker: &'a Broker,
    name: &'a str,
    id: WaiterId,
    receiver: oneshot::Receiver<Message>,
    released: bool,
}

impl<'a> WaitGuard<'a> {
    fn register(broker: &'a Broker, name: &'a str) -> Self {
        let handle = broker.waiters.register(name);
        Self {
            broker,
            name,
            id: handle.id,
            receiver: handle.receiver,
            released: false,
        }
    }

    /// Deregisters, then drains the slot. Once deregistered no producer can
    /// reach the slot any more, so the drain sees the final state.
    fn release(&mut self) -> Option<Message> {
        self.released = true;
        self.broker.waiters.deregister(self.name, self.id);
        self.receiver.try_recv().ok()
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Same path as a fresh produce: the next waiter in line, else the
        // tail of the store.
        if let Some(message) = self.release() {
            let routed = self.broker.route(self.name, message);
            self.broker.stats.inc_rerouted();
            debug!(
                target: "pollmq::broker",
                queue = self.name,
                waiter = %self.id,
                ?routed,
                "wait cancelled after hand-off; message routed again"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn produce_buffers_without_waiters() {
        let broker = Broker::new();
        assert_eq!(broker.produce("jobs", "m".into()), Routed::Buffered);
        assert_eq!(broker.store().len("jobs"), 1);
    }

    #[test]
    fn consume_no_wait_on_empty_name() {
        let broker = Broker::new();
        assert_eq!(broker.consume_no_wait("jobs"), None);
    }

    #[tokio::test]
    async fn buffered_message_is_preferred_over_waiting() {
        let broker = Broker::new();
        broker.produce("jobs", "ready".into());

        let got = broker.consume_wait("jobs", Duration::from_secs(30)).await;
        assert_eq!(got.as_deref(), Some("ready"));
        assert!(broker.waiters().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_consumer_gets_hand_off() {
        let broker = Arc::new(Broker::new());

        let consumer = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.consume_wait("jobs", Duration::from_secs(5)).await })
        };
        while broker.waiters().waiting("jobs") == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(broker.produce("jobs", "direct".into()), Routed::HandedOff);
        assert_eq!(consumer.await.unwrap().as_deref(), Some("direct"));
        assert!(broker.store().is_empty());
        assert!(broker.waiters().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_wait_deregisters() {
        let broker = Broker::new();

        let got = broker.consume_wait("jobs", Duration::from_secs(1)).await;
        assert_eq!(got, None);
        assert!(broker.waiters().is_empty());
        assert_eq!(broker.stats().wait_timeouts(), 1);
    }

    #[test]
    fn message_in_slot_is_claimed_on_release() {
        let broker = Broker::new();
        let mut guard = WaitGuard::register(&broker, "jobs");

        // Delivery lands after the deadline fired but before deregistration.
        broker.produce("jobs", "late".into());

        assert_eq!(guard.release().as_deref(), Some("late"));
        assert!(broker.waiters().is_empty());
        assert!(broker.store().is_empty());
    }

    #[test]
    fn dropped_guard_reroutes_delivered_message() {
        let broker = Broker::new();
        let guard = WaitGuard::register(&broker, "jobs");
        broker.produce("jobs", "orphan".into());

        drop(guard);

        assert!(broker.waiters().is_empty());
        assert_eq!(broker.consume_no_wait("jobs").as_deref(), Some("orphan"));
        assert_eq!(broker.stats().rerouted(), 1);
    }

    #[test]
    fn dropped_guard_hands_message_to_next_waiter() {
        let broker = Broker::new();
        let first = WaitGuard::register(&broker, "jobs");
        let mut second = WaitGuard::register(&broker, "jobs");

        // Reaches the longest waiter, which is then cancelled.
        assert_eq!(broker.produce("jobs", "m".into()), Routed::HandedOff);
        drop(first);

        assert!(broker.store().is_empty());
        assert_eq!(broker.waiters().waiting("jobs"), 1);
        assert_eq!(second.release().as_deref(), Some("m"));
        assert!(broker.waiters().is_empty());
    }

    #[test]
    fn rerouted_message_is_counted_once() {
        let broker = Broker::new();
        let guard = WaitGuard::register(&broker, "jobs");
        broker.produce("jobs", "a".into());
        broker.produce("jobs", "b".into());
        drop(guard);

        let stats = broker.stats();
        assert_eq!(stats.produced(), 2);
        assert_eq!(stats.handed_off(), 1);
        assert_eq!(stats.buffered(), 1);
        assert_eq!(stats.rerouted(), 1);
        assert_eq!(stats.handed_off() + stats.buffered(), stats.produced());
        assert_eq!(broker.store().len("jobs"), 2);
    }

    #[test]
    fn dropped_guard_without_delivery_only_deregisters() {
        let broker = Broker::new();
        let guard = WaitGuard::register(&broker, "jobs");
        drop(guard);

        assert!(broker.waiters().is_empty());
        assert!(broker.store().is_empty());
        assert_eq!(broker.stats().rerouted(), 0);
    }
}
