use std::sync::atomic::{AtomicU64, Ordering};

/// Coarse-grained broker counters, owned by the [`Broker`](crate::core::broker::Broker).
///
/// `handed_off + buffered == produced`: each produce is counted once, at
/// its first destination. A message taken back from a cancelled waiter only
/// bumps `rerouted`.
#[derive(Debug, Default)]
pub struct BrokerStats {
    produced: AtomicU64,
    handed_off: AtomicU64,
    buffered: AtomicU64,
    consumed: AtomicU64,
    wait_timeouts: AtomicU64,
    rerouted: AtomicU64,
}

impl BrokerStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_handed_off(&self) {
        self.handed_off.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_buffered(&self) {
        self.buffered.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_wait_timeouts(&self) {
        self.wait_timeouts.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub fn inc_rerouted(&self) {
        self.rerouted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }
    pub fn handed_off(&self) -> u64 {
        self.handed_off.load(Ordering::Relaxed)
    }
    pub fn buffered(&self) -> u64 {
        self.buffered.load(Ordering::Relaxed)
    }
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
    pub fn wait_timeouts(&self) -> u64 {
        self.wait_timeouts.load(Ordering::Relaxed)
    }
    pub fn rerouted(&self) -> u64 {
        self.rerouted.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> String {
        // Prometheus-style text without HELP/TYPE lines
        format!(
            "pollmq_produced {}\npollmq_handed_off {}\npollmq_buffered {}\npollmq_consumed {}\npollmq_wait_timeouts {}\npollmq_rerouted {}\n",
            self.produced(),
            self.handed_off(),
            self.buffered(),
            self.consumed(),
            self.wait_timeouts(),
            self.rerouted(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lists_every_counter() {
        let stats = BrokerStats::new();
        stats.inc_produced();
        stats.inc_produced();
        stats.inc_handed_off();

        let text = stats.snapshot();
        assert!(text.contains("pollmq_produced 2\n"));
        assert!(text.contains("pollmq_handed_off 1\n"));
        assert!(text.contains("pollmq_rerouted 0\n"));
        assert_eq!(text.lines().count(), 6);
    }
}
