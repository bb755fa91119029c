//! Gather counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Shared counters updated by every gather of a registry
#[derive(Debug, Default)]
pub struct GatherStats {
    started: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    ignored_replies: AtomicU64,
}

/// Point-in-time copy of [`GatherStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherMetrics {
    pub started: u64,
    pub completed: u64,
    pub timed_out: u64,
    pub ignored_replies: u64,
}

impl GatherMetrics {
    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(self.completed + self.timed_out)
    }
}

impl GatherStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored_reply(&self) {
        self.ignored_replies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GatherMetrics {
        GatherMetrics {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            ignored_replies: self.ignored_replies.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_in_flight() {
        let stats = GatherStats::new();
        stats.record_started();
        stats.record_started();
        stats.record_started();
        stats.record_completed();
        stats.record_timed_out();
        stats.record_ignored_reply();

        let metrics = stats.snapshot();
        assert_eq!(metrics.started, 3);
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.timed_out, 1);
        assert_eq!(metrics.ignored_replies, 1);
        assert_eq!(metrics.in_flight(), 1);
    }
}
