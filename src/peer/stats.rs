//! Counters shared by every listener of a node

use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::MessageType;

/// Inbound message counters
#[derive(Debug, Default)]
pub struct ListenerStats {
    work_items: AtomicU64,
    publications: AtomicU64,
    malformed: AtomicU64,
}

/// Point-in-time copy of [`ListenerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub work_items: u64,
    pub publications: u64,
    pub malformed: u64,
}

impl StatsSnapshot {
    /// Every frame seen, decoded or not
    pub fn total(&self) -> u64 {
        self.work_items + self.publications + self.malformed
    }
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message_type: MessageType) {
        let counter = match message_type {
            MessageType::Workflow => &self.work_items,
            MessageType::Publication => &self.publications,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            work_items: self.work_items.load(Ordering::Relaxed),
            publications: self.publications.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ListenerStats::new();
        stats.record(MessageType::Workflow);
        stats.record(MessageType::Workflow);
        stats.record(MessageType::Publication);
        stats.record_malformed();

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                work_items: 2,
                publications: 1,
                malformed: 1,
            }
        );
        assert_eq!(snapshot.total(), 4);
    }
}
