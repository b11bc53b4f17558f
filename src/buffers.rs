//! Local buffers between peer listeners and polling consumers
//!
//! Listeners push whatever arrives; consumers poll without ever waiting.
//! Both queues are unbounded, so a node that receives faster than it is
//! polled grows without limit.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::protocol::Publication;

/// Unbounded FIFO safe for many producers and many consumers
#[derive(Debug)]
pub struct FifoQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Pop the oldest item, or `None` immediately if empty
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The two per-node queues: work identifiers and event publications
#[derive(Debug, Default)]
pub struct LocalBuffers {
    work: FifoQueue<String>,
    publications: FifoQueue<Publication>,
}

impl LocalBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_work(&self, id: String) {
        self.work.push(id);
    }

    pub fn pop_work(&self) -> Option<String> {
        self.work.try_pop()
    }

    pub fn push_publication(&self, publication: Publication) {
        self.publications.push(publication);
    }

    pub fn pop_publication(&self) -> Option<Publication> {
        self.publications.try_pop()
    }

    pub fn pending_work(&self) -> usize {
        self.work.len()
    }

    pub fn pending_publications(&self) -> usize {
        self.publications.len()
    }
}
