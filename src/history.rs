//! Bounded record of successful decodes, newest first.

use crate::types::ScanResult;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct ResultHistory {
    entries: VecDeque<ScanResult>,
    capacity: usize,
}

impl ResultHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Record a result, evicting the oldest entry once the cap is reached.
    pub fn append(&mut self, result: ScanResult) {
        if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_back() {
                log::debug!("History full, evicting {} ({})", evicted.text, evicted.id);
            }
        }
        self.entries.push_front(result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<&ScanResult> {
        self.entries.front()
    }

    /// Copy of the current entries, newest first.
    pub fn all(&self) -> Vec<ScanResult> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ResultHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
