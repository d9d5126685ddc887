//! FIFO enrichment queue with a priority lane.
//!
//! A tab appears at most once across both lanes. Queuing a tab that is
//! already waiting in the normal lane with priority moves it to the
//! priority lane; its debounce deadline is kept.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::time::Instant;

use tabweave_core::TabHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedTab {
    pub handle: TabHandle,
    pub priority: Priority,
    /// Processing must not start before this instant.
    pub ready_at: Instant,
}

#[derive(Debug, Default)]
pub struct EnrichmentQueue {
    high: VecDeque<QueuedTab>,
    normal: VecDeque<QueuedTab>,
}

impl EnrichmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the tab was already queued in the same or a
    /// higher lane.
    pub fn push(&mut self, handle: TabHandle, priority: Priority, ready_at: Instant) -> bool {
        if self.high.iter().any(|q| q.handle == handle) {
            return false;
        }
        if let Some(pos) = self.normal.iter().position(|q| q.handle == handle) {
            if priority == Priority::Normal {
                return false;
            }
            if let Some(mut promoted) = self.normal.remove(pos) {
                promoted.priority = Priority::High;
                self.high.push_back(promoted);
            }
            return true;
        }
        let item = QueuedTab {
            handle,
            priority,
            ready_at,
        };
        match priority {
            Priority::High => self.high.push_back(item),
            Priority::Normal => self.normal.push_back(item),
        }
        true
    }

    /// Next tab, priority lane first.
    pub fn pop(&mut self) -> Option<QueuedTab> {
        self.high.pop_front().or_else(|| self.normal.pop_front())
    }

    pub fn peek_priority(&self) -> Option<Priority> {
        self.high
            .front()
            .or_else(|| self.normal.front())
            .map(|q| q.priority)
    }

    pub fn remove(&mut self, handle: TabHandle) -> bool {
        let before = self.len();
        self.high.retain(|q| q.handle != handle);
        self.normal.retain(|q| q.handle != handle);
        self.len() != before
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_lane_first_then_fifo() {
        let now = Instant::now();
        let mut q = EnrichmentQueue::new();
        q.push(1, Priority::Normal, now);
        q.push(2, Priority::Normal, now);
        q.push(3, Priority::High, now);
        q.push(4, Priority::High, now);

        let order: Vec<TabHandle> = std::iter::from_fn(|| q.pop()).map(|t| t.handle).collect();
        assert_eq!(order, vec![3, 4, 1, 2]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_duplicates_are_ignored_and_promotion_moves_lane() {
        let now = Instant::now();
        let mut q = EnrichmentQueue::new();
        assert!(q.push(1, Priority::Normal, now));
        assert!(q.push(2, Priority::Normal, now));
        assert!(!q.push(1, Priority::Normal, now));
        assert!(q.push(2, Priority::High, now));
        assert!(!q.push(2, Priority::Normal, now));
        assert_eq!(q.len(), 2);

        assert_eq!(q.peek_priority(), Some(Priority::High));
        assert_eq!(q.pop().map(|t| t.handle), Some(2));
        assert_eq!(q.pop().map(|t| t.handle), Some(1));
    }

    #[test]
    fn test_remove() {
        let now = Instant::now();
        let mut q = EnrichmentQueue::new();
        q.push(7, Priority::High, now);
        assert!(q.remove(7));
        assert!(!q.remove(7));
        assert!(q.pop().is_none());
    }
}
