//! Suppression of re-emitted log entries.
//!
//! Providers occasionally write the same entry into overlapping log files;
//! without this filter, aggregate costs drift upward on every rotation.

use std::collections::{HashSet, VecDeque};

use monitor_core::models::UsageRecord;

/// Upper bound on remembered `(message_id, request_id)` pairs. At the
/// bound, the oldest half (by insertion order) is evicted.
pub const MAX_TRACKED_PAIRS: usize = 100_000;

/// Insertion-ordered set of observed `(message_id, request_id)` pairs.
///
/// One filter per provider; the set lives for the whole process and is
/// never persisted.
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `record` should be kept.
    ///
    /// Records without a complete dedup key are always kept. A record whose
    /// pair was already observed is silently dropped.
    pub fn admit(&mut self, record: &UsageRecord) -> bool {
        let Some((message_id, request_id)) = record.dedup_key() else {
            return true;
        };
        let key = (message_id.to_string(), request_id.to_string());

        if self.seen.contains(&key) {
            return false;
        }

        self.seen.insert(key.clone());
        self.order.push_back(key);

        if self.order.len() > MAX_TRACKED_PAIRS {
            self.evict_oldest_half();
        }

        true
    }

    /// Number of pairs currently remembered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict_oldest_half(&mut self) {
        let evict = self.order.len() / 2;
        for _ in 0..evict {
            if let Some(key) = self.order.pop_front() {
                self.seen.remove(&key);
            }
        }
    }
}
