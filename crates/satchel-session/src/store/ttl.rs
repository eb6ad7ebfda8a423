//! Per-record deadlines for store-side expiration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks when each stored record stops being valid.
///
/// Records without a deadline never expire on time; they are bounded only
/// by the store's capacity.
#[derive(Debug, Default)]
pub struct DeadlineTracker {
    deadlines: HashMap<String, Instant>,
}

impl DeadlineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the deadline for a record, counting from now.
    ///
    /// A ttl too large to represent leaves the record without a deadline.
    pub fn touch(&mut self, id: &str, ttl: Option<Duration>) {
        match ttl.and_then(|ttl| Instant::now().checked_add(ttl)) {
            Some(deadline) => {
                self.deadlines.insert(id.to_string(), deadline);
            }
            None => {
                self.deadlines.remove(id);
            }
        }
    }

    /// Check if a record has passed its deadline.
    pub fn is_expired(&self, id: &str) -> bool {
        self.deadlines
            .get(id)
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }

    /// Stop tracking a record.
    pub fn remove(&mut self, id: &str) {
        self.deadlines.remove(id);
    }

    /// Remove all expired entries and return their IDs.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.deadlines.remove(id);
        }
        expired
    }

    /// Number of records with a deadline.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
