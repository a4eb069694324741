//! Single in-flight request tracking.
//!
//! A stage may have at most one request outstanding. Starting a second one
//! for the same key while the first is pending is refused, which is what a
//! disabled trigger button does in a graphical client.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Set of keys with an outstanding request
#[derive(Debug)]
pub struct InFlight<K> {
    pending: Arc<Mutex<HashSet<K>>>,
}

impl<K> Default for InFlight<K> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl<K> Clone for InFlight<K> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K: Eq + Hash + Copy> InFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as pending. Returns `None` if it already is.
    pub fn try_begin(&self, key: K) -> Option<PendingGuard<K>> {
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);

        inserted.then(|| PendingGuard {
            key,
            pending: Arc::clone(&self.pending),
        })
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

/// Clears the pending mark when dropped, whether the request succeeded,
/// failed or was abandoned
#[derive(Debug)]
pub struct PendingGuard<K: Eq + Hash> {
    key: K,
    pending: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash> Drop for PendingGuard<K> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::Stage;

    #[test]
    fn test_second_begin_is_refused_until_drop() {
        let in_flight = InFlight::new();

        let guard = in_flight.try_begin(Stage::Training);
        assert!(guard.is_some());
        assert!(in_flight.is_pending(Stage::Training));
        assert!(in_flight.try_begin(Stage::Training).is_none());

        // Other stages are independent
        assert!(in_flight.try_begin(Stage::Report).is_some());

        drop(guard);
        assert!(!in_flight.is_pending(Stage::Training));
        assert!(in_flight.try_begin(Stage::Training).is_some());
    }
}
