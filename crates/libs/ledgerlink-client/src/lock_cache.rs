//! Cluster-wide resource lock visibility.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use ledgerlink_wire::LockState;

#[derive(Debug)]
struct LockRecord {
    locked: AtomicBool,
}

/// A live view onto one lock's state. Handles obtained before an update
/// observe the update; the cache flips the shared record in place rather
/// than replacing it.
#[derive(Debug, Clone)]
pub struct LockHandle {
    record: Arc<LockRecord>,
}

impl LockHandle {
    pub fn locked(&self) -> bool {
        self.record.locked.load(Ordering::SeqCst)
    }
}

/// Concurrent map of remote lock states, keyed by lock id.
///
/// Shared between the inbound dispatch path and any local caller querying
/// lock status; callers need no external locking.
#[derive(Debug, Default)]
pub struct LockStateCache {
    records: RwLock<HashMap<String, Arc<LockRecord>>>,
}

impl LockStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record, or flip the existing record's flag in place.
    pub fn upsert(&self, state: &LockState) {
        {
            let records = self.records.read().unwrap_or_else(|e| e.into_inner());
            if let Some(record) = records.get(&state.lock_id) {
                record.locked.store(state.locked, Ordering::SeqCst);
                return;
            }
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        // a concurrent upsert may have raced the insert; update either way
        records
            .entry(state.lock_id.clone())
            .or_insert_with(|| Arc::new(LockRecord { locked: AtomicBool::new(state.locked) }))
            .locked
            .store(state.locked, Ordering::SeqCst);
    }

    pub fn query(&self, lock_id: &str) -> Option<bool> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(lock_id).map(|record| record.locked.load(Ordering::SeqCst))
    }

    pub fn handle(&self, lock_id: &str) -> Option<LockHandle> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(lock_id).map(|record| LockHandle { record: Arc::clone(record) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_reflects_latest_upsert() {
        let cache = LockStateCache::new();
        assert_eq!(cache.query("L1"), None);

        cache.upsert(&LockState::new("L1", true));
        assert_eq!(cache.query("L1"), Some(true));

        cache.upsert(&LockState::new("L1", false));
        assert_eq!(cache.query("L1"), Some(false));
    }

    #[test]
    fn earlier_handle_observes_later_update() {
        let cache = LockStateCache::new();
        cache.upsert(&LockState::new("L1", true));

        let handle = cache.handle("L1").expect("handle");
        assert!(handle.locked());

        cache.upsert(&LockState::new("L1", false));
        assert!(!handle.locked());
    }

    #[test]
    fn unrelated_ids_do_not_interfere() {
        let cache = LockStateCache::new();
        cache.upsert(&LockState::new("L1", true));
        cache.upsert(&LockState::new("L2", false));

        assert_eq!(cache.query("L1"), Some(true));
        assert_eq!(cache.query("L2"), Some(false));
    }

    #[test]
    fn concurrent_upserts_to_distinct_ids() {
        let cache = Arc::new(LockStateCache::new());

        let threads: Vec<_> = (0..8)
            .map(|n| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let id = format!("L{n}");
                    for round in 0..100 {
                        cache.upsert(&LockState::new(&id, round % 2 == 0));
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().expect("join");
        }

        for n in 0..8 {
            // 100 rounds ends on round = 99, odd, so unlocked
            assert_eq!(cache.query(&format!("L{n}")), Some(false));
        }
    }
}
