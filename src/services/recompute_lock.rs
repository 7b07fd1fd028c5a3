use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::ScoringDomain;

type LockKey = (ScoringDomain, String);

/// Serializes recomputations per (domain, user).
///
/// Two triggers for the same user queue behind each other instead of interleaving
/// their writes. Different users never wait on each other.
#[derive(Clone, Default)]
pub struct RecomputeLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

/// Held for the duration of one recomputation
pub struct RecomputeGuard {
    _guard: OwnedMutexGuard<()>,
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl RecomputeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, domain: ScoringDomain, user_id: &str) -> RecomputeGuard {
        let key = (domain, user_id.to_string());
        // Clone the mutex out so no map shard stays locked across the await
        let mutex = Arc::clone(&self.locks.entry(key.clone()).or_default());
        let guard = mutex.lock_owned().await;

        RecomputeGuard {
            _guard: guard,
            key,
            locks: self.locks.clone(),
        }
    }

    /// Number of users with a recomputation running or queued
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for RecomputeGuard {
    fn drop(&mut self) {
        // The map and this guard's mutex hold two references; anyone queued holds a third
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
