use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-candidate mutual exclusion. Survey steps, status changes and column moves
/// for one candidate run one at a time; different candidates never contend.
#[derive(Clone, Default)]
pub struct CandidateLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CandidateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, candidate_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(candidate_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Locks several candidates in id order so overlapping bulk operations cannot deadlock.
    pub async fn lock_many(&self, candidate_ids: &[Uuid]) -> Vec<OwnedMutexGuard<()>> {
        let mut ids = candidate_ids.to_vec();
        ids.sort();
        ids.dedup();
        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            guards.push(self.lock(id).await);
        }
        guards
    }

    pub fn forget(&self, candidate_id: Uuid) {
        self.locks.remove(&candidate_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_candidate_is_serialized() {
        let locks = CandidateLocks::new();
        let id = Uuid::new_v4();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_candidates_do_not_block_each_other() {
        let locks = CandidateLocks::new();
        let _a = locks.lock(Uuid::new_v4()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(Uuid::new_v4())).await;
        assert!(b.is_ok());
    }
}
