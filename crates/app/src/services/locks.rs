use gitpulse_core::domain::RepoId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per repository, created on demand.
///
/// Entries are removed when the last holder or waiter lets go, so the
/// table only ever holds repositories with requests in flight.
#[derive(Debug, Default)]
pub struct RepoLocks {
    locks: Mutex<HashMap<RepoId, Arc<AsyncMutex<()>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `repo`
    pub async fn acquire(&self, repo: &RepoId) -> RepoLockGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.entry(repo.clone()).or_default().clone()
        };
        let guard = lock.clone().lock_owned().await;

        RepoLockGuard {
            owner: self,
            repo: repo.clone(),
            lock,
            guard: Some(guard),
        }
    }

    /// Number of repositories with requests in flight
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held for the duration of one repository's fetch-merge-compute
pub struct RepoLockGuard<'a> {
    owner: &'a RepoLocks,
    repo: RepoId,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RepoLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self.owner.locks.lock();
        // Only the table and this guard still refer to the lock
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.repo);
        }
    }
}
