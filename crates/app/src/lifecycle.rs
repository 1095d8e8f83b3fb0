//! Cache lifecycle: load at startup, flush on every normal shutdown path.
//!
//! The cache is only written when the process exits normally (including a
//! Ctrl-C or SIGTERM triggered shutdown). A crash or SIGKILL loses updates
//! made since startup.

use anyhow::Result;
use gitpulse_core::domain::RepositoryCache;
use gitpulse_core::ports::SnapshotStore;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::services::stats_service::SharedCache;

/// Build the cache from the stored snapshot. Any failure starts empty.
pub fn load_cache(store: &dyn SnapshotStore, max_repositories: usize, max_events: usize) -> RepositoryCache {
    match store.load() {
        Ok(snapshot) => {
            let cache = RepositoryCache::from_snapshot(snapshot, max_repositories, max_events);
            info!("Loaded {} repositories from snapshot", cache.len());
            cache
        }
        Err(e) => {
            warn!("Failed to load snapshot, starting with an empty cache: {:#}", e);
            RepositoryCache::new(max_repositories)
        }
    }
}

/// Scoped guard that writes the cache to the snapshot store when the
/// service shuts down. `finish` reports the save result; dropping the
/// guard without calling it still saves and logs any failure.
pub struct PersistOnShutdown {
    cache: SharedCache,
    store: Arc<dyn SnapshotStore>,
    flushed: bool,
}

impl PersistOnShutdown {
    pub fn new(cache: SharedCache, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            cache,
            store,
            flushed: false,
        }
    }

    /// Save the current cache content
    pub fn flush(&mut self) -> Result<()> {
        let snapshot = self.cache.lock().to_snapshot();
        let repositories = snapshot.repositories.len();
        self.store.save(&snapshot)?;
        self.flushed = true;
        info!("Saved {} repositories to snapshot", repositories);
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.flush()
    }
}

impl Drop for PersistOnShutdown {
    fn drop(&mut self) {
        if self.flushed {
            return;
        }
        if let Err(e) = self.flush() {
            error!("Failed to save snapshot on shutdown: {:#}", e);
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error waiting for exit signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Error installing SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::FileSnapshotStore;
    use chrono::{TimeZone, Utc};
    use gitpulse_core::domain::{Event, EventQueue, RepoId};
    use gitpulse_core::ports::Snapshot;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn load(&self) -> Result<Snapshot> {
            anyhow::bail!("disk on fire")
        }

        fn save(&self, _snapshot: &Snapshot) -> Result<()> {
            anyhow::bail!("disk on fire")
        }
    }

    fn populated_cache() -> SharedCache {
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        let mut cache = RepositoryCache::new(5);
        cache.put_or_update(
            RepoId("octo/widgets".to_string()),
            EventQueue::from_events(10, vec![Event::new("1", "PushEvent", at)]),
        );
        Arc::new(Mutex::new(cache))
    }

    #[test]
    fn test_load_cache_recovers_from_store_errors() {
        let cache = load_cache(&BrokenStore, 3, 10);
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), 3);
    }

    #[test]
    fn test_finish_writes_snapshot() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = Arc::new(FileSnapshotStore::with_path(temp_dir.path().join("snapshot.json")));

        PersistOnShutdown::new(populated_cache(), store.clone()).finish()?;

        let reloaded = load_cache(store.as_ref(), 5, 10);
        assert!(reloaded.contains(&RepoId("octo/widgets".to_string())));
        Ok(())
    }

    #[test]
    fn test_drop_flushes_when_not_finished() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("snapshot.json");
        let store = Arc::new(FileSnapshotStore::with_path(&path));

        {
            let _guard = PersistOnShutdown::new(populated_cache(), store);
        }

        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_failed_save_is_reported() {
        let guard = PersistOnShutdown::new(populated_cache(), Arc::new(BrokenStore));
        assert!(guard.finish().is_err());
    }
}
