use gitpulse_core::domain::{
    collect_new_events, merge_into, stats, Event, EventId, EventQueue, FetchLimits, RepoId,
    RepositoryCache, Statistics,
};
use gitpulse_core::error::SourceError;
use gitpulse_core::ports::{Clock, EventSource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::locks::RepoLocks;

/// The process-wide repository cache, shared by handle
pub type SharedCache = Arc<Mutex<RepositoryCache>>;

/// Answers statistics queries, bringing the cached events up to date first.
///
/// Requests for the same repository are serialized by a per-repository
/// lock held across fetch, merge and compute. Different repositories
/// proceed in parallel and only contend on the short cache lock.
pub struct StatsService {
    cache: SharedCache,
    source: Arc<dyn EventSource>,
    clock: Arc<dyn Clock>,
    limits: FetchLimits,
    fetch_timeout: Duration,
    locks: RepoLocks,
}

impl StatsService {
    pub fn new(
        cache: SharedCache,
        source: Arc<dyn EventSource>,
        clock: Arc<dyn Clock>,
        limits: FetchLimits,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            clock,
            limits,
            fetch_timeout,
            locks: RepoLocks::new(),
        }
    }

    /// Average gap per event type for `repo`, after pulling in new events.
    /// A repository without any data yields an empty map.
    pub async fn statistics(&self, repo: &RepoId) -> Statistics {
        match self.refresh(repo).await {
            Some(queue) => stats::compute(&queue),
            None => Statistics::new(),
        }
    }

    /// Merge newer events from the source into the cached queue and return
    /// the queue to compute on. Source failures leave the cache untouched.
    pub async fn refresh(&self, repo: &RepoId) -> Option<EventQueue> {
        let _guard = self.locks.acquire(repo).await;

        let existing = self.cache.lock().get(repo).cloned();
        let cursor = existing.as_ref().and_then(|queue| queue.tail_id().cloned());

        let new_events = self.fetch_new_events(repo, cursor).await;
        if new_events.is_empty() {
            return existing;
        }

        let count = new_events.len();
        let merged = merge_into(existing, new_events, self.limits.max_events)?;
        let evicted = self.cache.lock().put_or_update(repo.clone(), merged.clone());

        info!("Merged {} new events into {} ({} cached)", count, repo, merged.len());
        if let Some(evicted) = evicted {
            info!("Cache full, evicted {}", evicted);
        }

        Some(merged)
    }

    /// Run the blocking source walk off the async runtime. Every failure
    /// mode degrades to "no new events".
    async fn fetch_new_events(&self, repo: &RepoId, cursor: Option<EventId>) -> Vec<Event> {
        let source = self.source.clone();
        let limits = self.limits.clone();
        let now = self.clock.now();
        let repo_for_task = repo.clone();

        let task = tokio::task::spawn_blocking(move || {
            collect_new_events(source.as_ref(), &repo_for_task, &limits, cursor.as_ref(), now)
        });

        match tokio::time::timeout(self.fetch_timeout, task).await {
            Ok(Ok(Ok(collected))) => {
                debug!(
                    "Collected {} events for {} (stopped: {:?})",
                    collected.events.len(),
                    repo,
                    collected.stop
                );
                collected.events
            }
            Ok(Ok(Err(SourceError::NotFound))) => {
                info!("Repository {} not found at the event source", repo);
                Vec::new()
            }
            Ok(Ok(Err(e))) => {
                warn!("Fetching events for {} failed, serving cached data: {}", repo, e);
                Vec::new()
            }
            Ok(Err(e)) => {
                error!("Fetch task for {} failed: {}", repo, e);
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Fetching events for {} timed out after {:?}, serving cached data",
                    repo, self.fetch_timeout
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use gitpulse_core::ports::{EventPage, FixedClock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn event(id: u32, seconds_ago: i64) -> Event {
        Event::new(id.to_string(), "PushEvent", now() - chrono::Duration::seconds(seconds_ago))
    }

    /// Serves a fixed newest-first feed and counts page requests
    struct StaticSource {
        events: Vec<Event>,
        calls: AtomicUsize,
    }

    impl EventSource for StaticSource {
        fn fetch_page(&self, _repo: &RepoId, _page: u32) -> Result<EventPage, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EventPage {
                events: self.events.clone(),
                next_page: None,
            })
        }
    }

    struct DownSource;

    impl EventSource for DownSource {
        fn fetch_page(&self, _repo: &RepoId, _page: u32) -> Result<EventPage, SourceError> {
            Err(SourceError::RateLimited)
        }
    }

    fn service(cache: SharedCache, source: Arc<dyn EventSource>) -> StatsService {
        StatsService::new(
            cache,
            source,
            Arc::new(FixedClock(now())),
            FetchLimits::new(10, 7),
            Duration::from_secs(5),
        )
    }

    fn repo() -> RepoId {
        RepoId("octo/widgets".to_string())
    }

    #[tokio::test]
    async fn test_first_query_populates_cache() {
        let cache: SharedCache = Arc::new(Mutex::new(RepositoryCache::new(5)));
        let source = Arc::new(StaticSource {
            events: vec![event(3, 0), event(2, 20), event(1, 30)],
            calls: AtomicUsize::new(0),
        });

        let stats = service(cache.clone(), source).statistics(&repo()).await;
        assert_eq!(stats["PushEvent"], "0:00:15");

        let cache = cache.lock();
        let ids: Vec<_> = cache.get(&repo()).unwrap().iter().map(|e| e.id.0.clone()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_repeat_query_is_idempotent() {
        let cache: SharedCache = Arc::new(Mutex::new(RepositoryCache::new(5)));
        let source = Arc::new(StaticSource {
            events: vec![event(3, 0), event(2, 20), event(1, 30)],
            calls: AtomicUsize::new(0),
        });
        let service = service(cache.clone(), source.clone());

        let first = service.statistics(&repo()).await;
        let second = service.statistics(&repo()).await;

        assert_eq!(first, second);
        assert_eq!(cache.lock().get(&repo()).unwrap().len(), 3);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_source_without_cache_is_empty() {
        let cache: SharedCache = Arc::new(Mutex::new(RepositoryCache::new(5)));
        let stats = service(cache.clone(), Arc::new(DownSource)).statistics(&repo()).await;

        assert!(stats.is_empty());
        assert!(cache.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failing_source_serves_cached_data_without_touch() {
        let mut seeded = RepositoryCache::new(2);
        seeded.put_or_update(repo(), EventQueue::from_events(10, vec![event(1, 60), event(2, 0)]));
        seeded.put_or_update(RepoId("octo/other".to_string()), EventQueue::new(10));
        let cache: SharedCache = Arc::new(Mutex::new(seeded));

        let stats = service(cache.clone(), Arc::new(DownSource)).statistics(&repo()).await;
        assert_eq!(stats["PushEvent"], "0:01:00");

        // No new events means no touch: octo/widgets is still least recent
        let keys: Vec<_> = cache.lock().keys().map(|k| k.0.clone()).collect();
        assert_eq!(keys, vec!["octo/widgets", "octo/other"]);
    }

    #[tokio::test]
    async fn test_lock_table_empty_after_queries() {
        let cache: SharedCache = Arc::new(Mutex::new(RepositoryCache::new(5)));
        let service = service(cache, Arc::new(DownSource));
        service.statistics(&repo()).await;
        assert!(service.locks.is_empty());
    }
}
