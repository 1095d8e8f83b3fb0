use std::collections::VecDeque;

use tracing::{debug, warn};

use super::event::RepoId;
use super::queue::EventQueue;
use crate::ports::{Snapshot, SnapshotEntry};

/// Default number of repositories kept in memory
pub const DEFAULT_MAX_REPOSITORIES: usize = 5;

/// Fixed-capacity map from repository to its event queue.
///
/// Entries are ordered by recency of touch: `put_or_update` moves a key to
/// the back, plain reads leave the order alone. Inserting a new key at
/// capacity evicts the front (least recently touched) entry.
#[derive(Debug, Clone)]
pub struct RepositoryCache {
    entries: VecDeque<(RepoId, EventQueue)>,
    capacity: usize,
}

impl RepositoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Read-only lookup; does not count as a touch
    pub fn get(&self, key: &RepoId) -> Option<&EventQueue> {
        self.entries
            .iter()
            .find(|(id, _)| id == key)
            .map(|(_, queue)| queue)
    }

    /// Insert or replace the queue for `key` and mark it most recently
    /// touched. Returns the evicted repository, if any.
    pub fn put_or_update(&mut self, key: RepoId, queue: EventQueue) -> Option<RepoId> {
        if let Some(position) = self.entries.iter().position(|(id, _)| *id == key) {
            self.entries.remove(position);
            self.entries.push_back((key, queue));
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|(id, _)| id)
        } else {
            None
        };
        if let Some(evicted) = &evicted {
            debug!("Evicting least recently touched repository {}", evicted);
        }

        self.entries.push_back((key, queue));
        evicted
    }

    pub fn contains(&self, key: &RepoId) -> bool {
        self.get(key).is_some()
    }

    /// Repositories from least to most recently touched
    pub fn keys(&self) -> impl Iterator<Item = &RepoId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RepoId, &EventQueue)> {
        self.entries.iter().map(|(id, queue)| (id, queue))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rebuild a cache from a persisted snapshot.
    ///
    /// Entries are replayed in order, so an oversized snapshot keeps its
    /// most recent repositories, and over-long event lists keep their
    /// newest events.
    pub fn from_snapshot(snapshot: Snapshot, capacity: usize, max_events: usize) -> Self {
        let mut cache = Self::new(capacity);
        for entry in snapshot.repositories {
            if entry.events.len() > max_events {
                warn!(
                    "Snapshot holds {} events for {}, keeping the newest {}",
                    entry.events.len(),
                    entry.repo,
                    max_events
                );
            }
            let queue = EventQueue::from_events(max_events, entry.events);
            cache.put_or_update(entry.repo, queue);
        }
        cache
    }

    /// Whole-state snapshot in recency order
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            repositories: self
                .iter()
                .map(|(repo, queue)| SnapshotEntry {
                    repo: repo.clone(),
                    events: queue.iter().cloned().collect(),
                })
                .collect(),
        }
    }
}

impl Default for RepositoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REPOSITORIES)
    }
}
