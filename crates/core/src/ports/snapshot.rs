use crate::domain::event::{Event, RepoId};
use anyhow::Result;

/// Snapshot store interface (whole-state persistence of the cache)
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot. Stores recover from missing or
    /// malformed data by returning what they could read.
    fn load(&self) -> Result<Snapshot>;

    /// Replace the stored snapshot
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Persisted cache content, least recently touched repository first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub repositories: Vec<SnapshotEntry>,
}

/// Events of one repository, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub repo: RepoId,
    pub events: Vec<Event>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
