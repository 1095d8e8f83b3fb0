use crate::domain::event::{Event, RepoId};
use crate::error::SourceError;

/// One page of a repository's activity feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPage {
    /// Events newest-first
    pub events: Vec<Event>,
    /// Page to request next, `None` at the end of the feed
    pub next_page: Option<u32>,
}

/// Port for the external activity feed
pub trait EventSource: Send + Sync {
    /// Fetch a page of events, newest-first. Pages start at 1.
    /// This is blocking - caller should run in spawn_blocking
    fn fetch_page(&self, repo: &RepoId, page: u32) -> Result<EventPage, SourceError>;
}
