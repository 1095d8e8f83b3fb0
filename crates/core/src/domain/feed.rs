//! Bringing a repository's queue up to date from a newest-first feed.
//!
//! The work happens in two steps. `collect_new_events` walks the source
//! newest-first until a stop condition fires. `merge_into` then reverses the
//! collected events and appends them oldest-first to the stored queue.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;

use super::event::{Event, EventId, RepoId};
use super::queue::{EventQueue, DEFAULT_MAX_EVENTS};
use crate::error::SourceError;
use crate::ports::EventSource;

/// Default maximum event age, in days
pub const DEFAULT_MAX_EVENT_AGE_DAYS: i64 = 7;

/// Bounds applied while walking the feed
#[derive(Debug, Clone, PartialEq)]
pub struct FetchLimits {
    pub max_events: usize,
    pub max_age: Duration,
}

impl FetchLimits {
    pub fn new(max_events: usize, max_age_days: i64) -> Self {
        Self {
            max_events,
            max_age: Duration::days(max_age_days),
        }
    }
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS, DEFAULT_MAX_EVENT_AGE_DAYS)
    }
}

/// Why the walk over the feed ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the last event already stored
    Cursor,
    /// Collected `max_events`
    Limit,
    /// Reached an event older than `max_age`; the feed is time ordered so
    /// nothing after it is considered
    Age,
    /// The source ran out of events
    Exhausted,
}

/// Events gathered from the feed, still newest-first
#[derive(Debug, Clone, PartialEq)]
pub struct Collected {
    pub events: Vec<Event>,
    pub stop: StopReason,
}

/// Stop-condition state machine fed one event at a time, newest first
#[derive(Debug)]
pub struct NewEventCollector<'a> {
    limits: &'a FetchLimits,
    cursor: Option<&'a EventId>,
    now: DateTime<Utc>,
    events: Vec<Event>,
    seen: HashSet<EventId>,
    stop: Option<StopReason>,
}

impl<'a> NewEventCollector<'a> {
    pub fn new(limits: &'a FetchLimits, cursor: Option<&'a EventId>, now: DateTime<Utc>) -> Self {
        let mut collector = Self {
            limits,
            cursor,
            now,
            events: Vec::new(),
            seen: HashSet::new(),
            stop: None,
        };
        if limits.max_events == 0 {
            collector.stop = Some(StopReason::Limit);
        }
        collector
    }

    /// Offer the next event. Returns `false` once the walk should end.
    ///
    /// Pages are offset based, so an event shifted onto the next page by a
    /// newer arrival shows up twice; repeats are skipped and not counted.
    pub fn offer(&mut self, event: Event) -> bool {
        if self.stop.is_some() {
            return false;
        }
        if self.seen.contains(&event.id) {
            debug!("Skipping repeated event {}", event.id);
            return true;
        }

        // Priority: cursor, then count, then age
        if Some(&event.id) == self.cursor {
            self.stop = Some(StopReason::Cursor);
        } else if self.events.len() >= self.limits.max_events {
            self.stop = Some(StopReason::Limit);
        } else if event.is_older_than(self.limits.max_age, self.now) {
            self.stop = Some(StopReason::Age);
        } else {
            self.seen.insert(event.id.clone());
            self.events.push(event);
            if self.events.len() >= self.limits.max_events {
                self.stop = Some(StopReason::Limit);
            }
        }

        self.stop.is_none()
    }

    pub fn is_done(&self) -> bool {
        self.stop.is_some()
    }

    pub fn finish(self) -> Collected {
        Collected {
            events: self.events,
            stop: self.stop.unwrap_or(StopReason::Exhausted),
        }
    }
}

/// Walk the source page by page, newest-first, collecting events newer
/// than `cursor`. A failing page fails the whole walk so that a partial
/// prefix is never merged with a gap behind it.
pub fn collect_new_events(
    source: &dyn EventSource,
    repo: &RepoId,
    limits: &FetchLimits,
    cursor: Option<&EventId>,
    now: DateTime<Utc>,
) -> Result<Collected, SourceError> {
    let mut collector = NewEventCollector::new(limits, cursor, now);
    let mut next_page = Some(1);

    while let Some(page_number) = next_page {
        if collector.is_done() {
            break;
        }

        let page = source.fetch_page(repo, page_number)?;
        debug!(
            "Fetched page {} for {} with {} events",
            page_number,
            repo,
            page.events.len()
        );

        for event in page.events {
            if !collector.offer(event) {
                break;
            }
        }
        next_page = page.next_page;
    }

    Ok(collector.finish())
}

/// Fold newest-first events into the stored queue.
///
/// The events are reversed to ascending order and appended; ids already in
/// the queue or earlier in the batch are skipped. With nothing new the existing queue is returned
/// as is, so a repository that never had data stays absent.
pub fn merge_into(
    existing: Option<EventQueue>,
    newest_first: Vec<Event>,
    capacity: usize,
) -> Option<EventQueue> {
    if newest_first.is_empty() {
        return existing;
    }

    let mut queue = existing.unwrap_or_else(|| EventQueue::new(capacity));
    let mut seen: HashSet<EventId> = queue.iter().map(|event| event.id.clone()).collect();
    let ascending: Vec<Event> = newest_first
        .into_iter()
        .rev()
        .filter(|event| seen.insert(event.id.clone()))
        .collect();
    queue.append_many(ascending);
    Some(queue)
}
