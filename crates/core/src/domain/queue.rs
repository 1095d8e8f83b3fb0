use std::collections::{BTreeSet, VecDeque};

use super::event::{Event, EventId};

/// Default number of events kept per repository
pub const DEFAULT_MAX_EVENTS: usize = 500;

/// Fixed-capacity, oldest-first sequence of events for one repository.
///
/// Appending past capacity drops events from the front, so the queue always
/// holds the most recent `capacity` events of everything ever appended.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQueue {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_EVENTS)),
            capacity,
        }
    }

    /// Build a queue from events already in ascending order
    pub fn from_events<I>(capacity: usize, events: I) -> Self
    where
        I: IntoIterator<Item = Event>,
    {
        let mut queue = Self::new(capacity);
        queue.append_many(events);
        queue
    }

    /// Append events to the tail in the given order, then drop from the
    /// head until the queue fits its capacity again.
    pub fn append_many<I>(&mut self, new_events: I)
    where
        I: IntoIterator<Item = Event>,
    {
        self.events.extend(new_events);
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
        }
    }

    /// Id of the most recently appended event, used as the merge cursor
    pub fn tail_id(&self) -> Option<&EventId> {
        self.events.back().map(|event| &event.id)
    }

    /// Distinct event types present, ignoring untyped events
    pub fn types(&self) -> BTreeSet<String> {
        self.events
            .iter()
            .filter_map(|event| event.kind.clone())
            .collect()
    }

    /// All events of the given type, in queue order
    pub fn events_of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .filter(move |event| event.kind.as_deref() == Some(kind))
    }

    pub fn contains_id(&self, id: &EventId) -> bool {
        self.events.iter().any(|event| &event.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}
