//! Sets of enabled ftrace event ids.

use std::collections::BTreeSet;

use crate::events::EventId;

/// The set of event ids a data source (or the kernel as a whole) has
/// enabled. Kept sorted so diffs against the kernel state come out in a
/// deterministic order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventFilter {
    enabled: BTreeSet<EventId>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_enabled_event(&mut self, id: EventId) {
        self.enabled.insert(id);
    }

    pub fn disable_event(&mut self, id: EventId) {
        self.enabled.remove(&id);
    }

    pub fn is_event_enabled(&self, id: EventId) -> bool {
        self.enabled.contains(&id)
    }

    /// Union the other filter's events into this one.
    pub fn enable_events_from(&mut self, other: &EventFilter) {
        self.enabled.extend(other.enabled.iter().copied());
    }

    /// Snapshot of the enabled ids, sorted ascending.
    pub fn enabled_events(&self) -> Vec<EventId> {
        self.enabled.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}
