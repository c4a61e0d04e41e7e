//! Event identity types shared by the translation table and the muxer.

use std::fmt;

/// Numeric id of an ftrace event, as reported by the `ID:` line of the
/// event's tracefs `format` file.
pub type EventId = u32;

/// A kernel ftrace event named by its tracefs layout, `events/<group>/<name>`.
///
/// An empty group means the caller did not know the group; resolution looks
/// the event up by bare name in the translation table instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupAndName {
    pub group: String,
    pub name: String,
}

impl GroupAndName {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for GroupAndName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}

/// One entry of the translation table.
///
/// Events in the synthetic `ftrace` group (e.g. `ftrace/print`) have no
/// `enable` file and are implicitly always on in the kernel; the muxer still
/// records their ids in per-config filters so parsers know to expect them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub group: String,
    pub name: String,
    pub ftrace_event_id: EventId,
}
