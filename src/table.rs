//! The event translation table: name, group and id lookups for every
//! tracepoint the kernel advertises.
//!
//! The muxer stores numeric ids in its filters, so event identity has to be
//! resolvable in both directions. [`EventTable`] builds the index by walking
//! `events/<group>/<name>` once at startup and parsing each event's id out
//! of its `format` file; events a client names that the scan did not cover
//! are admitted lazily through [`TranslationTable::get_or_create_event`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use regex::Regex;

use crate::compact_sched::CompactSchedFormat;
use crate::events::{Event, EventId, GroupAndName};
use crate::tracefs::Tracefs;

/// Matches the `ID: <n>` line of a tracefs event format file.
static FORMAT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ID:\s*(\d+)").expect("Invalid format-id regex"));

/// Lookup surface the muxer depends on.
pub trait TranslationTable {
    /// Find an event by bare name. Names are not unique across groups; any
    /// match may be returned.
    fn event_by_name(&self, name: &str) -> Option<&Event>;

    fn event_by_id(&self, id: EventId) -> Option<&Event>;

    /// Every known event in `group`, or None for an unknown group.
    fn events_by_group(&self, group: &str) -> Option<&[Event]>;

    /// Find an event, admitting user-supplied `group/name` pairs the table
    /// has not seen yet when the kernel can vouch for them.
    fn get_or_create_event(&mut self, event: &GroupAndName) -> Option<&Event>;

    fn compact_sched_format(&self) -> CompactSchedFormat;
}

/// [`TranslationTable`] built from a live tracefs.
pub struct EventTable {
    tracefs: Arc<dyn Tracefs>,
    groups: BTreeMap<String, Vec<Event>>,
    // name/id indices point at (group, position) so group storage stays
    // append-only and references remain valid.
    by_name: HashMap<String, (String, usize)>,
    by_id: HashMap<EventId, (String, usize)>,
    compact_sched: CompactSchedFormat,
}

impl EventTable {
    /// Scan every `events/<group>/<name>/format` the kernel advertises and
    /// index the parsed ids. Entries without a readable id (the odd control
    /// file, permission-restricted events) are skipped.
    pub fn read(tracefs: Arc<dyn Tracefs>) -> Result<Self> {
        let mut table = Self {
            tracefs: tracefs.clone(),
            groups: BTreeMap::new(),
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            compact_sched: CompactSchedFormat::default(),
        };

        let groups = tracefs
            .event_names_for_group("events")
            .context("enumerating event groups")?;
        for group in groups {
            let names = match tracefs.event_names_for_group(&format!("events/{group}")) {
                Ok(names) => names,
                Err(err) => {
                    tracing::debug!("skipping event group {group}: {err}");
                    continue;
                }
            };
            for name in names {
                let Ok(format) = tracefs.read_event_format(&group, &name) else {
                    continue;
                };
                let Some(id) = parse_event_id(&format) else {
                    continue;
                };
                table.insert(Event {
                    group: group.clone(),
                    name,
                    ftrace_event_id: id,
                });
            }
        }

        // The compact encoder is only usable when both sched events it
        // packs are present.
        table.compact_sched = CompactSchedFormat {
            valid: table.event_by_name("sched_switch").is_some()
                && table.event_by_name("sched_waking").is_some(),
        };
        Ok(table)
    }

    fn insert(&mut self, event: Event) {
        let group = event.group.clone();
        let entry = self.groups.entry(group.clone()).or_default();
        let index = entry.len();
        // First insertion wins for ambiguous bare names.
        self.by_name
            .entry(event.name.clone())
            .or_insert_with(|| (group.clone(), index));
        self.by_id
            .entry(event.ftrace_event_id)
            .or_insert((group, index));
        entry.push(event);
    }

    fn position(&self, group: &str, name: &str) -> Option<usize> {
        self.groups
            .get(group)?
            .iter()
            .position(|event| event.name == name)
    }
}

impl TranslationTable for EventTable {
    fn event_by_name(&self, name: &str) -> Option<&Event> {
        let (group, index) = self.by_name.get(name)?;
        self.groups.get(group).map(|events| &events[*index])
    }

    fn event_by_id(&self, id: EventId) -> Option<&Event> {
        let (group, index) = self.by_id.get(&id)?;
        self.groups.get(group).map(|events| &events[*index])
    }

    fn events_by_group(&self, group: &str) -> Option<&[Event]> {
        self.groups.get(group).map(|events| events.as_slice())
    }

    fn get_or_create_event(&mut self, event: &GroupAndName) -> Option<&Event> {
        if event.group.is_empty() {
            return None;
        }
        if let Some(index) = self.position(&event.group, &event.name) {
            return self.groups.get(&event.group).map(|events| &events[index]);
        }
        // Not indexed by the scan; trust the caller's naming if the kernel
        // can produce a format file for it.
        let format = self
            .tracefs
            .read_event_format(&event.group, &event.name)
            .ok()?;
        let id = parse_event_id(&format)?;
        self.insert(Event {
            group: event.group.clone(),
            name: event.name.clone(),
            ftrace_event_id: id,
        });
        let index = self.position(&event.group, &event.name)?;
        self.groups.get(&event.group).map(|events| &events[index])
    }

    fn compact_sched_format(&self) -> CompactSchedFormat {
        self.compact_sched
    }
}

fn parse_event_id(format: &str) -> Option<EventId> {
    let caps = FORMAT_ID_RE.captures(format)?;
    caps[1].parse().ok()
}
