//! In-memory fakes for the capability traits, shared by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::atrace::AtraceRunner;
use crate::events::EventId;
use crate::tracefs::Tracefs;

#[derive(Default)]
pub struct FakeState {
    pub events: BTreeMap<String, Vec<(String, EventId)>>,
    pub tracing_on: bool,
    pub enabled_events: BTreeSet<(String, String)>,
    pub fail_enable: BTreeSet<(String, String)>,
    pub clock: String,
    pub available_clocks: Vec<String>,
    pub buffer_writes: Vec<usize>,
    pub clock_writes: Vec<String>,
    pub disable_all_calls: usize,
    pub clear_trace_calls: usize,
}

/// [`Tracefs`] over an in-memory event tree, recording every mutation so
/// tests can assert on exactly what the kernel would have seen.
pub struct FakeTracefs {
    pub state: RefCell<FakeState>,
}

impl FakeTracefs {
    pub fn with_events(events: &[(&str, &str, EventId)]) -> Arc<Self> {
        let mut tree: BTreeMap<String, Vec<(String, EventId)>> = BTreeMap::new();
        for (group, name, id) in events {
            tree.entry(group.to_string())
                .or_default()
                .push((name.to_string(), *id));
        }
        Arc::new(Self {
            state: RefCell::new(FakeState {
                events: tree,
                clock: "boot".to_string(),
                available_clocks: vec![
                    "local".to_string(),
                    "global".to_string(),
                    "boot".to_string(),
                ],
                ..Default::default()
            }),
        })
    }

    pub fn add_event(&self, group: &str, name: &str, id: EventId) {
        self.state
            .borrow_mut()
            .events
            .entry(group.to_string())
            .or_default()
            .push((name.to_string(), id));
    }

    pub fn set_tracing_on(&self, on: bool) {
        self.state.borrow_mut().tracing_on = on;
    }

    pub fn set_clock_state(&self, current: &str, available: &[&str]) {
        let mut state = self.state.borrow_mut();
        state.clock = current.to_string();
        state.available_clocks = available.iter().map(|c| c.to_string()).collect();
    }

    pub fn fail_enable_of(&self, group: &str, name: &str) {
        self.state
            .borrow_mut()
            .fail_enable
            .insert((group.to_string(), name.to_string()));
    }

    pub fn enabled(&self) -> BTreeSet<(String, String)> {
        self.state.borrow().enabled_events.clone()
    }

    fn known(&self, group: &str, name: &str) -> Option<EventId> {
        self.state
            .borrow()
            .events
            .get(group)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }
}

impl Tracefs for FakeTracefs {
    fn is_tracing_enabled(&self) -> Result<bool> {
        Ok(self.state.borrow().tracing_on)
    }

    fn enable_tracing(&self) -> Result<()> {
        self.state.borrow_mut().tracing_on = true;
        Ok(())
    }

    fn disable_tracing(&self) -> Result<()> {
        self.state.borrow_mut().tracing_on = false;
        Ok(())
    }

    fn set_cpu_buffer_size_in_pages(&self, pages: usize) -> Result<()> {
        self.state.borrow_mut().buffer_writes.push(pages);
        Ok(())
    }

    fn disable_all_events(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.enabled_events.clear();
        state.disable_all_calls += 1;
        Ok(())
    }

    fn clear_trace(&self) -> Result<()> {
        self.state.borrow_mut().clear_trace_calls += 1;
        Ok(())
    }

    fn clock(&self) -> Result<String> {
        Ok(self.state.borrow().clock.clone())
    }

    fn available_clocks(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().available_clocks.clone())
    }

    fn set_clock(&self, clock: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.clock_writes.push(clock.to_string());
        state.clock = clock.to_string();
        Ok(())
    }

    fn enable_event(&self, group: &str, name: &str) -> Result<()> {
        if group == "ftrace" {
            // The synthetic group has no enable files.
            bail!("events/ftrace/{name}/enable: Permission denied");
        }
        if self.known(group, name).is_none() {
            bail!("events/{group}/{name}/enable: No such file or directory");
        }
        if self
            .state
            .borrow()
            .fail_enable
            .contains(&(group.to_string(), name.to_string()))
        {
            bail!("events/{group}/{name}/enable: injected failure");
        }
        self.state
            .borrow_mut()
            .enabled_events
            .insert((group.to_string(), name.to_string()));
        Ok(())
    }

    fn disable_event(&self, group: &str, name: &str) -> Result<()> {
        if self.known(group, name).is_none() {
            bail!("events/{group}/{name}/enable: No such file or directory");
        }
        self.state
            .borrow_mut()
            .enabled_events
            .remove(&(group.to_string(), name.to_string()));
        Ok(())
    }

    fn event_names_for_group(&self, path: &str) -> Result<Vec<String>> {
        let state = self.state.borrow();
        if path == "events" {
            return Ok(state.events.keys().cloned().collect());
        }
        if let Some(group) = path.strip_prefix("events/") {
            if let Some(events) = state.events.get(group) {
                return Ok(events.iter().map(|(name, _)| name.clone()).collect());
            }
        }
        bail!("{path}: No such file or directory");
    }

    fn read_event_format(&self, group: &str, name: &str) -> Result<String> {
        let Some(id) = self.known(group, name) else {
            bail!("events/{group}/{name}/format: No such file or directory");
        };
        Ok(format!(
            "name: {name}\nID: {id}\nformat:\n\
             \tfield:unsigned short common_type;\toffset:0;\tsize:2;\tsigned:0;\n"
        ))
    }
}

/// [`AtraceRunner`] that records every invocation.
#[derive(Default)]
pub struct FakeAtrace {
    old_atrace: bool,
    pub fail: Cell<bool>,
    pub calls: RefCell<Vec<Vec<String>>>,
}

impl FakeAtrace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn legacy() -> Arc<Self> {
        Arc::new(Self {
            old_atrace: true,
            ..Default::default()
        })
    }
}

impl AtraceRunner for FakeAtrace {
    fn run_atrace(&self, args: &[String]) -> bool {
        self.calls.borrow_mut().push(args.to_vec());
        !self.fail.get()
    }

    fn is_old_atrace(&self) -> bool {
        self.old_atrace
    }
}
