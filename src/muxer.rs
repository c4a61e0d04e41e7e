//! Reconciles concurrent tracing configurations onto the kernel's single,
//! globally shared ftrace instance.
//!
//! Clients register an [`FtraceConfig`] with [`FtraceConfigMuxer::setup_config`],
//! flip it live with [`FtraceConfigMuxer::activate_config`] and drop it with
//! [`FtraceConfigMuxer::remove_config`]. The muxer owns the union of
//! everything the kernel has actually been told to enable; on every remove
//! it recomputes that union from the surviving configs and diffs it against
//! the kernel rather than keeping per-event refcounts.
//!
//! All operations run synchronously on the caller's thread; `&mut self` on
//! every mutator is the serialization mechanism. External writes (tracefs,
//! forking atrace) can block for hundreds of milliseconds, which is also why
//! setup and activation are split: the expensive part happens before the
//! "go" signal.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::atrace::{self, AtraceRunner};
use crate::categories::{self, VendorEvents};
use crate::compact_sched::{create_compact_sched_config, CompactSchedConfig};
use crate::config::{requires_atrace, FtraceConfig};
use crate::event_filter::EventFilter;
use crate::events::GroupAndName;
use crate::table::TranslationTable;
use crate::tracefs::{page_size_kb, Tracefs};

const DEFAULT_PER_CPU_BUFFER_SIZE_KB: usize = 2 * 1024; // 2mb
const MAX_PER_CPU_BUFFER_SIZE_KB: usize = 64 * 1024; // 64mb

/// trace_clock candidates in preference order.
const CLOCKS: &[&str] = &["boot", "global", "local"];

/// Handle to a configuration registered with the muxer. Ids are allocated
/// monotonically over the muxer's lifetime and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FtraceConfigId(u64);

impl fmt::Display for FtraceConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The clock the kernel stamps events with, reported downstream so readers
/// can translate timestamps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FtraceClock {
    /// `boot` is the expected default on modern kernels; downstream omits it
    /// rather than naming it.
    #[default]
    Unspecified,
    Global,
    Local,
    Unknown,
}

/// Immutable record of one registered data source, built by setup and held
/// until removal. The event filter holds what is actually live for this
/// config: requested events whose kernel enable failed are absent.
pub struct FtraceDataSourceConfig {
    pub event_filter: EventFilter,
    pub compact_sched: CompactSchedConfig,
    pub atrace_apps: Vec<String>,
    pub atrace_categories: Vec<String>,
    pub symbolize_ksyms: bool,
}

/// What the muxer believes the kernel and atrace are currently doing.
///
/// `ftrace_events` mirrors the kernel exactly: an id is present iff the
/// enable write for it succeeded and no disable has succeeded since. The
/// atrace sets likewise hold the last union atrace accepted, not the last
/// union requested.
#[derive(Default)]
struct FtraceState {
    ftrace_events: EventFilter,
    atrace_apps: BTreeSet<String>,
    atrace_categories: BTreeSet<String>,
    atrace_on: bool,
    cpu_buffer_size_pages: usize,
    ftrace_clock: FtraceClock,
}

pub struct FtraceConfigMuxer {
    ftrace: Arc<dyn Tracefs>,
    table: Box<dyn TranslationTable>,
    atrace: Arc<dyn AtraceRunner>,
    vendor_events: VendorEvents,
    current_state: FtraceState,
    ds_configs: BTreeMap<FtraceConfigId, FtraceDataSourceConfig>,
    active_configs: BTreeSet<FtraceConfigId>,
    last_id: u64,
}

/// Translate a requested per-CPU buffer size to ring-buffer pages.
///
/// Post-conditions: the result is at least one page, a request of 0 picks
/// the default, and oversized requests are capped (and logged).
pub fn compute_cpu_buffer_size_in_pages(requested_kb: usize) -> usize {
    let mut kb = if requested_kb == 0 {
        DEFAULT_PER_CPU_BUFFER_SIZE_KB
    } else {
        requested_kb
    };
    if kb > MAX_PER_CPU_BUFFER_SIZE_KB {
        tracing::error!(
            "requested ftrace buffer size ({kb} KB) is too big, \
             capping to {MAX_PER_CPU_BUFFER_SIZE_KB} KB"
        );
        kb = MAX_PER_CPU_BUFFER_SIZE_KB;
    }
    let pages = kb / page_size_kb();
    if pages == 0 {
        1
    } else {
        pages
    }
}

/// Split `group/name` on the first slash; a bare name gets an empty group.
fn split_specifier(specifier: &str) -> (&str, &str) {
    match specifier.split_once('/') {
        Some((group, name)) => (group, name),
        None => ("", specifier),
    }
}

impl FtraceConfigMuxer {
    pub fn new(
        ftrace: Arc<dyn Tracefs>,
        table: Box<dyn TranslationTable>,
        atrace: Arc<dyn AtraceRunner>,
        vendor_events: VendorEvents,
    ) -> Self {
        Self {
            ftrace,
            table,
            atrace,
            vendor_events,
            current_state: FtraceState::default(),
            ds_configs: BTreeMap::new(),
            active_configs: BTreeSet::new(),
            last_id: 0,
        }
    }

    /// Register a configuration without starting the trace. Returns None if
    /// ftrace turns out to be owned by somebody else, or on a concurrent
    /// atrace session with a legacy atrace; per-event failures only shrink
    /// the resulting filter.
    pub fn setup_config(&mut self, request: &FtraceConfig) -> Option<FtraceConfigId> {
        let is_ftrace_enabled = self.ftrace.is_tracing_enabled().unwrap_or(false);
        if self.ds_configs.is_empty() {
            debug_assert!(self.active_configs.is_empty());

            // If someone else is already driving ftrace, give up now rather
            // than fight over shared kernel state.
            if is_ftrace_enabled && !self.atrace.is_old_atrace() {
                tracing::error!("ftrace is in use by another process");
                return None;
            }

            // Configure ftrace without starting it. Sizing the buffers can
            // be quite slow (up to hundreds of ms).
            self.setup_clock();
            self.setup_buffer_size(request);
        } else if !self.active_configs.is_empty()
            && !is_ftrace_enabled
            && !self.atrace.is_old_atrace()
        {
            // Did someone turn ftrace off behind our back? If so give up.
            tracing::error!("ftrace was disabled by another process");
            return None;
        }

        let mut events = self.resolve_events(request);

        // Vendors can tack extra events onto a category (e.g. "gfx" ->
        // my_hw/my_custom_event); merge them after the built-in expansion.
        for category in &request.atrace_categories {
            if let Some(extra) = self.vendor_events.get(category) {
                events.extend(extra.iter().cloned());
            }
        }

        if requires_atrace(request) {
            if self.atrace.is_old_atrace() && !self.ds_configs.is_empty() {
                tracing::error!("this atrace does not support concurrent sessions, bailing out");
                return None;
            }
            self.update_atrace(request);
        }

        let mut filter = EventFilter::new();
        for group_and_name in &events {
            let Some(event) = self.table.get_or_create_event(group_and_name) else {
                tracing::debug!("cannot enable {group_and_name}, event not known");
                continue;
            };
            // Events in the synthetic "ftrace" group have no enable file and
            // are always on; track them only in the per-config filter so
            // parsers still expect them.
            if self
                .current_state
                .ftrace_events
                .is_event_enabled(event.ftrace_event_id)
                || event.group == "ftrace"
            {
                filter.add_enabled_event(event.ftrace_event_id);
                continue;
            }
            match self.ftrace.enable_event(&event.group, &event.name) {
                Ok(()) => {
                    self.current_state
                        .ftrace_events
                        .add_enabled_event(event.ftrace_event_id);
                    filter.add_enabled_event(event.ftrace_event_id);
                }
                Err(err) => {
                    tracing::debug!("failed to enable {group_and_name}: {err}");
                }
            }
        }

        let compact_sched = create_compact_sched_config(request, self.table.compact_sched_format());

        self.last_id += 1;
        let id = FtraceConfigId(self.last_id);
        self.ds_configs.insert(
            id,
            FtraceDataSourceConfig {
                event_filter: filter,
                compact_sched,
                atrace_apps: request.atrace_apps.clone(),
                atrace_categories: request.atrace_categories.clone(),
                symbolize_ksyms: request.symbolize_ksyms,
            },
        );
        Some(id)
    }

    /// Start collecting for a previously set-up config. The first activation
    /// flips `tracing_on`; later ones just join the running trace.
    pub fn activate_config(&mut self, id: FtraceConfigId) -> bool {
        if !self.ds_configs.contains_key(&id) {
            tracing::error!("config {id} not found");
            return false;
        }

        if self.active_configs.is_empty() {
            if self.ftrace.is_tracing_enabled().unwrap_or(false) && !self.atrace.is_old_atrace() {
                // Same ownership check as in setup: somebody may have grabbed
                // ftrace between the two calls.
                tracing::error!("ftrace is in use by another process");
                return false;
            }
            if let Err(err) = self.ftrace.enable_tracing() {
                tracing::error!("failed to enable tracing: {err}");
                return false;
            }
        }

        self.active_configs.insert(id);
        true
    }

    /// Drop a config and disable whatever only it was keeping alive. The
    /// last removal tears the whole ftrace setup down.
    pub fn remove_config(&mut self, id: FtraceConfigId) -> bool {
        if self.ds_configs.remove(&id).is_none() {
            return false;
        }

        let mut expected_events = EventFilter::new();
        let mut expected_apps: BTreeSet<String> = BTreeSet::new();
        let mut expected_categories: BTreeSet<String> = BTreeSet::new();
        for config in self.ds_configs.values() {
            expected_events.enable_events_from(&config.event_filter);
            expected_apps.extend(config.atrace_apps.iter().cloned());
            expected_categories.extend(config.atrace_categories.iter().cloned());
        }

        // The union of the leftover configs may name apps or categories we
        // never managed to turn on. We can only turn off what atrace
        // actually accepted, so aim for the intersection with the running
        // state.
        expected_apps.retain(|app| self.current_state.atrace_apps.contains(app));
        expected_categories.retain(|category| {
            self.current_state.atrace_categories.contains(category)
        });
        // expected_* is now a subset of the running state, so comparing
        // sizes is enough to detect a change.
        let atrace_changed = self.current_state.atrace_apps.len() != expected_apps.len()
            || self.current_state.atrace_categories.len() != expected_categories.len();

        // Turn off events no remaining config references. An event stays in
        // current_state when the kernel write fails: the filter tracks what
        // is actually on, not what we wish were off.
        for event_id in self.current_state.ftrace_events.enabled_events() {
            if expected_events.is_event_enabled(event_id) {
                continue;
            }
            let Some(event) = self.table.event_by_id(event_id) else {
                debug_assert!(false, "enabled event {event_id} missing from translation table");
                continue;
            };
            match self.ftrace.disable_event(&event.group, &event.name) {
                Ok(()) => self.current_state.ftrace_events.disable_event(event_id),
                Err(err) => {
                    tracing::debug!("failed to disable {}/{}: {err}", event.group, event.name);
                }
            }
        }

        if self.active_configs.remove(&id) && self.active_configs.is_empty() {
            // This was the last active config, stop tracing.
            if let Err(err) = self.ftrace.disable_tracing() {
                tracing::error!("failed to disable tracing: {err}");
            }
        }

        // Idle configs may outlive active ones; tear the rest of the ftrace
        // setup down only once the registry is empty.
        if self.ds_configs.is_empty() {
            match self.ftrace.set_cpu_buffer_size_in_pages(1) {
                Ok(()) => self.current_state.cpu_buffer_size_pages = 1,
                Err(err) => tracing::error!("failed to shrink ftrace buffers: {err}"),
            }
            if let Err(err) = self.ftrace.disable_all_events() {
                tracing::error!("failed to disable all events: {err}");
            }
            if let Err(err) = self.ftrace.clear_trace() {
                tracing::error!("failed to clear the trace buffer: {err}");
            }
        }

        if self.current_state.atrace_on {
            if expected_apps.is_empty() && expected_categories.is_empty() {
                self.disable_atrace();
            } else if atrace_changed {
                // Rerun atrace with the reduced union. Categories that only
                // enable ftrace events are not undone by this; those wait
                // for the last config to go away.
                if self.start_atrace(&expected_apps, &expected_categories) {
                    self.current_state.atrace_apps = expected_apps;
                    self.current_state.atrace_categories = expected_categories;
                }
            }
        }

        true
    }

    pub fn data_source_config(&self, id: FtraceConfigId) -> Option<&FtraceDataSourceConfig> {
        self.ds_configs.get(&id)
    }

    pub fn per_cpu_buffer_size_pages(&self) -> usize {
        self.current_state.cpu_buffer_size_pages
    }

    pub fn ftrace_clock(&self) -> FtraceClock {
        self.current_state.ftrace_clock
    }

    /// Expand the request's event specifiers and atrace categories into
    /// concrete `(group, name)` pairs.
    fn resolve_events(&self, request: &FtraceConfig) -> BTreeSet<GroupAndName> {
        let mut events = BTreeSet::new();
        for specifier in &request.ftrace_events {
            let (group, name) = split_specifier(specifier);
            if name == "*" {
                for name in self.event_names_in_group(group) {
                    events.insert(GroupAndName::new(group, name));
                }
            } else if group.is_empty() {
                // A bare name resolves through the table. Guessing a group
                // on a miss would defeat the generic-event fallback, so the
                // event is dropped instead.
                match self.table.event_by_name(name) {
                    Some(event) => {
                        events.insert(GroupAndName::new(
                            event.group.clone(),
                            event.name.clone(),
                        ));
                    }
                    None => {
                        tracing::debug!(
                            "event {name} doesn't exist; include the group in the config \
                             to enable it as a generic event"
                        );
                    }
                }
            } else {
                events.insert(GroupAndName::new(group, name));
            }
        }

        if requires_atrace(request) {
            events.insert(GroupAndName::new("ftrace", "print"));
            for category in &request.atrace_categories {
                // Unknown categories are atrace's to reject; nothing to
                // expand here.
                let Some(category) = categories::category(category) else {
                    continue;
                };
                for group in category.groups {
                    self.add_event_group(group, &mut events);
                }
                for (group, name) in category.events {
                    events.insert(GroupAndName::new(*group, *name));
                }
            }
        }
        events
    }

    /// Insert every table-known event of `group`.
    fn add_event_group(&self, group: &str, to: &mut BTreeSet<GroupAndName>) {
        let Some(events) = self.table.events_by_group(group) else {
            return;
        };
        for event in events {
            to.insert(GroupAndName::new(group, event.name.clone()));
        }
    }

    /// Wildcard expansion reads the live tracefs rather than the table, so
    /// `group/*` picks up events the table scan may not have indexed.
    fn event_names_in_group(&self, group: &str) -> Vec<String> {
        self.ftrace
            .event_names_for_group(&format!("events/{group}"))
            .unwrap_or_default()
    }

    fn setup_clock(&mut self) {
        let mut current_clock = self.ftrace.clock().unwrap_or_default();
        let available: BTreeSet<String> = self
            .ftrace
            .available_clocks()
            .unwrap_or_default()
            .into_iter()
            .collect();

        for clock in CLOCKS {
            if !available.contains(*clock) {
                continue;
            }
            if current_clock == *clock {
                break;
            }
            if let Err(err) = self.ftrace.set_clock(clock) {
                tracing::warn!("failed to set trace clock to {clock}: {err}");
            }
            current_clock = clock.to_string();
            break;
        }

        self.current_state.ftrace_clock = match current_clock.as_str() {
            "boot" => FtraceClock::Unspecified,
            "global" => FtraceClock::Global,
            "local" => FtraceClock::Local,
            _ => FtraceClock::Unknown,
        };
    }

    fn setup_buffer_size(&mut self, request: &FtraceConfig) {
        let pages = compute_cpu_buffer_size_in_pages(request.buffer_size_kb);
        if let Err(err) = self.ftrace.set_cpu_buffer_size_in_pages(pages) {
            tracing::warn!("failed to size ftrace buffers to {pages} pages: {err}");
        }
        self.current_state.cpu_buffer_size_pages = pages;
    }

    /// Run atrace with the union of the running state and the new request.
    /// The union is staged in temporaries and only committed on a
    /// successful run, so a request atrace rejects cannot poison the state.
    fn update_atrace(&mut self, request: &FtraceConfig) {
        let mut combined_apps = self.current_state.atrace_apps.clone();
        combined_apps.extend(request.atrace_apps.iter().cloned());
        let mut combined_categories = self.current_state.atrace_categories.clone();
        combined_categories.extend(request.atrace_categories.iter().cloned());

        if self.current_state.atrace_on
            && combined_apps.len() == self.current_state.atrace_apps.len()
            && combined_categories.len() == self.current_state.atrace_categories.len()
        {
            return;
        }

        if self.start_atrace(&combined_apps, &combined_categories) {
            self.current_state.atrace_apps = combined_apps;
            self.current_state.atrace_categories = combined_categories;
            self.current_state.atrace_on = true;
        }
    }

    fn start_atrace(&self, apps: &BTreeSet<String>, categories: &BTreeSet<String>) -> bool {
        tracing::debug!("updating atrace config");
        let args = atrace::start_args(apps, categories, self.atrace.is_old_atrace());
        let result = self.atrace.run_atrace(&args);
        tracing::debug!(
            "atrace update {}",
            if result { "succeeded" } else { "failed" }
        );
        result
    }

    fn disable_atrace(&mut self) {
        debug_assert!(self.current_state.atrace_on);
        tracing::debug!("stopping atrace");
        let args = atrace::stop_args(self.atrace.is_old_atrace());
        if self.atrace.run_atrace(&args) {
            self.current_state.atrace_apps.clear();
            self.current_state.atrace_categories.clear();
            self.current_state.atrace_on = false;
        }
    }
}
