//! Multiplexes concurrent tracing configurations onto the Linux kernel's
//! single, globally shared ftrace instance.
//!
//! N clients each hand the muxer an [`FtraceConfig`]; the muxer resolves the
//! requested events through a translation table, reconciles the union of all
//! live configs against `/sys/kernel/tracing`, and drives the `atrace`
//! helper for userspace categories. Removing a config recomputes the union
//! from the survivors and disables only what nobody references anymore.
//!
//! # Modules
//!
//! - [`muxer`] - the config registry and reconciler
//! - [`tracefs`] - capability trait over the tracing control files plus the
//!   real filesystem-backed implementation
//! - [`table`] - event name/group/id translation
//! - [`categories`] - the atrace category expansion table
//! - [`atrace`] - the atrace helper driver
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ftracemux::{EventTable, FtraceConfig, FtraceConfigMuxer, SystemAtrace, TracingFs};
//!
//! # fn main() -> anyhow::Result<()> {
//! let tracefs = Arc::new(TracingFs::mount_default()?);
//! let table = EventTable::read(tracefs.clone())?;
//! let mut muxer = FtraceConfigMuxer::new(
//!     tracefs,
//!     Box::new(table),
//!     Arc::new(SystemAtrace::new()),
//!     Default::default(),
//! );
//!
//! let config = FtraceConfig {
//!     ftrace_events: vec!["sched/sched_switch".to_string()],
//!     buffer_size_kb: 4096,
//!     ..Default::default()
//! };
//! let id = muxer.setup_config(&config).expect("ftrace is busy");
//! assert!(muxer.activate_config(id));
//! // ... record ...
//! muxer.remove_config(id);
//! # Ok(())
//! # }
//! ```

pub mod atrace;
pub mod categories;
pub mod compact_sched;
pub mod config;
pub mod event_filter;
pub mod events;
pub mod muxer;
pub mod table;
pub mod tracefs;

#[cfg(test)]
mod testutil;

// Re-export for convenience
pub use atrace::{AtraceRunner, SystemAtrace};
pub use categories::VendorEvents;
pub use compact_sched::{CompactSchedConfig, CompactSchedFormat};
pub use config::{requires_atrace, FtraceConfig};
pub use event_filter::EventFilter;
pub use events::{Event, EventId, GroupAndName};
pub use muxer::{
    compute_cpu_buffer_size_in_pages, FtraceClock, FtraceConfigId, FtraceConfigMuxer,
    FtraceDataSourceConfig,
};
pub use table::{EventTable, TranslationTable};
pub use tracefs::{Tracefs, TracingFs};
