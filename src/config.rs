//! The per-client tracing request.

use serde::{Deserialize, Serialize};

/// Hints for the compact scheduler-event encoder. The muxer does not encode
/// anything itself; it forwards these to the encoder configuration stored in
/// the per-config record.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactSchedHints {
    /// Ask for the compact sched_switch/sched_waking encoding. Only takes
    /// effect when the kernel's event format is one the encoder understands.
    pub enabled: Option<bool>,
}

/// One client's requested ftrace configuration.
///
/// Many of these can be live at once; the muxer reconciles their union onto
/// the kernel's single ftrace instance.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtraceConfig {
    /// Event specifiers: `group/name`, a whole-group wildcard `group/*`, or a
    /// bare event name to be resolved through the translation table.
    pub ftrace_events: Vec<String>,
    /// Categories from the fixed atrace taxonomy (`gfx`, `sched`, `freq`, ...).
    pub atrace_categories: Vec<String>,
    /// App names handed to `atrace -a` for userspace tracing.
    pub atrace_apps: Vec<String>,
    /// Requested per-CPU ring buffer size in KiB. 0 selects the default.
    pub buffer_size_kb: usize,
    /// Whether kernel symbol addresses in events should be symbolized.
    pub symbolize_ksyms: bool,
    pub compact_sched: CompactSchedHints,
}

/// True when the request needs the atrace helper on top of raw ftrace.
pub fn requires_atrace(config: &FtraceConfig) -> bool {
    !config.atrace_apps.is_empty() || !config.atrace_categories.is_empty()
}
