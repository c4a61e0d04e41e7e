//! Hand-off of the compact scheduler-event encoder configuration.
//!
//! The compact encoding packs sched_switch/sched_waking into columnar
//! per-bundle arrays instead of one message per event. Whether that is safe
//! depends on the kernel's event format matching what the encoder expects;
//! the translation table makes that call, the muxer just combines it with
//! the client's request.

use crate::config::FtraceConfig;

/// Whether the kernel's sched_switch/sched_waking layout matches what the
/// compact encoder expects. Advertised by the translation table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactSchedFormat {
    pub valid: bool,
}

/// Per data source switch for the compact encoding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactSchedConfig {
    pub enabled: bool,
}

/// The request may ask for the compact encoding, but it only takes effect if
/// the kernel's format is usable.
pub fn create_compact_sched_config(
    request: &FtraceConfig,
    format: CompactSchedFormat,
) -> CompactSchedConfig {
    let requested = request.compact_sched.enabled.unwrap_or(false);
    CompactSchedConfig {
        enabled: requested && format.valid,
    }
}
