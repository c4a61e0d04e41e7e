//! Driving the atrace helper.
//!
//! atrace cannot be configured incrementally: every invocation replaces the
//! whole set of categories and apps. The muxer therefore always hands it the
//! full union of what every live config wants, and this module only knows
//! how to phrase that union as an argv and run the helper.

use std::collections::BTreeSet;
use std::process::Command;

/// Launches the atrace helper with a complete argv (argv\[0\] included).
pub trait AtraceRunner {
    /// Run the helper to completion. True means a zero exit status.
    fn run_atrace(&self, args: &[String]) -> bool;

    /// Pre-Android-P atrace: it does not accept `--only_userspace` and
    /// cannot host more than one session at a time.
    fn is_old_atrace(&self) -> bool;
}

/// Build the `--async_start` invocation for the given union of apps and
/// categories.
pub fn start_args(
    apps: &BTreeSet<String>,
    categories: &BTreeSet<String>,
    old_atrace: bool,
) -> Vec<String> {
    let mut args = vec!["atrace".to_string(), "--async_start".to_string()];
    if !old_atrace {
        args.push("--only_userspace".to_string());
    }
    args.extend(categories.iter().cloned());
    if !apps.is_empty() {
        args.push("-a".to_string());
        args.push(apps.iter().cloned().collect::<Vec<_>>().join(","));
    }
    args
}

/// Build the `--async_stop` invocation.
pub fn stop_args(old_atrace: bool) -> Vec<String> {
    let mut args = vec!["atrace".to_string(), "--async_stop".to_string()];
    if !old_atrace {
        args.push("--only_userspace".to_string());
    }
    args
}

/// [`AtraceRunner`] that spawns the real `atrace` binary from PATH.
#[derive(Debug, Default)]
pub struct SystemAtrace {
    old_atrace: bool,
}

impl SystemAtrace {
    pub fn new() -> Self {
        Self { old_atrace: false }
    }

    /// Hosts that know they are running a pre-P atrace construct the runner
    /// with the legacy flag, so invocations skip `--only_userspace` and the
    /// muxer refuses concurrent atrace sessions.
    pub fn legacy() -> Self {
        Self { old_atrace: true }
    }
}

impl AtraceRunner for SystemAtrace {
    fn run_atrace(&self, args: &[String]) -> bool {
        let Some((argv0, rest)) = args.split_first() else {
            return false;
        };
        match Command::new(argv0).args(rest).status() {
            Ok(status) => status.success(),
            Err(err) => {
                tracing::error!("failed to spawn {argv0}: {err}");
                false
            }
        }
    }

    fn is_old_atrace(&self) -> bool {
        self.old_atrace
    }
}
