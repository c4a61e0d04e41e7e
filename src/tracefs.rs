//! Capability interface over the kernel's tracing control files, plus the
//! real filesystem-backed implementation.
//!
//! Everything the muxer does to the kernel goes through the [`Tracefs`]
//! trait, so tests can substitute an in-memory or tempdir-backed instance
//! and the muxer never touches paths directly.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Mount points probed for a live tracefs, newest layout first.
const TRACEFS_ROOTS: &[&str] = &["/sys/kernel/tracing", "/sys/kernel/debug/tracing"];

/// The muxer's window onto `/sys/kernel/tracing`.
///
/// All operations are synchronous and may block for tens to hundreds of
/// milliseconds (buffer resizing in particular); callers own any
/// supervision. A failed write is reported, never retried.
pub trait Tracefs {
    /// Read `tracing_on`.
    fn is_tracing_enabled(&self) -> Result<bool>;

    /// Write `tracing_on = 1`.
    fn enable_tracing(&self) -> Result<()>;

    /// Write `tracing_on = 0`.
    fn disable_tracing(&self) -> Result<()>;

    /// Size every per-CPU ring buffer to `pages` pages.
    fn set_cpu_buffer_size_in_pages(&self, pages: usize) -> Result<()>;

    /// Bulk-disable every event via `events/enable`.
    fn disable_all_events(&self) -> Result<()>;

    /// Truncate the trace ring buffer.
    fn clear_trace(&self) -> Result<()>;

    /// The currently selected trace clock.
    fn clock(&self) -> Result<String>;

    /// Every clock the kernel advertises in `trace_clock`.
    fn available_clocks(&self) -> Result<Vec<String>>;

    fn set_clock(&self, clock: &str) -> Result<()>;

    /// Write `events/<group>/<name>/enable = 1`.
    fn enable_event(&self, group: &str, name: &str) -> Result<()>;

    /// Write `events/<group>/<name>/enable = 0`.
    fn disable_event(&self, group: &str, name: &str) -> Result<()>;

    /// Subdirectory names under `path` (relative to the tracefs root).
    /// `events` lists the groups, `events/<group>` lists that group's
    /// event names.
    fn event_names_for_group(&self, path: &str) -> Result<Vec<String>>;

    /// Contents of `events/<group>/<name>/format`.
    fn read_event_format(&self, group: &str, name: &str) -> Result<String>;
}

/// KiB per ring-buffer page on this machine. Falls back to 4 KiB pages if
/// sysconf is unavailable.
pub(crate) fn page_size_kb() -> usize {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page <= 0 {
        4
    } else {
        page as usize / 1024
    }
}

/// [`Tracefs`] backed by the real pseudo-filesystem.
#[derive(Debug, Clone)]
pub struct TracingFs {
    root: PathBuf,
}

impl TracingFs {
    /// Probe the standard mount points and return the first root that holds
    /// a `trace` file.
    pub fn mount_default() -> Result<Self> {
        for root in TRACEFS_ROOTS {
            let candidate = Path::new(root);
            if candidate.join("trace").exists() {
                return Ok(Self {
                    root: candidate.to_path_buf(),
                });
            }
        }
        bail!("tracefs is not mounted at any of {:?}", TRACEFS_ROOTS);
    }

    /// Use an explicit root, e.g. a non-default tracefs instance.
    pub fn at_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_file(&self, rel: &str) -> Result<String> {
        let path = self.root.join(rel);
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root.join(rel);
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
    }
}

impl Tracefs for TracingFs {
    fn is_tracing_enabled(&self) -> Result<bool> {
        Ok(self.read_file("tracing_on")?.trim() == "1")
    }

    fn enable_tracing(&self) -> Result<()> {
        self.write_file("tracing_on", "1")
    }

    fn disable_tracing(&self) -> Result<()> {
        self.write_file("tracing_on", "0")
    }

    fn set_cpu_buffer_size_in_pages(&self, pages: usize) -> Result<()> {
        let kb = pages * page_size_kb();
        self.write_file("buffer_size_kb", &kb.to_string())
    }

    fn disable_all_events(&self) -> Result<()> {
        self.write_file("events/enable", "0")
    }

    fn clear_trace(&self) -> Result<()> {
        // Opening the trace file for writing truncates the ring buffer.
        self.write_file("trace", "")
    }

    fn clock(&self) -> Result<String> {
        let raw = self.read_file("trace_clock")?;
        for token in raw.split_whitespace() {
            if let Some(name) = token
                .strip_prefix('[')
                .and_then(|token| token.strip_suffix(']'))
            {
                return Ok(name.to_string());
            }
        }
        bail!("no clock selected in trace_clock: {raw:?}");
    }

    fn available_clocks(&self) -> Result<Vec<String>> {
        Ok(self
            .read_file("trace_clock")?
            .split_whitespace()
            .map(|token| token.trim_matches(|c| c == '[' || c == ']').to_string())
            .collect())
    }

    fn set_clock(&self, clock: &str) -> Result<()> {
        self.write_file("trace_clock", clock)
    }

    fn enable_event(&self, group: &str, name: &str) -> Result<()> {
        self.write_file(&format!("events/{group}/{name}/enable"), "1")
    }

    fn disable_event(&self, group: &str, name: &str) -> Result<()> {
        self.write_file(&format!("events/{group}/{name}/enable"), "0")
    }

    fn event_names_for_group(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.root.join(path);
        let entries =
            fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_event_format(&self, group: &str, name: &str) -> Result<String> {
        self.read_file(&format!("events/{group}/{name}/format"))
    }
}
