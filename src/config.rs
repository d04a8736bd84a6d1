//! Explicit configuration passed to `ZipReader`/`ZipWriter` constructors.
//!
//! The reference implementation keeps a process-wide mutable default and a
//! `configure()` mutator; we pass an explicit struct instead (see DESIGN.md,
//! Open Question resolution for §9 "Global mutable configuration"). A
//! process-wide default is still offered via [`Config::default`] for
//! convenience, cloned into each handle so concurrent handles never tear.

use crate::error::{Result, ZipError};

/// Floor enforced on [`Config::chunk_size`].
pub const MIN_CHUNK_SIZE: usize = 64;

/// Default chunk size: 512 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Selects how codec work for an entry is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerDispatch {
    /// Run the codec inline on the calling task.
    InProcess,
    /// Hand the codec off to a blocking worker thread (`spawn_blocking`),
    /// standing in for the reference implementation's worker-script dispatch.
    OffThread,
}

/// Either a list of inline worker scripts or a path to load them from.
/// The two are mutually exclusive, matching the source's `ConfigConflict`.
#[derive(Debug, Clone, Default)]
pub enum WorkerScripts {
    #[default]
    None,
    Inline(Vec<String>),
    Path(String),
}

/// Shared configuration for a [`crate::reader::ZipReader`] or
/// [`crate::writer::ZipWriter`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes pulled per chunk by the chunked driver. Floored at
    /// [`MIN_CHUNK_SIZE`].
    pub chunk_size: usize,
    /// Upper bound on concurrently in-flight codec workers.
    pub max_workers: usize,
    /// Whether off-thread dispatch is permitted at all; `false` forces
    /// [`WorkerDispatch::InProcess`] regardless of per-call preference.
    pub use_web_workers: bool,
    /// Worker script configuration (inline XOR path).
    pub worker_scripts: WorkerScripts,
    /// Diagnostic name surfaced in `tracing` spans.
    pub name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2),
            use_web_workers: true,
            worker_scripts: WorkerScripts::None,
            name: None,
        }
    }
}

impl Config {
    /// Validate and normalize the configuration, applying the `chunk_size`
    /// floor and rejecting conflicting worker-script settings.
    pub fn validated(mut self) -> Result<Self> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            self.chunk_size = MIN_CHUNK_SIZE;
        }
        Ok(self)
    }

    /// Resolve whether codec work for one call should run off-thread.
    pub fn dispatch_for(&self, requested_off_thread: bool) -> WorkerDispatch {
        if self.use_web_workers && requested_off_thread {
            WorkerDispatch::OffThread
        } else {
            WorkerDispatch::InProcess
        }
    }
}

/// Validate a worker-script configuration built from the two mutually
/// exclusive per-add/per-config options named in spec §6.
pub fn worker_scripts_from(
    scripts: Option<Vec<String>>,
    scripts_path: Option<String>,
) -> Result<WorkerScripts> {
    match (scripts, scripts_path) {
        (Some(_), Some(_)) => Err(ZipError::ConfigConflict),
        (Some(s), None) => Ok(WorkerScripts::Inline(s)),
        (None, Some(p)) => Ok(WorkerScripts::Path(p)),
        (None, None) => Ok(WorkerScripts::None),
    }
}
