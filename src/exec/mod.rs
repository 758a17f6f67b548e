//! # Execution Modes
//!
//! ## Role
//! Partition an input array, run a transform over every chunk with the
//! selected strategy, and reassemble the results in chunk order.
//!
//! ## Modes
//! - `sequential`: the whole array on the calling thread (baseline)
//! - `shared-space`: one rayon pool of `workers` threads, chunk results
//!   collected in order and concatenated
//! - `isolated-space`: one child process per chunk, chunk in over stdin,
//!   result out over stdout
//! - `isolated-space-shared-buffer`: one child process per chunk, each
//!   writing its result into a named shared segment at its own offset
//!
//! ## Failure
//! Any failing chunk fails the whole call with `ParchunkError::Worker`.
//! Shared segments are released on every exit path.

pub mod process;
pub mod sequential;
pub mod threads;
pub mod worker;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::instrument;

use crate::error::{ParchunkError, Result};
use crate::kernel::Kernel;
use crate::partition::partition;
use crate::shm::{default_shm_dir, unique_name, SharedBuffer};

pub use process::WorkerProgram;

/// Execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Whole array on the calling thread
    Sequential,
    /// Thread pool inside this process
    #[value(alias = "threads")]
    SharedSpace,
    /// One process per chunk, results over pipes
    #[value(alias = "processes")]
    IsolatedSpace,
    /// One process per chunk, results into a shared segment
    #[value(name = "isolated-space-shared-buffer", alias = "shm")]
    #[serde(rename = "isolated-space-shared-buffer")]
    IsolatedSharedBuffer,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::Sequential,
        Mode::SharedSpace,
        Mode::IsolatedSpace,
        Mode::IsolatedSharedBuffer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Sequential => "sequential",
            Mode::SharedSpace => "shared-space",
            Mode::IsolatedSpace => "isolated-space",
            Mode::IsolatedSharedBuffer => "isolated-space-shared-buffer",
        }
    }

    /// True if chunks run in child processes
    pub fn is_isolated(self) -> bool {
        matches!(self, Mode::IsolatedSpace | Mode::IsolatedSharedBuffer)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executor settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Program started for isolated modes; `None` re-runs the current
    /// executable with a `worker` subcommand
    pub worker_program: Option<WorkerProgram>,

    /// Directory holding shared segments
    pub shm_dir: PathBuf,

    /// Fixed segment name; `None` generates a unique name per call.
    /// A fixed name makes concurrent shared-buffer calls collide.
    pub shm_name: Option<String>,

    /// Prefix for shared-space thread names
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_program: None,
            shm_dir: default_shm_dir(),
            shm_name: None,
            thread_name_prefix: "parchunk-worker".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_worker_program(mut self, program: WorkerProgram) -> Self {
        self.worker_program = Some(program);
        self
    }

    pub fn with_shm_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shm_dir = dir.into();
        self
    }

    pub fn with_shm_name(mut self, name: impl Into<String>) -> Self {
        self.shm_name = Some(name.into());
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// Coordinator for chunked transforms
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Apply `kernel` to every element of `input` using `workers` units of
    /// execution in the given mode
    #[instrument(
        name = "transform",
        skip(self, input, kernel, mode),
        fields(n = input.len(), kernel = %kernel, mode = %mode)
    )]
    pub fn transform(
        &self,
        input: &[f64],
        kernel: &Kernel,
        workers: usize,
        mode: Mode,
    ) -> Result<Vec<f64>> {
        check_workers(workers)?;
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let partition = partition(input.len(), workers)?;

        let apply = |i: usize, x: f64| kernel.apply(i, x);
        match mode {
            Mode::Sequential => sequential::run(input, &apply),
            Mode::SharedSpace => {
                threads::run(input, &partition, &apply, &self.config.thread_name_prefix)
            }
            Mode::IsolatedSpace => {
                process::run_isolated(&self.worker_program()?, kernel, input, &partition)
            }
            Mode::IsolatedSharedBuffer => {
                let name = self.segment_name();
                process::run_shared_buffer(
                    &self.worker_program()?,
                    kernel,
                    input,
                    &partition,
                    &self.config.shm_dir,
                    &name,
                )
            }
        }
    }

    /// Apply an arbitrary closure; only in-process modes can run it
    pub fn transform_with<F, E>(
        &self,
        input: &[f64],
        f: F,
        workers: usize,
        mode: Mode,
    ) -> Result<Vec<f64>>
    where
        F: Fn(f64) -> std::result::Result<f64, E> + Sync,
        E: fmt::Display,
    {
        check_workers(workers)?;
        if mode.is_isolated() {
            return Err(ParchunkError::UnsupportedMode {
                mode,
                message: "closures cannot be sent to a worker process; use a Kernel".to_string(),
            });
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let partition = partition(input.len(), workers)?;

        let apply = |_: usize, x: f64| f(x);
        match mode {
            Mode::Sequential => sequential::run(input, &apply),
            _ => threads::run(input, &partition, &apply, &self.config.thread_name_prefix),
        }
    }

    /// Transform a shared segment in place with one worker process per chunk
    ///
    /// The caller keeps ownership of the segment.
    #[instrument(
        name = "transform_in_place",
        skip(self, buffer, kernel),
        fields(segment = %buffer.name(), n = buffer.len(), kernel = %kernel)
    )]
    pub fn transform_in_place(
        &self,
        buffer: &mut SharedBuffer,
        kernel: &Kernel,
        workers: usize,
    ) -> Result<()> {
        check_workers(workers)?;
        if buffer.is_empty() {
            return Ok(());
        }
        let partition = partition(buffer.len(), workers)?;
        process::run_in_place(&self.worker_program()?, kernel, buffer, &partition)
    }

    /// Create a segment in the configured directory, for use with
    /// `transform_in_place`
    pub fn create_segment(&self, data: &[f64]) -> Result<SharedBuffer> {
        SharedBuffer::from_slice(self.shm_dir(), &self.segment_name(), data)
    }

    fn shm_dir(&self) -> &Path {
        &self.config.shm_dir
    }

    fn segment_name(&self) -> String {
        self.config
            .shm_name
            .clone()
            .unwrap_or_else(|| unique_name("parchunk"))
    }

    fn worker_program(&self) -> Result<WorkerProgram> {
        match &self.config.worker_program {
            Some(program) => Ok(program.clone()),
            None => WorkerProgram::current_exe(),
        }
    }
}

fn check_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        return Err(ParchunkError::InvalidWorkerCount { workers });
    }
    Ok(())
}

/// Transform with the default executor configuration
pub fn transform(input: &[f64], kernel: &Kernel, workers: usize, mode: Mode) -> Result<Vec<f64>> {
    Executor::default().transform(input, kernel, workers, mode)
}
