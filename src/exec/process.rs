//! # Isolated-Space Execution
//!
//! One child process per non-empty chunk; empty chunks, which only exist
//! when there are more workers than elements, have nothing to compute or
//! write and are skipped. The coordinator spawns every worker in
//! chunk order, streams each its input chunk over stdin, then joins them in
//! chunk order. Completion order therefore never affects output order.
//!
//! ## Worker command line
//! `<program> <leading args> --kernel <name> --chunk <i> --start <s> --end <e>`
//! plus, for shared-buffer runs, `--output <segment path>` and, for in-place
//! runs, `--in-place`.
//!
//! ## Failure
//! A worker reports failure through a non-zero exit status and a message on
//! stderr. On the first failure the remaining workers are killed and reaped
//! (`WorkerGroup`'s `Drop`) before the error is returned.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::info_span;

use crate::error::{ParchunkError, Result};
use crate::kernel::Kernel;
use crate::partition::{ChunkRange, Partition};
use crate::shm::SharedBuffer;
use crate::utils::wire;

/// Executable started for each isolated worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerProgram {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl WorkerProgram {
    /// A `parchunk`-style binary: `<program> worker ...`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: vec![OsString::from("worker")],
        }
    }

    /// Custom program with its own leading arguments
    pub fn with_args<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            leading_args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The running executable, which must understand the `worker` subcommand
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| ParchunkError::config(format!("cannot locate worker executable: {}", e)))?;
        Ok(Self::new(exe))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, kernel: &Kernel, idx: usize, chunk: &ChunkRange) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("--kernel")
            .arg(kernel.to_string())
            .arg("--chunk")
            .arg(idx.to_string())
            .arg("--start")
            .arg(chunk.start.to_string())
            .arg("--end")
            .arg(chunk.end.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

struct RunningWorker {
    idx: usize,
    chunk: ChunkRange,
    child: Child,
}

impl RunningWorker {
    /// Wait for exit and collect stdout
    fn join(self) -> Result<Vec<u8>> {
        let RunningWorker { idx, chunk, child } = self;
        let output = child
            .wait_with_output()
            .map_err(|e| ParchunkError::worker(idx, chunk.start, chunk.end, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                msg => format!("{} ({})", msg, output.status),
            };
            tracing::warn!(
                chunk = idx,
                start = chunk.start,
                end = chunk.end,
                %message,
                "worker failed"
            );
            return Err(ParchunkError::worker(idx, chunk.start, chunk.end, message));
        }
        Ok(output.stdout)
    }
}

/// Workers not yet joined. Dropping the group kills and reaps them.
#[derive(Default)]
struct WorkerGroup {
    pending: VecDeque<RunningWorker>,
}

impl WorkerGroup {
    fn spawn(
        &mut self,
        mut cmd: Command,
        program: &Path,
        idx: usize,
        chunk: ChunkRange,
    ) -> Result<&mut Child> {
        let child = cmd.spawn().map_err(|source| ParchunkError::Spawn {
            chunk: idx,
            program: program.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            chunk = idx,
            start = chunk.start,
            end = chunk.end,
            pid = child.id(),
            "spawned worker"
        );
        self.pending.push_back(RunningWorker { idx, chunk, child });
        let last = self.pending.len() - 1;
        Ok(&mut self.pending[last].child)
    }

    fn pop_next(&mut self) -> Option<RunningWorker> {
        self.pending.pop_front()
    }
}

impl Drop for WorkerGroup {
    fn drop(&mut self) {
        for mut worker in self.pending.drain(..) {
            tracing::debug!(chunk = worker.idx, "killing unjoined worker");
            let _ = worker.child.kill();
            let _ = worker.child.wait();
        }
    }
}

/// Write a chunk to the worker's stdin and close it
///
/// A broken pipe means the worker already exited; its exit status is the
/// error that gets reported, so the write error itself is only logged.
fn feed(child: &mut Child, idx: usize, values: &[f64]) {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(wire::encode(values)) {
            tracing::debug!(chunk = idx, error = %e, "worker closed stdin early");
        }
    }
}

/// Spawn one worker per non-empty chunk, sending each its slice of `input`
fn dispatch(
    program: &WorkerProgram,
    kernel: &Kernel,
    input: &[f64],
    partition: &Partition,
    output: Option<&Path>,
) -> Result<WorkerGroup> {
    let mut group = WorkerGroup::default();
    for &(idx, chunk) in partition.active() {
        let mut cmd = program.command(kernel, idx, &chunk);
        cmd.stdin(Stdio::piped());
        if let Some(path) = output {
            cmd.arg("--output").arg(path);
        }
        let child = group.spawn(cmd, program.program(), idx, chunk)?;
        feed(child, idx, &input[chunk.as_range()]);
    }
    Ok(group)
}

/// Results returned through each worker's stdout
pub fn run_isolated(
    program: &WorkerProgram,
    kernel: &Kernel,
    input: &[f64],
    partition: &Partition,
) -> Result<Vec<f64>> {
    let _span = info_span!(
        "isolated_space",
        workers = partition.num_chunks(),
        processes = partition.active().len()
    )
    .entered();

    let mut group = dispatch(program, kernel, input, partition, None)?;
    let mut output = Vec::with_capacity(input.len());
    while let Some(worker) = group.pop_next() {
        let (idx, chunk) = (worker.idx, worker.chunk);
        let bytes = worker.join()?;
        let values = wire::decode_exact(&bytes, chunk.len())
            .map_err(|e| ParchunkError::worker(idx, chunk.start, chunk.end, e.to_string()))?;
        output.extend_from_slice(&values);
    }
    Ok(output)
}

/// Results written by workers straight into a shared segment
///
/// The segment is created before dispatch and released exactly once, after
/// every worker has been joined or killed, on success and failure alike.
pub fn run_shared_buffer(
    program: &WorkerProgram,
    kernel: &Kernel,
    input: &[f64],
    partition: &Partition,
    shm_dir: &Path,
    name: &str,
) -> Result<Vec<f64>> {
    let _span = info_span!(
        "isolated_shared_buffer",
        workers = partition.num_chunks(),
        processes = partition.active().len(),
        segment = name
    )
    .entered();

    // Workers write without locks; only disjoint ranges make that sound.
    partition.validate()?;
    let buffer = SharedBuffer::create(shm_dir, name, input.len())?;

    let joined = dispatch(program, kernel, input, partition, Some(buffer.path()))
        .and_then(join_all);

    match joined {
        Ok(()) => {
            let output = buffer.to_vec();
            buffer.release()?;
            Ok(output)
        }
        Err(e) => {
            if let Err(release_err) = buffer.release() {
                tracing::warn!(error = %release_err, "segment release failed after worker error");
            }
            Err(e)
        }
    }
}

/// Workers map their own range of `buffer` and transform it in place
pub fn run_in_place(
    program: &WorkerProgram,
    kernel: &Kernel,
    buffer: &mut SharedBuffer,
    partition: &Partition,
) -> Result<()> {
    let _span = info_span!(
        "isolated_in_place",
        workers = partition.num_chunks(),
        processes = partition.active().len(),
        segment = buffer.name()
    )
    .entered();

    partition.validate()?;
    if partition.n() != buffer.len() {
        return Err(ParchunkError::protocol(format!(
            "partition covers {} values but segment '{}' holds {}",
            partition.n(),
            buffer.name(),
            buffer.len()
        )));
    }

    let mut group = WorkerGroup::default();
    for &(idx, chunk) in partition.active() {
        let mut cmd = program.command(kernel, idx, &chunk);
        cmd.stdin(Stdio::null())
            .arg("--output")
            .arg(buffer.path())
            .arg("--in-place");
        group.spawn(cmd, program.program(), idx, chunk)?;
    }
    join_all(group)
}

/// Join every worker in chunk order; these workers answer only through
/// the segment, so any stdout is a protocol violation
fn join_all(mut group: WorkerGroup) -> Result<()> {
    while let Some(worker) = group.pop_next() {
        let (idx, chunk) = (worker.idx, worker.chunk);
        let stdout = worker.join()?;
        if !stdout.is_empty() {
            return Err(ParchunkError::worker(
                idx,
                chunk.start,
                chunk.end,
                format!("unexpected {} bytes on stdout", stdout.len()),
            ));
        }
    }
    Ok(())
}
