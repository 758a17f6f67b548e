//! # Worker Process Entry
//!
//! What a child process does for one chunk. The binary's `worker`
//! subcommand calls `run_worker` with its real stdin and stdout; tests pass
//! in-memory readers and writers.
//!
//! - default: read the chunk from `input`, write the result to `output`
//! - `--output <segment>`: read the chunk from `input`, write the result
//!   into elements `[start, end)` of the segment
//! - `--in-place --output <segment>`: transform elements `[start, end)` of
//!   the segment where they are; `input` is not read

use std::io::{Read, Write};

use anyhow::{bail, Context, Result};

use crate::config::WorkerArgs;
use crate::shm::SharedRegion;
use crate::utils::wire;

pub fn run_worker<R: Read, W: Write>(args: &WorkerArgs, mut input: R, mut output: W) -> Result<()> {
    if args.end < args.start {
        bail!("chunk {} has end {} before start {}", args.chunk, args.end, args.start);
    }
    let len = args.end - args.start;

    if args.in_place {
        let path = args
            .output
            .as_deref()
            .context("--in-place needs the segment given with --output")?;
        let mut region = SharedRegion::open(path, args.start, args.end)
            .with_context(|| format!("mapping {} for chunk {}", path.display(), args.chunk))?;
        args.kernel.apply_in_place(args.start, region.as_mut_slice())?;
        return Ok(());
    }

    let mut bytes = Vec::with_capacity(len * std::mem::size_of::<f64>());
    input
        .read_to_end(&mut bytes)
        .context("reading chunk from stdin")?;
    let values = wire::decode_exact(&bytes, len)?;
    let result = args.kernel.apply_slice(args.start, &values)?;

    match &args.output {
        Some(path) => {
            let mut region = SharedRegion::open(path, args.start, args.end)
                .with_context(|| format!("mapping {} for chunk {}", path.display(), args.chunk))?;
            region.as_mut_slice().copy_from_slice(&result);
        }
        None => {
            output
                .write_all(wire::encode(&result))
                .context("writing result to stdout")?;
            output.flush()?;
        }
    }
    Ok(())
}
