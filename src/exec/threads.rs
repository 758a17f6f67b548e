//! # Shared-Space Execution
//!
//! One rayon pool with a thread per non-empty chunk. Empty chunks, which
//! only exist when there are more workers than elements, get no thread and
//! contribute nothing to the output. Chunks are read-only slices of
//! the input and each produces a fresh `Vec<f64>`, so the threads share no
//! mutable state. Rayon's ordered `collect` keeps chunk order regardless of
//! which thread finishes first.

use std::fmt;

use rayon::prelude::*;
use tracing::info_span;

use crate::error::{ParchunkError, Result};
use crate::partition::{ChunkRange, Partition};
use crate::utils::threading::build_thread_pool;

/// Run `f` over every non-empty chunk of `partition`, one pool thread each
pub fn run<F, E>(
    input: &[f64],
    partition: &Partition,
    f: &F,
    thread_prefix: &str,
) -> Result<Vec<f64>>
where
    F: Fn(usize, f64) -> std::result::Result<f64, E> + Sync,
    E: fmt::Display,
{
    let active = partition.active();
    let pool = build_thread_pool(active.len().max(1), thread_prefix)?;

    let span = info_span!(
        "shared_space",
        workers = partition.num_chunks(),
        threads = pool.current_num_threads()
    );
    let results: Vec<Vec<f64>> = span.in_scope(|| {
        pool.install(|| {
            active
                .par_iter()
                .map(|(idx, chunk)| map_chunk(input, *idx, chunk, f))
                .collect::<Result<Vec<_>>>()
        })
    })?;

    let mut output = Vec::with_capacity(input.len());
    for chunk in results {
        output.extend_from_slice(&chunk);
    }
    Ok(output)
}

fn map_chunk<F, E>(input: &[f64], idx: usize, chunk: &ChunkRange, f: &F) -> Result<Vec<f64>>
where
    F: Fn(usize, f64) -> std::result::Result<f64, E>,
    E: fmt::Display,
{
    input[chunk.as_range()]
        .iter()
        .enumerate()
        .map(|(i, &x)| f(chunk.start + i, x))
        .collect::<std::result::Result<Vec<f64>, E>>()
        .map_err(|e| {
            tracing::warn!(
                chunk = idx,
                start = chunk.start,
                end = chunk.end,
                error = %e,
                "chunk failed"
            );
            ParchunkError::worker(idx, chunk.start, chunk.end, e.to_string())
        })
}
