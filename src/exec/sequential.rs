//! Sequential baseline: the transform over the whole array, no partitioning.

use std::fmt;

use crate::error::{ParchunkError, Result};

/// Apply `f(index, value)` to every element on the calling thread
///
/// A failure is reported as chunk 0 spanning the whole input.
pub fn run<F, E>(input: &[f64], f: &F) -> Result<Vec<f64>>
where
    F: Fn(usize, f64) -> std::result::Result<f64, E>,
    E: fmt::Display,
{
    input
        .iter()
        .enumerate()
        .map(|(i, &x)| f(i, x))
        .collect::<std::result::Result<Vec<f64>, E>>()
        .map_err(|e| ParchunkError::worker(0, 0, input.len(), e.to_string()))
}
