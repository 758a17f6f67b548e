//! # Mode Comparison Harness
//!
//! Backs the `bench` subcommand: times the sequential baseline and every
//! requested `(mode, workers)` pair on a seeded random array, and checks
//! each result against the baseline.

use std::io::Write;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info_span;

use crate::config::BenchArgs;
use crate::error::Result;
use crate::exec::{Executor, Mode};
use crate::kernel::Kernel;

/// One timed configuration
#[derive(Debug, Clone, Serialize)]
pub struct BenchRecord {
    pub mode: Mode,
    pub workers: usize,
    pub kernel: String,
    pub size: usize,
    pub mean_secs: f64,
    /// Baseline time divided by this configuration's time
    pub speedup: f64,
    pub max_abs_diff: f64,
    pub matches_baseline: bool,
}

/// Uniform `[0, 1)` values from a fixed seed
pub fn synthetic_input(size: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size).map(|_| rng.gen::<f64>()).collect()
}

/// Largest elementwise difference; infinite when lengths differ
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| if x == y { 0.0 } else { (x - y).abs() })
        .fold(0.0, f64::max)
}

/// One warm-up run, then the mean of `repeats` timed runs
fn time_mode(
    executor: &Executor,
    input: &[f64],
    kernel: &Kernel,
    workers: usize,
    mode: Mode,
    repeats: usize,
) -> Result<(Vec<f64>, f64)> {
    let _span = info_span!("bench_config", %mode, workers).entered();

    let mut output = executor.transform(input, kernel, workers, mode)?;
    let mut total = 0.0;
    for _ in 0..repeats {
        let start = Instant::now();
        output = executor.transform(input, kernel, workers, mode)?;
        total += start.elapsed().as_secs_f64();
    }
    Ok((output, total / repeats.max(1) as f64))
}

pub fn run_bench(args: &BenchArgs, executor: &Executor) -> Result<Vec<BenchRecord>> {
    let input = synthetic_input(args.size, args.seed);
    let kernel_name = args.kernel.to_string();

    let (baseline, baseline_secs) =
        time_mode(executor, &input, &args.kernel, 1, Mode::Sequential, args.repeats)?;
    tracing::info!(secs = baseline_secs, "sequential baseline");

    let record = |mode, workers, secs: f64, diff: f64| BenchRecord {
        mode,
        workers,
        kernel: kernel_name.clone(),
        size: args.size,
        mean_secs: secs,
        speedup: if secs > 0.0 { baseline_secs / secs } else { f64::INFINITY },
        max_abs_diff: diff,
        matches_baseline: diff <= args.tolerance,
    };

    let mut records = vec![record(Mode::Sequential, 1, baseline_secs, 0.0)];
    for &mode in args.modes.iter().filter(|&&m| m != Mode::Sequential) {
        for &workers in &args.workers {
            let (output, secs) =
                time_mode(executor, &input, &args.kernel, workers, mode, args.repeats)?;
            let diff = max_abs_diff(&baseline, &output);
            if diff > args.tolerance {
                tracing::warn!(%mode, workers, diff, "result differs from sequential baseline");
            }
            records.push(record(mode, workers, secs, diff));
        }
    }
    Ok(records)
}

pub fn write_table<W: Write>(records: &[BenchRecord], mut out: W) -> std::io::Result<()> {
    writeln!(
        out,
        "{:<30} {:>7} {:>12} {:>9} {:>12} {:>6}",
        "mode", "workers", "mean_s", "speedup", "max_diff", "match"
    )?;
    writeln!(out, "{:-<81}", "")?;
    for r in records {
        writeln!(
            out,
            "{:<30} {:>7} {:>12.4} {:>9.2} {:>12.3e} {:>6}",
            r.mode.as_str(),
            r.workers,
            r.mean_secs,
            r.speedup,
            r.max_abs_diff,
            r.matches_baseline
        )?;
    }
    Ok(())
}

pub fn write_json_lines<W: Write>(records: &[BenchRecord], mut out: W) -> std::io::Result<()> {
    for r in records {
        serde_json::to_writer(&mut out, r)?;
        writeln!(out)?;
    }
    Ok(())
}
