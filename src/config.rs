//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation for the `parchunk` binary.
//!
//! ## Subcommands
//! - `bench`: time every `(mode, workers)` pair against the sequential
//!   baseline on a seeded random array
//! - `worker`: hidden; the entry point of an isolated-space worker process
//!
//! ## Example CLI
//! ```bash
//! parchunk bench --size 100000000 --workers 2,4,8,16 --modes threads,processes,shm
//! parchunk --profile bench --kernel square --json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{ParchunkError, Result};
use crate::exec::Mode;
use crate::kernel::Kernel;

#[derive(Parser, Debug, Clone)]
#[command(name = "parchunk", version, about = "Chunked parallel array transforms")]
pub struct Config {
    /// Print span timings to stderr
    #[arg(long, global = true)]
    pub profile: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compare execution modes on synthetic data
    Bench(BenchArgs),

    /// Process one chunk (started by the coordinator)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    /// Number of elements in the input array
    #[arg(long, default_value_t = 10_000_000)]
    pub size: usize,

    /// Worker counts to try
    #[arg(long, value_delimiter = ',', default_values_t = [2, 4, 8, 16])]
    pub workers: Vec<usize>,

    /// Modes to compare against the sequential baseline
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = [Mode::SharedSpace, Mode::IsolatedSpace, Mode::IsolatedSharedBuffer]
    )]
    pub modes: Vec<Mode>,

    /// Elementwise transform
    #[arg(long, default_value = "sin-cos-identity")]
    pub kernel: Kernel,

    /// Timed runs per configuration (after one warm-up run)
    #[arg(long, default_value_t = 3)]
    pub repeats: usize,

    /// Seed for the input array
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Directory for shared segments (default: /dev/shm or the temp dir)
    #[arg(long)]
    pub shm_dir: Option<PathBuf>,

    /// Maximum absolute difference from the baseline
    #[arg(long, default_value_t = 1e-9)]
    pub tolerance: f64,

    /// Emit one JSON object per line instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long)]
    pub kernel: Kernel,

    /// Chunk index, used in error messages
    #[arg(long)]
    pub chunk: usize,

    /// First element of the chunk in the full array
    #[arg(long)]
    pub start: usize,

    /// One past the last element of the chunk
    #[arg(long)]
    pub end: usize,

    /// Shared segment to write results into instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Transform the segment's range in place; stdin is not read
    #[arg(long, requires = "output")]
    pub in_place: bool,
}

impl Config {
    /// Parse the process arguments and validate them
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Bench(args) => args.validate(),
            Command::Worker(_) => Ok(()),
        }
    }
}

impl BenchArgs {
    pub fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            return Err(ParchunkError::config("--workers needs at least one value"));
        }
        if let Some(&w) = self.workers.iter().find(|&&w| w == 0) {
            return Err(ParchunkError::InvalidWorkerCount { workers: w });
        }
        if self.repeats == 0 {
            return Err(ParchunkError::config("--repeats must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ParchunkError::config(format!(
                "--tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench_args(argv: &[&str]) -> BenchArgs {
        let mut full = vec!["parchunk", "bench"];
        full.extend_from_slice(argv);
        match Config::try_parse_from(full).unwrap().command {
            Command::Bench(args) => args,
            other => panic!("expected bench, got {:?}", other),
        }
    }

    #[test]
    fn test_bench_defaults() {
        let args = bench_args(&[]);
        assert_eq!(args.workers, vec![2, 4, 8, 16]);
        assert_eq!(
            args.modes,
            vec![Mode::SharedSpace, Mode::IsolatedSpace, Mode::IsolatedSharedBuffer]
        );
        assert_eq!(args.kernel, Kernel::SinCosIdentity);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_bench_lists_and_aliases() {
        let args = bench_args(&[
            "--workers",
            "1,3",
            "--modes",
            "threads,shm",
            "--kernel",
            "scale=0.5",
        ]);
        assert_eq!(args.workers, vec![1, 3]);
        assert_eq!(args.modes, vec![Mode::SharedSpace, Mode::IsolatedSharedBuffer]);
        assert_eq!(args.kernel, Kernel::Scale(0.5));
    }

    #[test]
    fn test_zero_workers_invalid() {
        let args = bench_args(&["--workers", "2,0"]);
        assert!(matches!(
            args.validate(),
            Err(ParchunkError::InvalidWorkerCount { workers: 0 })
        ));
    }

    #[test]
    fn test_zero_repeats_invalid() {
        let args = bench_args(&["--repeats", "0"]);
        assert!(matches!(args.validate(), Err(ParchunkError::Config { .. })));
    }

    #[test]
    fn test_worker_args() {
        let config = Config::try_parse_from([
            "parchunk", "worker", "--kernel", "square", "--chunk", "2", "--start", "6", "--end",
            "10",
        ])
        .unwrap();
        match config.command {
            Command::Worker(args) => {
                assert_eq!(args.kernel, Kernel::Square);
                assert_eq!((args.chunk, args.start, args.end), (2, 6, 10));
                assert!(args.output.is_none());
                assert!(!args.in_place);
            }
            other => panic!("expected worker, got {:?}", other),
        }
    }

    #[test]
    fn test_in_place_requires_output() {
        let parsed = Config::try_parse_from([
            "parchunk", "worker", "--kernel", "square", "--chunk", "0", "--start", "0", "--end",
            "1",
            "--in-place",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_unknown_kernel_rejected() {
        let parsed = Config::try_parse_from(["parchunk", "bench", "--kernel", "cube"]);
        assert!(parsed.is_err());
    }
}
