//! # parchunk: chunked parallel array transforms
//!
//! ## Usage
//! ```bash
//! # Compare threads, processes, and shared-memory processes
//! parchunk bench --size 100000000 --workers 2,4,8,16
//!
//! # With span timings
//! parchunk --profile bench --modes shm --kernel square
//! ```
//!
//! The hidden `worker` subcommand is what isolated-space modes start for
//! each chunk; it reports failures on stderr with a non-zero exit status.

use std::io;
use std::time::Instant;

use parchunk::bench::{run_bench, write_json_lines, write_table};
use parchunk::config::{BenchArgs, Command, Config};
use parchunk::exec::worker::run_worker;
use parchunk::utils::threading::available_threads;
use parchunk::{Executor, ExecutorConfig, Result};

fn main() {
    let config = match Config::parse_and_validate() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match &config.command {
        // Workers never log: stderr carries only the failure message.
        Command::Worker(args) => {
            if let Err(e) = run_worker(args, io::stdin().lock(), io::stdout().lock()) {
                eprintln!("{:#}", e);
                std::process::exit(2);
            }
        }
        Command::Bench(args) => {
            if config.profile {
                init_profiling();
            }
            if let Err(e) = bench(args) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Initialize tracing subscriber for hierarchical profiling output
fn init_profiling() {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .init();
}

fn bench(args: &BenchArgs) -> Result<()> {
    let start = Instant::now();

    let mut exec_config = ExecutorConfig::default();
    if let Some(dir) = &args.shm_dir {
        exec_config = exec_config.with_shm_dir(dir);
    }
    let executor = Executor::new(exec_config);

    eprintln!("parchunk v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Kernel: {}  Size: {}  Repeats: {}", args.kernel, args.size, args.repeats);
    eprintln!("Available threads: {}", available_threads());

    let records = run_bench(args, &executor)?;
    let stdout = io::stdout().lock();
    if args.json {
        write_json_lines(&records, stdout)?;
    } else {
        write_table(&records, stdout)?;
    }

    for r in records.iter().filter(|r| !r.matches_baseline) {
        eprintln!(
            "Warning: {} with {} workers differs from sequential by {:e}",
            r.mode, r.workers, r.max_abs_diff
        );
    }

    eprintln!("Completed in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
