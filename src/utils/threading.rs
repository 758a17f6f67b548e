//! # Threading Configuration
//!
//! Configure rayon thread pools for the shared-space execution mode.
//!
//! A dedicated pool is built per transform so that the requested worker
//! count is honoured exactly, independent of the global rayon pool.

use rayon::ThreadPool;

use crate::error::{ParchunkError, Result};

/// Create a pool of `n_threads` threads named `<prefix>-<i>`
pub fn build_thread_pool(n_threads: usize, prefix: &str) -> Result<ThreadPool> {
    if n_threads == 0 {
        return Err(ParchunkError::InvalidWorkerCount { workers: n_threads });
    }
    let prefix = prefix.to_string();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(move |i| format!("{}-{}", prefix, i))
        .build()?;
    Ok(pool)
}

/// Number of threads to use when the caller asks for "all cores"
pub fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
