//! # parchunk
//!
//! Chunked parallel elementwise transforms over `f64` arrays.
//!
//! An input array is split into one contiguous chunk per worker, every chunk
//! is transformed by a pure kernel, and the results are reassembled in the
//! original order. Workers are threads, child processes returning results
//! over pipes, or child processes writing into a shared memory segment.
//!
//! ```
//! use parchunk::{transform, Kernel, Mode};
//!
//! let input: Vec<f64> = (0..10).map(|i| i as f64).collect();
//! let out = transform(&input, &Kernel::Square, 3, Mode::SharedSpace).unwrap();
//! assert_eq!(out[9], 81.0);
//! ```
//!
//! ## Module Structure
//! ```text
//! parchunk
//! ├── partition   # [start, end) ranges, one per worker
//! ├── kernel      # named elementwise transforms
//! ├── exec        # execution modes and the worker process entry
//! ├── shm         # named shared segments (/dev/shm)
//! ├── bench       # mode comparison harness for the CLI
//! ├── config      # CLI arguments
//! └── utils       # thread pools, pipe wire format
//! ```

pub mod bench;
pub mod config;
pub mod error;
pub mod exec;
pub mod kernel;
pub mod partition;
pub mod shm;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ParchunkError, Result};
pub use exec::{transform, Executor, ExecutorConfig, Mode, WorkerProgram};
pub use kernel::{Kernel, KernelError};
pub use partition::{partition, ChunkRange, Partition};
pub use shm::{SharedBuffer, SharedRegion};
