//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

use crate::exec::Mode;

/// Main error type for parchunk operations
#[derive(Error, Debug)]
pub enum ParchunkError {
    /// Worker count of zero (signaled before any dispatch)
    #[error("worker count must be at least 1, got {workers}")]
    InvalidWorkerCount { workers: usize },

    /// Mode cannot run the requested transform (closures cannot cross a process boundary)
    #[error("mode {mode} cannot run this transform: {message}")]
    UnsupportedMode { mode: Mode, message: String },

    /// A chunk failed while being computed
    #[error("worker {chunk} failed on chunk [{start}, {end}): {message}")]
    Worker {
        chunk: usize,
        start: usize,
        end: usize,
        message: String,
    },

    /// Worker process could not be started
    #[error("failed to spawn worker {chunk} ({program}): {source}")]
    Spawn {
        chunk: usize,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Shared memory segment could not be created, mapped, or released
    #[error("shared memory segment '{name}': {source}")]
    SharedMemory {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed data crossing a process or buffer boundary
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Rayon pool construction failure
    #[error("thread pool error: {message}")]
    ThreadPool { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O errors outside of shared memory handling
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results using ParchunkError
pub type Result<T> = std::result::Result<T, ParchunkError>;

impl ParchunkError {
    /// Create a worker failure for a chunk
    pub fn worker(chunk: usize, start: usize, end: usize, message: impl Into<String>) -> Self {
        Self::Worker {
            chunk,
            start,
            end,
            message: message.into(),
        }
    }

    /// Create a shared memory error
    pub fn shared_memory(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::SharedMemory {
            name: name.into(),
            source,
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Chunk index of a worker failure, if this is one
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            Self::Worker { chunk, .. } | Self::Spawn { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for ParchunkError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_error_message() {
        let err = ParchunkError::worker(2, 6, 10, "negative input");
        assert_eq!(
            err.to_string(),
            "worker 2 failed on chunk [6, 10): negative input"
        );
        assert_eq!(err.failed_chunk(), Some(2));
    }

    #[test]
    fn test_shared_memory_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists");
        let err = ParchunkError::shared_memory("seg", io);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.failed_chunk(), None);
    }
}
