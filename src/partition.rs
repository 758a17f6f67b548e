//! # Chunk Partitioning
//!
//! Splits `[0, n)` into one contiguous range per worker. Every worker but the
//! last receives `n / workers` elements; the last one absorbs the remainder.
//!
//! ```
//! use parchunk::partition::partition;
//!
//! let p = partition(10, 3).unwrap();
//! let ranges: Vec<_> = p.iter().map(|c| c.as_range()).collect();
//! assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
//! ```

use std::ops::Range;

use crate::error::{ParchunkError, Result};

/// Half-open index range `[start, end)` assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Returns the number of elements in this chunk
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if this chunk has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Chunk layout of `[0, n)` across `workers` workers
///
/// Only the chunks that hold elements are stored, tagged with their worker
/// index, so the layout costs `min(workers, n)` entries however large the
/// worker count. When `workers > n` every chunk but the last is empty.
/// `validate()` re-checks disjointness before anything writes through a
/// shared buffer.
#[derive(Debug, Clone)]
pub struct Partition {
    n: usize,
    workers: usize,
    active: Vec<(usize, ChunkRange)>,
}

impl Partition {
    /// Total number of elements being partitioned
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of chunks (equals the worker count)
    pub fn num_chunks(&self) -> usize {
        self.workers
    }

    /// Range of chunk `idx`, or `None` past the last worker
    pub fn chunk(&self, idx: usize) -> Option<ChunkRange> {
        if idx >= self.workers {
            return None;
        }
        let base = self.n / self.workers;
        let start = idx * base;
        let end = if idx == self.workers - 1 { self.n } else { start + base };
        Some(ChunkRange::new(start, end))
    }

    /// Every chunk in worker order, empty ones included
    pub fn iter(&self) -> impl Iterator<Item = ChunkRange> + '_ {
        (0..self.workers).filter_map(move |idx| self.chunk(idx))
    }

    /// Non-empty chunks in order, with their worker index
    pub fn active(&self) -> &[(usize, ChunkRange)] {
        &self.active
    }

    /// Verify the non-empty ranges are contiguous, in order, and cover
    /// `[0, n)` exactly once
    pub fn validate(&self) -> Result<()> {
        let mut expected_start = 0;
        let mut last_idx = None;
        for &(idx, chunk) in &self.active {
            if idx >= self.workers || last_idx.is_some_and(|last| idx <= last) {
                return Err(ParchunkError::protocol(format!(
                    "chunk index {} out of order for {} workers",
                    idx, self.workers
                )));
            }
            if chunk.start != expected_start || chunk.end <= chunk.start {
                return Err(ParchunkError::protocol(format!(
                    "chunk {} [{}, {}) does not start at {}",
                    idx, chunk.start, chunk.end, expected_start
                )));
            }
            expected_start = chunk.end;
            last_idx = Some(idx);
        }
        if expected_start != self.n {
            return Err(ParchunkError::protocol(format!(
                "chunks cover [0, {}) but array length is {}",
                expected_start, self.n
            )));
        }
        Ok(())
    }
}

/// Partition `[0, n)` into `workers` contiguous chunks
///
/// With `base = n / workers`, chunks `0..workers-1` hold `base` elements and
/// the last holds `n - base * (workers - 1)`. When `workers > n` the leading
/// chunks are empty.
pub fn partition(n: usize, workers: usize) -> Result<Partition> {
    if workers == 0 {
        return Err(ParchunkError::InvalidWorkerCount { workers });
    }

    let base = n / workers;
    let active = if base == 0 {
        // Only the last chunk holds anything.
        if n == 0 {
            Vec::new()
        } else {
            vec![(workers - 1, ChunkRange::new(0, n))]
        }
    } else {
        // base > 0 implies workers <= n.
        (0..workers)
            .map(|i| {
                let start = i * base;
                let end = if i == workers - 1 { n } else { start + base };
                (i, ChunkRange::new(start, end))
            })
            .collect()
    };

    Ok(Partition { n, workers, active })
}
