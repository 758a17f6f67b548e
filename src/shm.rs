//! # Shared Memory Segments
//!
//! Named, file-backed `f64` buffers that several processes can map at once.
//! On Linux the backing file lives in `/dev/shm`, so the pages never touch a
//! disk; elsewhere the temp dir is used.
//!
//! ## Ownership
//! - **`SharedBuffer`** is owned by the coordinator. It creates the file with
//!   exclusive-create semantics, maps the whole segment, and removes the file
//!   on `release()` or, failing that, on `Drop`. Release happens once.
//! - **`SharedRegion`** is what a worker process maps: only its own
//!   `[start, end)` element range of an existing segment.
//!
//! Both mappings are `MAP_SHARED` views of the same file, so a write through
//! a region is visible through the coordinator's buffer once the worker has
//! exited. Nothing is copied between them.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};

use crate::error::{ParchunkError, Result};

const ELEM_BYTES: usize = std::mem::size_of::<f64>();

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory used for segments when none is configured
pub fn default_shm_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// Segment name unique within this process and across concurrent processes
pub fn unique_name(prefix: &str) -> String {
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", prefix, std::process::id(), n)
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        return Err(ParchunkError::shared_memory(
            name,
            io::Error::new(io::ErrorKind::InvalidInput, "segment name must be a plain file name"),
        ));
    }
    Ok(())
}

fn byte_len(name: &str, len: usize) -> Result<usize> {
    len.checked_mul(ELEM_BYTES).ok_or_else(|| {
        ParchunkError::shared_memory(
            name,
            io::Error::new(io::ErrorKind::InvalidInput, "segment size overflows usize"),
        )
    })
}

/// Coordinator-owned shared segment of `len` f64 values
#[derive(Debug)]
pub struct SharedBuffer {
    name: String,
    path: PathBuf,
    len: usize,
    /// `None` for zero-length segments, which cannot be mapped
    map: Option<MmapMut>,
    released: bool,
}

impl SharedBuffer {
    /// Create a zero-filled segment `dir/name` holding `len` values
    ///
    /// Fails if the name is already taken. On any failure after the file
    /// was created, the file is removed before returning.
    pub fn create(dir: &Path, name: &str, len: usize) -> Result<Self> {
        validate_name(name)?;
        let bytes = byte_len(name, len)?;
        let path = dir.join(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ParchunkError::shared_memory(name, e))?;

        match Self::size_and_map(&file, bytes) {
            Ok(map) => {
                tracing::debug!(
                    segment = name,
                    len,
                    path = %path.display(),
                    "created shared segment"
                );
                Ok(Self {
                    name: name.to_string(),
                    path,
                    len,
                    map,
                    released: false,
                })
            }
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&path);
                Err(ParchunkError::shared_memory(name, e))
            }
        }
    }

    fn size_and_map(file: &File, bytes: usize) -> io::Result<Option<MmapMut>> {
        file.set_len(bytes as u64)?;
        if bytes == 0 {
            return Ok(None);
        }
        // SAFETY: the file was just created exclusively by us and sized once.
        // Other processes only map disjoint sub-ranges of it, and the length
        // never changes while this mapping is alive.
        let map = unsafe { MmapMut::map_mut(file)? };
        Ok(Some(map))
    }

    /// Create a segment initialised with a copy of `data`
    pub fn from_slice(dir: &Path, name: &str, data: &[f64]) -> Result<Self> {
        let mut buffer = Self::create(dir, name, data.len())?;
        buffer.as_mut_slice().copy_from_slice(data);
        Ok(buffer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path workers use to map the segment
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of f64 values
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        match &self.map {
            // The mapping is page-aligned and a multiple of 8 bytes long.
            Some(map) => bytemuck::cast_slice(&map[..]),
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        match &mut self.map {
            Some(map) => bytemuck::cast_slice_mut(&mut map[..]),
            None => &mut [],
        }
    }

    /// Copy the segment into an owned vector
    pub fn to_vec(&self) -> Vec<f64> {
        self.as_slice().to_vec()
    }

    /// Unmap and unlink the segment
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
            .map_err(|e| ParchunkError::shared_memory(self.name.clone(), e))
    }

    fn release_inner(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.map.take();
        fs::remove_file(&self.path)?;
        tracing::debug!(segment = %self.name, "released shared segment");
        Ok(())
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!(segment = %self.name, error = %e, "failed to release shared segment");
        }
    }
}

/// Worker-side mapping of elements `[start, end)` of an existing segment
#[derive(Debug)]
pub struct SharedRegion {
    start: usize,
    end: usize,
    map: Option<MmapMut>,
}

impl SharedRegion {
    /// Map `[start, end)` of the segment at `path`
    ///
    /// The range must lie inside the segment.
    pub fn open(path: &Path, start: usize, end: usize) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if start > end {
            return Err(ParchunkError::protocol(format!(
                "region start {} is past its end {}",
                start, end
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ParchunkError::shared_memory(name.as_str(), e))?;
        let file_bytes = file
            .metadata()
            .map_err(|e| ParchunkError::shared_memory(name.as_str(), e))?
            .len();
        let end_bytes = byte_len(&name, end)? as u64;
        if end_bytes > file_bytes {
            return Err(ParchunkError::protocol(format!(
                "region [{}, {}) exceeds segment '{}' of {} values",
                start,
                end,
                name,
                file_bytes / ELEM_BYTES as u64
            )));
        }

        if start == end {
            return Ok(Self { start, end, map: None });
        }

        // SAFETY: the coordinator owns the file and never resizes it while
        // workers run; every worker maps a disjoint element range, so no two
        // mappings write the same bytes.
        let map = unsafe {
            MmapOptions::new()
                .offset((start * ELEM_BYTES) as u64)
                .len((end - start) * ELEM_BYTES)
                .map_mut(&file)
        }
        .map_err(|e| ParchunkError::shared_memory(name.as_str(), e))?;

        Ok(Self {
            start,
            end,
            map: Some(map),
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn as_slice(&self) -> &[f64] {
        match &self.map {
            Some(map) => bytemuck::cast_slice(&map[..]),
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        match &mut self.map {
            // `start * 8` keeps the mapped pointer 8-byte aligned.
            Some(map) => bytemuck::cast_slice_mut(&mut map[..]),
            None => &mut [],
        }
    }
}
