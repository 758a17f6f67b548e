//! # Worker Wire Format
//!
//! Chunks cross the process boundary as raw native-endian `f64` bytes:
//! coordinator and worker are the same binary on the same machine.

use bytemuck::pod_read_unaligned;

use crate::error::{ParchunkError, Result};

const ELEM_BYTES: usize = std::mem::size_of::<f64>();

/// Borrow a chunk as bytes for writing to a pipe
pub fn encode(values: &[f64]) -> &[u8] {
    bytemuck::cast_slice(values)
}

/// Decode bytes read from a pipe
///
/// Pipe buffers carry no alignment guarantee, so values are read unaligned.
pub fn decode(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % ELEM_BYTES != 0 {
        return Err(ParchunkError::protocol(format!(
            "payload of {} bytes is not a whole number of f64 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(ELEM_BYTES)
        .map(pod_read_unaligned::<f64>)
        .collect())
}

/// Decode and check the element count
pub fn decode_exact(bytes: &[u8], expected: usize) -> Result<Vec<f64>> {
    let values = decode(bytes)?;
    if values.len() != expected {
        return Err(ParchunkError::protocol(format!(
            "expected {} values, received {}",
            expected,
            values.len()
        )));
    }
    Ok(values)
}
