//! # Utilities Module
//!
//! Cross-cutting helpers that don't belong in the execution modes.
//!
//! ## Sub-modules
//! - `threading`: Rayon thread pool configuration
//! - `wire`: f64 <-> byte conversion for the worker pipe protocol

pub mod threading;
pub mod wire;
