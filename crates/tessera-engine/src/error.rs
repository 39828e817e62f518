//! Error types.
//!
//! Structural misuse of a quad arena (bad index, capacity overrun) is reported
//! immediately through [`ArenaError`]. Image loading failures travel through
//! the texture cache callbacks as [`LoadError`] values.

use thiserror::Error;

/// Failure of a quad arena or atlas operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// `index` is outside the valid range `0..len` (or `0..=len` for inserts).
    #[error("quad index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// `grow` was asked for a capacity that is not larger than the current one.
    #[error("requested capacity {requested} does not exceed current capacity {current}")]
    CapacityNotIncreased { current: usize, requested: usize },

    /// The capacity cannot be addressed with 16-bit vertex indices.
    #[error("capacity {requested} exceeds the 16-bit index limit of {max} quads")]
    IndexRangeExceeded { requested: usize, max: usize },

    /// The allocator refused the new backing store.
    #[error("failed to allocate {bytes} bytes of quad storage")]
    AllocationFailure { bytes: usize },
}

/// Failure of an asynchronous image load.
///
/// `Clone` so a single failure can be delivered to every waiter of a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to read image {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to decode image {path}: {message}")]
    Decode { path: String, message: String },

    /// The executor refused the load task (typically because it was shut down).
    #[error("failed to schedule image load: {0}")]
    Spawn(String),
}
