//! Error type for table construction and explicit resizing.

use std::collections::TryReserveError;
use thiserror::Error;

/// Result alias used by fallible table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Recoverable failures. Precondition violations (double linking, foreign
/// cursors, resizing under an open cursor) panic instead.
#[derive(Error, Debug)]
pub enum TableError {
    /// The bucket array could not be allocated.
    #[error("failed to allocate {buckets} buckets")]
    Alloc {
        buckets: usize,
        #[source]
        source: TryReserveError,
    },

    /// A table needs at least one bucket.
    #[error("bucket count must be non-zero")]
    ZeroBuckets,

    /// A resize policy field is out of range.
    #[error("invalid resize policy: {0}")]
    InvalidPolicy(&'static str),

    /// Static tables use caller storage of a fixed length.
    #[error("static tables cannot be resized")]
    StaticResize,
}
