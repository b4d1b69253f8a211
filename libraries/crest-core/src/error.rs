//! Error types shared across the Crest libraries

use thiserror::Error;

/// Result type for Crest operations
pub type Result<T> = std::result::Result<T, CrestError>;

/// Errors that can occur while building or combining sample buffers
///
/// Every operation in the processing libraries is all-or-nothing: on success
/// a fully built buffer is returned by value, on failure only the error
/// escapes and no partially written buffer is observable.
#[derive(Error, Debug)]
pub enum CrestError {
    /// Buffer construction failed
    #[error("buffer allocation failed ({bytes} bytes requested)")]
    AllocationFailure {
        /// Number of bytes the failed reservation asked for
        bytes: usize,
    },

    /// Two samples were combined but their channel counts differ
    #[error("channel count mismatch: {left} vs {right}")]
    ChannelCountMismatch {
        /// Channel count of the first operand
        left: usize,
        /// Channel count of the second operand
        right: usize,
    },

    /// A required input was missing or out of its valid domain
    #[error("bad arguments: {0}")]
    BadArguments(&'static str),
}
