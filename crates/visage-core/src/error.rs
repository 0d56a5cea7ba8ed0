//! Error types for the detection pipeline.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The cascade blob ended before the declared tree tables.
    #[error("truncated cascade blob: expected {expected} bytes, got {actual}")]
    TruncatedBlob {
        /// Byte length implied by the blob header.
        expected: usize,
        /// Actual byte length of the input.
        actual: usize,
    },

    /// The cascade header declares an unusable tree geometry.
    #[error("invalid cascade geometry: depth {depth}, trees {trees}")]
    InvalidGeometry {
        /// Declared tree depth.
        depth: i32,
        /// Declared tree count.
        trees: i32,
    },

    /// Scan or cluster parameters outside their admissible range.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Image buffer does not match the declared dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The call was cancelled through its [`CancelToken`](crate::config::CancelToken).
    #[error("detection cancelled")]
    Cancelled,
}

/// Convenience type alias for Results with our Error type.
pub type Result<T> = std::result::Result<T, Error>;
