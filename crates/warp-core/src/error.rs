//! Warp engine error types

use thiserror::Error;

use crate::types::MarkerId;

/// Errors that can occur during warp map operations
///
/// Every failure is surfaced synchronously to the immediate caller and
/// leaves the map unchanged; nothing is retried internally.
#[derive(Error, Debug)]
pub enum WarpError {
    /// Operation referenced a marker id that does not exist
    #[error("Marker {id} not found")]
    NotFound { id: MarkerId },

    /// Structurally disallowed action (e.g. removing an anchor)
    #[error("Invalid operation: {0}")]
    InvalidOperation(&'static str),

    /// Malformed parameters (degenerate sample counts, bad tempo or grid values)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for warp map operations
pub type WarpResult<T> = Result<T, WarpError>;
