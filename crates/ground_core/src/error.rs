//! Error types for ground_core

use thiserror::Error;

/// Errors raised by math and color helpers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A zero-length vector or otherwise degenerate input reached an
    /// operation that needs a well-defined direction
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// A hex color string could not be parsed
    #[error("invalid hex color: {0}")]
    InvalidHex(String),
}

/// Result type for ground_core operations
pub type Result<T> = std::result::Result<T, CoreError>;
