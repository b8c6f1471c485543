//! Error types for VPD page decoding and retrieval

use thiserror::Error;

/// VPD decoding errors
///
/// A page without a logical-unit NAA descriptor is not an error: lookups
/// return `Ok(None)` in that case.
#[derive(Debug, Error)]
pub enum VpdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed VPD page: {0}")]
    MalformedPage(String),

    #[error("Unsupported VPD page layout: {0}")]
    UnsupportedLayout(String),

    #[error("Invalid block device: {0}")]
    InvalidDevice(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for VPD operations
pub type VpdResult<T> = Result<T, VpdError>;
