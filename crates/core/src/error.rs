//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("malformed receipt: {0}")]
    Receipt(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
