//! Client construction errors.

use thiserror::Error;

/// Errors building HTTP collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias for client construction.
pub type Result<T> = std::result::Result<T, ClientError>;
