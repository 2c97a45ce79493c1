//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid sort_by value: {0}")]
    InvalidSortField(String),

    #[error("invalid order value: {0}")]
    InvalidSortOrder(String),

    #[error("invalid tag: {0}")]
    InvalidTag(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
