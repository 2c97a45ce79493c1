//! Blob store errors.

use thiserror::Error;

/// Failures from an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The storage name is taken. Existing blobs are never replaced.
    #[error("blob already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The name is not a single plain component under the root.
    #[error("invalid storage name: {0}")]
    InvalidKey(String),

    /// The staged upload grew past the configured ceiling.
    #[error("upload exceeds limit of {limit} bytes")]
    LimitExceeded { limit: u64 },

    #[error("storage configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
