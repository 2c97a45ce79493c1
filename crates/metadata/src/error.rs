//! Catalog errors.

use thiserror::Error;

/// Catalog and token store errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// An update matched no row.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique column (`files.storage_path`, `tokens.token_hash`) already
    /// holds the value.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("catalog configuration: {0}")]
    Config(String),

    /// The JSON `tags` column could not be read or written.
    #[error("tags column: {0}")]
    Tags(String),
}

pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
