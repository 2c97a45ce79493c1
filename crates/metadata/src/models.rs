//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A catalog entry for one stored file.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FileRow {
    /// Public key handed to clients.
    pub key: Uuid,
    /// Generated blob name, relative to the storage root.
    pub storage_path: String,
    /// Sanitized client file name, for display only.
    pub original_name: Option<String>,
    pub tags: Vec<String>,
    /// Lowercase hex SHA-256 of the blob; absent on rows not yet reconciled.
    pub hash: Option<String>,
    pub size_bytes: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields supplied when cataloging a new upload. The store assigns the key
/// and timestamps.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub storage_path: String,
    pub original_name: Option<String>,
    pub tags: Vec<String>,
    pub hash: Option<String>,
    pub size_bytes: i64,
}

/// Access token record. Only the SHA-256 of the secret is stored.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub id: i64,
    pub token_hash: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}
