//! File catalog repository.

use crate::error::MetadataResult;
use crate::models::{FileRow, NewFile};
use async_trait::async_trait;
use dss_core::ListQuery;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for file catalog operations.
#[async_trait]
pub trait FileRepo: Send + Sync {
    /// Insert a new file row and return its generated key.
    ///
    /// Returns `AlreadyExists` when the storage path is already cataloged.
    async fn create_file(&self, file: &NewFile) -> MetadataResult<Uuid>;

    /// Get a file by key.
    async fn get_file(&self, key: Uuid) -> MetadataResult<Option<FileRow>>;

    /// Keys of files matching a validated listing query, in query order.
    async fn list_file_keys(&self, query: &ListQuery) -> MetadataResult<Vec<Uuid>>;

    /// Page through all files ordered by key, starting after `after`.
    async fn scan_files(&self, after: Option<Uuid>, limit: u32) -> MetadataResult<Vec<FileRow>>;

    /// Record a content hash computed out of band.
    async fn set_file_hash(
        &self,
        key: Uuid,
        hash: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Count cataloged files.
    async fn count_files(&self) -> MetadataResult<u64>;
}
