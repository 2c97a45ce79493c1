//! The blob store seam.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Blob store addressed by generated storage names.
///
/// Keys are relative names directly under the store root. Implementations
/// reject keys that would resolve anywhere else.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Whether a committed blob exists under `key`. Staging files never count.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Size of a committed blob.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Stream a committed blob in chunks.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Store a small object in one call. Fails with `AlreadyExists` if the
    /// key is taken.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Start a staged upload for `key`.
    ///
    /// Bytes go to a staging file that is not visible under `key` until
    /// [`StreamingUpload::finish`] commits it.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Short backend label for logs.
    fn backend_name(&self) -> &'static str;

    /// Confirm the store root is usable. Backs the heartbeat.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// What `head` reports about a committed blob.
#[derive(Clone, Copy, Debug)]
pub struct ObjectMeta {
    pub size: u64,
}

/// A staged upload.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Append a chunk to the staging file.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Commit the staged bytes under the final key and return the total bytes
    /// written. Fails with `AlreadyExists` without touching an existing object.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Discard the staged bytes.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
