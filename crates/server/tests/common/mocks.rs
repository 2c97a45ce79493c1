//! Test doubles for the storage seams.

use async_trait::async_trait;
use bytes::Bytes;
use dss_core::StorageNameGenerator;
use dss_storage::{ByteStream, ObjectMeta, ObjectStore, StorageError, StorageResult, StreamingUpload};
use std::sync::Arc;

/// Hands out the same storage name every time.
#[allow(dead_code)]
pub struct FixedNameGenerator(pub String);

impl StorageNameGenerator for FixedNameGenerator {
    fn generate(&self, _original_name: &str) -> String {
        self.0.clone()
    }
}

/// Wraps a real store but fails every commit after staging succeeds.
#[allow(dead_code)]
pub struct FailingCommitStore {
    pub inner: Arc<dyn ObjectStore>,
}

#[async_trait]
impl ObjectStore for FailingCommitStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let upload = self.inner.put_stream(key).await?;
        Ok(Box::new(FailingCommit { upload }))
    }

    fn backend_name(&self) -> &'static str {
        "failing-commit"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

struct FailingCommit {
    upload: Box<dyn StreamingUpload>,
}

#[async_trait]
impl StreamingUpload for FailingCommit {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.upload.write(data).await
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        self.upload.abort().await?;
        Err(StorageError::Io(std::io::Error::other("injected commit failure")))
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.upload.abort().await
    }
}
