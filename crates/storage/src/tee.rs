//! Single-pass upload plumbing: hash, count, and stage in one write.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, StreamingUpload};
use bytes::Bytes;
use dss_core::{ContentHash, ContentHasher};
use futures::StreamExt;

/// Feeds each chunk to a SHA-256 hasher and a staged upload while enforcing a
/// byte ceiling.
pub struct TeeUpload {
    upload: Box<dyn StreamingUpload>,
    hasher: ContentHasher,
    written: u64,
    limit: u64,
}

impl TeeUpload {
    pub fn new(upload: Box<dyn StreamingUpload>, limit: u64) -> Self {
        Self {
            upload,
            hasher: ContentHash::hasher(),
            written: 0,
            limit,
        }
    }

    /// Write one chunk. Fails with `LimitExceeded` before writing anything
    /// that would take the total past the ceiling.
    pub async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        let len = data.len() as u64;
        if self.written.saturating_add(len) > self.limit {
            return Err(StorageError::LimitExceeded { limit: self.limit });
        }
        self.hasher.update(&data);
        self.upload.write(data).await?;
        self.written += len;
        Ok(())
    }

    /// Bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Stop writing and hand back the staged blob with its digest and size.
    pub fn seal(self) -> StagedBlob {
        StagedBlob {
            upload: self.upload,
            hash: self.hasher.finalize(),
            size: self.written,
        }
    }

    /// Discard everything written so far.
    pub async fn abort(self) -> StorageResult<()> {
        self.upload.abort().await
    }
}

/// A fully written staging file waiting to be committed.
pub struct StagedBlob {
    upload: Box<dyn StreamingUpload>,
    hash: ContentHash,
    size: u64,
}

impl StagedBlob {
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Make the blob visible under its storage name.
    pub async fn commit(self) -> StorageResult<u64> {
        self.upload.finish().await
    }

    pub async fn abort(self) -> StorageResult<()> {
        self.upload.abort().await
    }
}

/// Hash a stored object's bytes, returning the digest and byte count.
pub async fn digest_stream(mut stream: ByteStream) -> StorageResult<(ContentHash, u64)> {
    let mut hasher = ContentHash::hasher();
    let mut size = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len() as u64;
        hasher.update(&chunk);
    }
    Ok((hasher.finalize(), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FilesystemBackend;
    use crate::traits::ObjectStore;

    #[tokio::test]
    async fn test_tee_hashes_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let mut tee = TeeUpload::new(backend.put_stream("blob").await.unwrap(), 1024);
        tee.write(Bytes::from("hello ")).await.unwrap();
        tee.write(Bytes::from("world")).await.unwrap();
        assert_eq!(tee.bytes_written(), 11);

        let staged = tee.seal();
        assert_eq!(staged.hash(), ContentHash::compute(b"hello world"));
        assert_eq!(staged.size(), 11);
        assert!(!backend.exists("blob").await.unwrap());

        staged.commit().await.unwrap();
        let (hash, size) = digest_stream(backend.get_stream("blob").await.unwrap())
            .await
            .unwrap();
        assert_eq!(hash, ContentHash::compute(b"hello world"));
        assert_eq!(size, 11);
    }

    #[tokio::test]
    async fn test_limit_is_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let mut tee = TeeUpload::new(backend.put_stream("exact").await.unwrap(), 4);
        tee.write(Bytes::from("abcd")).await.unwrap();
        tee.seal().commit().await.unwrap();
        assert!(backend.exists("exact").await.unwrap());
    }

    #[tokio::test]
    async fn test_limit_exceeded_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).await.unwrap();

        let mut tee = TeeUpload::new(backend.put_stream("big").await.unwrap(), 8);
        tee.write(Bytes::from("12345")).await.unwrap();
        let err = tee.write(Bytes::from("67890")).await.unwrap_err();
        assert!(matches!(err, StorageError::LimitExceeded { limit: 8 }));
        assert_eq!(tee.bytes_written(), 5);

        tee.abort().await.unwrap();
        assert!(!backend.exists("big").await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
