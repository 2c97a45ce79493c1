//! Blob store on a local directory.
//!
//! Blobs are flat files directly under the root. Staged uploads are written
//! to `<key>.tmp.<uuid>` next to their final location and committed with a
//! hard link, which fails instead of replacing an existing blob.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ObjectMeta, ObjectStore, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Read size for streamed blobs.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Flat directory of blobs named by storage name.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Open the store at `root`, creating the directory if needed. An empty
    /// path is refused.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        if root.as_os_str().is_empty() {
            return Err(StorageError::Config(
                "storage root path is empty".to_string(),
            ));
        }
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve `key` on the blocking pool, since confinement canonicalizes
    /// and stats paths.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_name(key)?;
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || confine(&root, &key))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(format!("resolver task: {e}"))))?
    }

    fn not_found_or_io(key: &str, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// A storage name is exactly one normal path component.
fn validate_name(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty name".to_string()));
    }
    if key.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidKey(format!("separator in name: {key}")));
    }
    let mut components = Path::new(key).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(StorageError::InvalidKey(format!("not a plain file name: {key}")));
    }
    Ok(())
}

fn with_context(e: std::io::Error, what: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(e.kind(), format!("{what}: {e}")))
}

/// Join `key` onto `root`, refusing an existing entry (a planted symlink,
/// say) that resolves outside the root.
fn confine(root: &Path, key: &str) -> StorageResult<PathBuf> {
    let path = root.join(key);
    let meta = match std::fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(path),
        Err(e) => return Err(with_context(e, "stat blob path")),
    };

    let root_real = root
        .canonicalize()
        .map_err(|e| with_context(e, "resolve storage root"))?;
    let real = match path.canonicalize() {
        Ok(real) => real,
        Err(_) if meta.file_type().is_symlink() => {
            return Err(StorageError::InvalidKey(format!("dangling symlink: {key}")));
        }
        Err(e) => return Err(with_context(e, "resolve blob path")),
    };
    if !real.starts_with(&root_real) {
        return Err(StorageError::InvalidKey(format!(
            "resolved path escapes storage root: {key}"
        )));
    }
    Ok(path)
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let path = self.key_path(key).await?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::not_found_or_io(key, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(ObjectMeta {
            size: metadata.len(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.key_path(key).await?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::not_found_or_io(key, e))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let mut upload = self.put_stream(key).await?;
        if let Err(e) = upload.write(data).await {
            let _ = upload.abort().await;
            return Err(e);
        }
        upload.finish().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let path = self.key_path(key).await?;
        if fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        // Unique suffix so concurrent uploads never share a staging file.
        let temp_path = self.root.join(format!("{key}.tmp.{}", Uuid::new_v4()));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(Box::new(FilesystemUpload {
            key: key.to_string(),
            file,
            temp_path,
            final_path: path,
            bytes_written: 0,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root)
            .await
            .map_err(|e| with_context(e, "storage root not accessible"))?;
        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root {} is not a directory", self.root.display()),
            )));
        }
        Ok(())
    }
}

/// Staged upload for the filesystem backend.
struct FilesystemUpload {
    key: String,
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        let FilesystemUpload {
            key,
            file,
            temp_path,
            final_path,
            bytes_written,
        } = *self;

        if let Err(e) = file.sync_all().await {
            drop(file);
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        drop(file);

        // hard_link never replaces an existing target.
        let linked = fs::hard_link(&temp_path, &final_path).await;
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(path = ?temp_path, error = %e, "Failed to remove staging file");
        }

        match linked {
            Ok(()) => {
                sync_parent(&final_path).await;
                Ok(bytes_written)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}

/// Flush the directory entry of a freshly committed blob.
#[cfg(unix)]
async fn sync_parent(path: &Path) {
    let Some(parent) = path.parent() else {
        return;
    };
    let result = async { fs::File::open(parent).await?.sync_all().await }.await;
    if let Err(e) = result {
        warn!(dir = ?parent, error = %e, "Failed to sync storage directory");
    }
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) {}
