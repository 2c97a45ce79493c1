//! Blob storage for DSS.
//!
//! This crate provides:
//! - The `ObjectStore` abstraction over a store addressed by generated names
//! - Staged uploads that only become visible once committed
//! - `TeeUpload`, which hashes, counts, and stages a body in one pass
//! - The local filesystem backend

pub mod backends;
pub mod error;
pub mod tee;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use tee::{StagedBlob, TeeUpload, digest_stream};
pub use traits::{ByteStream, ObjectMeta, ObjectStore, StreamingUpload};

use dss_core::config::StorageConfig;
use std::sync::Arc;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    config.validate().map_err(StorageError::Config)?;
    let backend = FilesystemBackend::new(&config.path).await?;
    Ok(Arc::new(backend))
}
