//! Application state shared across handlers.

use dss_core::config::AppConfig;
use dss_core::{RandomNameGenerator, StorageNameGenerator};
use dss_metadata::MetadataStore;
use dss_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Blob store.
    pub storage: Arc<dyn ObjectStore>,
    /// Catalog and token store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Source of storage names for new uploads.
    pub names: Arc<dyn StorageNameGenerator>,
}

impl AppState {
    /// Create a new application state with random storage names.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            storage,
            metadata,
            names: Arc::new(RandomNameGenerator),
        }
    }

    /// Replace the storage name generator.
    pub fn with_name_generator(mut self, names: Arc<dyn StorageNameGenerator>) -> Self {
        self.names = names;
        self
    }
}
