//! Server test utilities.

use dss_core::StorageNameGenerator;
use dss_core::config::{AppConfig, MetadataConfig, StorageConfig};
use dss_metadata::repos::TokenRepo;
use dss_metadata::{MetadataStore, SqliteStore};
use dss_server::auth::hash_token;
use dss_server::{AppState, create_router};
use dss_storage::{FilesystemBackend, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A token every test server accepts.
#[allow(dead_code)]
pub const TEST_TOKEN: &str = "test-token-0123456789";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage_path: PathBuf,
    _temp_dir: TempDir,
}

/// Knobs for building a [`TestServer`].
#[allow(dead_code)]
#[derive(Default)]
pub struct TestOptions {
    pub names: Option<Arc<dyn StorageNameGenerator>>,
    pub wrap_storage: Option<Box<dyn FnOnce(Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore>>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and a SQLite catalog.
    pub async fn new() -> Self {
        Self::build(|_| {}, TestOptions::default()).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(modifier, TestOptions::default()).await
    }

    /// Create a test server that always generates `name` as the storage name.
    pub async fn with_fixed_name(name: &str) -> Self {
        Self::build(
            |_| {},
            TestOptions {
                names: Some(Arc::new(crate::common::FixedNameGenerator(name.to_string()))),
                ..TestOptions::default()
            },
        )
        .await
    }

    pub async fn build<F>(modifier: F, options: TestOptions) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let mut storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );
        if let Some(wrap) = options.wrap_storage {
            storage = wrap(storage);
        }

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );
        metadata
            .create_token(&hash_token(TEST_TOKEN), Some("tests"))
            .await
            .expect("Failed to create test token");

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig {
            path: storage_path.clone(),
        };
        config.metadata = MetadataConfig::Sqlite { path: db_path };
        modifier(&mut config);

        let mut state = AppState::new(config, storage, metadata);
        if let Some(names) = options.names {
            state = state.with_name_generator(names);
        }
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage_path,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Names of every entry in the blob directory, staging files included.
    pub fn blob_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.storage_path)
            .expect("Failed to read storage directory")
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
