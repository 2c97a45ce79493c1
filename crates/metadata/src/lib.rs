//! Catalog storage for DSS.
//!
//! This crate provides the relational side of the service:
//! - File rows (storage path, display name, tags, content hash, timestamps)
//! - Access tokens, stored as hashes
//! - Heartbeat records written by the liveness probe
//!
//! Backends: SQLite for tests and small deployments, PostgreSQL otherwise.

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{FileRow, NewFile, TokenRow};
pub use postgres::{PgTarget, PostgresStore};
pub use store::{MetadataStore, SqliteStore};

use dss_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;

    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let target = match (url, host, database) {
                (Some(url), _, _) => PgTarget::Url(url),
                (None, Some(host), Some(database)) => PgTarget::Params {
                    host,
                    port: port.unwrap_or(5432),
                    username: username.as_deref(),
                    password: password.as_deref(),
                    database,
                    ssl_mode: *ssl_mode,
                },
                _ => {
                    return Err(MetadataError::Config(
                        "postgres needs either `url` or both `host` and `database`".to_string(),
                    ));
                }
            };
            let store =
                PostgresStore::connect(target, *max_connections, *statement_timeout_ms).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
