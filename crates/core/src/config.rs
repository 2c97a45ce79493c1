//! `dssd` configuration. Every field has a default except `storage.path`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// HTTP listener and request limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted file body in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Largest `limit` accepted by the listing endpoint.
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: u32,
    /// Mount the unauthenticated `/metrics` route.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_upload_size() -> u64 {
    crate::DEFAULT_MAX_UPLOAD_SIZE
}

fn default_max_list_limit() -> u32 {
    crate::MAX_LIST_LIMIT
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_size: default_max_upload_size(),
            max_list_limit: default_max_list_limit(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_size == 0 {
            return Err("server.max_upload_size must be greater than 0".to_string());
        }
        if self.max_list_limit == 0 {
            return Err("server.max_list_limit must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Blob storage configuration.
///
/// Blobs live as flat files directly under `path` (the mount root).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for blobs. Must be set before the server starts.
    #[serde(default)]
    pub path: PathBuf,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err(
                "storage.path is not set (set DSS_STORAGE__PATH or MOUNT_PATH)".to_string(),
            );
        }
        Ok(())
    }
}

/// TLS policy for the PostgreSQL connection.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

/// Where the catalog lives. Tagged by `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    Sqlite {
        path: PathBuf,
    },
    Postgres {
        /// Wins over the discrete fields when set.
        url: Option<String>,
        host: Option<String>,
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        username: Option<String>,
        /// Better supplied as `DSS_METADATA__PASSWORD` than in the file.
        password: Option<String>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Per-statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

impl MetadataConfig {
    /// A Postgres catalog reached through a connection URL, with defaults for
    /// everything else. Used for the `DATABASE_URL` environment contract.
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres {
            url: Some(url.into()),
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: default_max_connections(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path } => {
                if path.as_os_str().is_empty() {
                    return Err("metadata.path must not be empty".to_string());
                }
                Ok(())
            }
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => {
                if url.is_some() || (host.is_some() && database.is_some()) {
                    Ok(())
                } else {
                    Err("metadata: postgres needs `url` or both `host` and `database`".to_string())
                }
            }
        }
    }
}

/// Tokens seeded at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Hex SHA-256 digests (`printf %s TOKEN | sha256sum`), optionally
    /// prefixed with `sha256:`.
    #[serde(default)]
    pub token_hashes: Vec<String>,
}

/// Root of the configuration tree.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener and request limits.
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Tokens seeded at startup.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Defaults plus a relative storage path. Tests repoint both the storage
    /// path and the SQLite file at temporary directories.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig {
                path: PathBuf::from("./data/storage"),
            },
            metadata: MetadataConfig::default(),
            auth: AuthConfig::default(),
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.metadata.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.max_upload_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.server.max_list_limit, 100);
        assert!(config.server.metrics_enabled);
        assert!(matches!(config.metadata, MetadataConfig::Sqlite { .. }));
    }

    #[test]
    fn test_empty_storage_path_rejected() {
        let config = AppConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.contains("storage.path"));

        assert!(AppConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_postgres_validation() {
        assert!(MetadataConfig::postgres_url("postgres://localhost/dss").validate().is_ok());

        let missing = MetadataConfig::Postgres {
            url: None,
            host: Some("db".to_string()),
            port: None,
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: 5,
            statement_timeout_ms: None,
        };
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let json = r#"{
            "storage": { "path": "/mnt/files" },
            "metadata": { "type": "postgres", "url": "postgres://db/dss" },
            "auth": { "token_hashes": ["abc"] }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.storage.path, PathBuf::from("/mnt/files"));
        assert_eq!(config.server.max_list_limit, 100);
        match config.metadata {
            MetadataConfig::Postgres {
                url,
                max_connections,
                ..
            } => {
                assert_eq!(url.as_deref(), Some("postgres://db/dss"));
                assert_eq!(max_connections, 10);
            }
            other => panic!("unexpected metadata config: {other:?}"),
        }
        assert_eq!(config.auth.token_hashes, vec!["abc".to_string()]);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = AppConfig::for_testing();
        config.server.max_list_limit = 0;
        assert!(config.validate().is_err());
    }
}
