//! PostgreSQL catalog.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{FileRow, NewFile, TokenRow};
use crate::repos::{FileRepo, HeartbeatRepo, TokenRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use dss_core::config::PgSslMode;
use dss_core::{ListQuery, SortField, SortOrder};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// ORDER BY fragment for a validated sort. `key` breaks timestamp ties.
pub(crate) fn postgres_order_by(sort_by: SortField, order: SortOrder) -> &'static str {
    match (sort_by, order) {
        (SortField::CreatedAt, SortOrder::Asc) => "created_at ASC, key ASC",
        (SortField::CreatedAt, SortOrder::Desc) => "created_at DESC, key DESC",
        (SortField::UpdatedAt, SortOrder::Asc) => "updated_at ASC, key ASC",
        (SortField::UpdatedAt, SortOrder::Desc) => "updated_at DESC, key DESC",
        (SortField::Random, _) => "RANDOM()",
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    // PostgreSQL error code 23505 = unique_violation
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

/// Where the catalog database lives.
#[derive(Debug, Clone, Copy)]
pub enum PgTarget<'a> {
    Url(&'a str),
    /// Discrete parameters, so the password can come from its own variable.
    Params {
        host: &'a str,
        port: u16,
        username: Option<&'a str>,
        password: Option<&'a str>,
        database: &'a str,
        ssl_mode: Option<PgSslMode>,
    },
}

impl PgTarget<'_> {
    fn connect_options(&self) -> MetadataResult<PgConnectOptions> {
        match *self {
            PgTarget::Url(url) => Ok(PgConnectOptions::from_str(url)?),
            PgTarget::Params {
                host,
                port,
                username,
                password,
                database,
                ssl_mode,
            } => {
                let mut opts = PgConnectOptions::new()
                    .host(host)
                    .port(port)
                    .database(database);
                if let Some(user) = username {
                    opts = opts.username(user);
                }
                if let Some(pass) = password {
                    opts = opts.password(pass);
                }
                if let Some(mode) = ssl_mode {
                    opts = opts.ssl_mode(match mode {
                        PgSslMode::Disable => SqlxPgSslMode::Disable,
                        PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                        PgSslMode::Require => SqlxPgSslMode::Require,
                    });
                }
                Ok(opts)
            }
        }
    }
}

/// Catalog backed by PostgreSQL.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Open a pool against `target` and apply the schema.
    pub async fn connect(
        target: PgTarget<'_>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = target.connect_options()?;
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
        }

        tracing::info!(
            host = opts.get_host(),
            port = opts.get_port(),
            database = opts.get_database().unwrap_or("<default>"),
            max_connections,
            statement_timeout_ms,
            "Connecting to PostgreSQL catalog"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // One command per prepared statement.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl FileRepo for PostgresStore {
    async fn create_file(&self, file: &NewFile) -> MetadataResult<Uuid> {
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO files (storage_path, original_name, tags, hash, size_bytes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING key
            "#,
        )
        .bind(&file.storage_path)
        .bind(&file.original_name)
        .bind(&file.tags)
        .bind(&file.hash)
        .bind(file.size_bytes)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(key) => Ok(key),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                "storage path {} already cataloged",
                file.storage_path
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_file(&self, key: Uuid) -> MetadataResult<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>("SELECT * FROM files WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_file_keys(&self, query: &ListQuery) -> MetadataResult<Vec<Uuid>> {
        let sql = format!(
            "SELECT key FROM files WHERE tags @> $1 ORDER BY {} LIMIT $2",
            postgres_order_by(query.sort_by, query.order)
        );
        let keys = sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(&query.tags)
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(keys)
    }

    async fn scan_files(&self, after: Option<Uuid>, limit: u32) -> MetadataResult<Vec<FileRow>> {
        let rows = match after {
            Some(after) => {
                sqlx::query_as::<_, FileRow>(
                    "SELECT * FROM files WHERE key > $1 ORDER BY key LIMIT $2",
                )
                .bind(after)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, FileRow>("SELECT * FROM files ORDER BY key LIMIT $1")
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn set_file_hash(
        &self,
        key: Uuid,
        hash: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE files SET hash = $1, updated_at = $2 WHERE key = $3")
            .bind(hash)
            .bind(updated_at)
            .bind(key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("file {key} not found")));
        }
        Ok(())
    }

    async fn count_files(&self) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl TokenRepo for PostgresStore {
    async fn create_token(&self, token_hash: &str, description: Option<&str>) -> MetadataResult<()> {
        let result = sqlx::query("INSERT INTO tokens (token_hash, description) VALUES ($1, $2)")
            .bind(token_hash)
            .bind(description)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(
                "token hash already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn token_exists(&self, token_hash: &str) -> MetadataResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tokens WHERE token_hash = $1)")
                .bind(token_hash)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl HeartbeatRepo for PostgresStore {
    async fn record_heartbeat(&self) -> MetadataResult<i64> {
        let id: i64 = sqlx::query_scalar("INSERT INTO heartbeats DEFAULT VALUES RETURNING id")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }
}
