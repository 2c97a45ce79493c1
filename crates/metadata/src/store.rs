//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{FileRepo, HeartbeatRepo, TokenRepo};
use async_trait::async_trait;
use dss_core::{SortField, SortOrder};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: FileRepo + TokenRepo + HeartbeatRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite catalog at `path`.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MetadataError::Config(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // One connection serializes writers, so concurrent requests queue
            // instead of failing with "database is locked".
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }
}

/// ORDER BY fragment for a validated sort.
///
/// Timestamps are stored as RFC 3339 text with a variable number of
/// fractional digits, so they are compared through `julianday`. `rowid`
/// breaks ties in insertion order.
pub(crate) fn sqlite_order_by(sort_by: SortField, order: SortOrder) -> &'static str {
    match (sort_by, order) {
        (SortField::CreatedAt, SortOrder::Asc) => "julianday(created_at) ASC, rowid ASC",
        (SortField::CreatedAt, SortOrder::Desc) => "julianday(created_at) DESC, rowid DESC",
        (SortField::UpdatedAt, SortOrder::Asc) => "julianday(updated_at) ASC, rowid ASC",
        (SortField::UpdatedAt, SortOrder::Desc) => "julianday(updated_at) DESC, rowid DESC",
        (SortField::Random, _) => "RANDOM()",
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    // SQLite reports "UNIQUE constraint failed: files.storage_path"
    matches!(err, sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE constraint"))
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::{FileRow, NewFile, TokenRow};
    use dss_core::ListQuery;
    use sqlx::FromRow;
    use time::OffsetDateTime;
    use uuid::Uuid;

    /// `files` row as SQLite returns it: tags are a JSON array in TEXT.
    #[derive(FromRow)]
    struct SqliteFileRow {
        key: Uuid,
        storage_path: String,
        original_name: Option<String>,
        tags: String,
        hash: Option<String>,
        size_bytes: Option<i64>,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    }

    impl TryFrom<SqliteFileRow> for FileRow {
        type Error = MetadataError;

        fn try_from(row: SqliteFileRow) -> MetadataResult<Self> {
            let tags: Vec<String> = serde_json::from_str(&row.tags).map_err(|e| {
                MetadataError::Tags(format!("undecodable for file {}: {e}", row.key))
            })?;
            Ok(FileRow {
                key: row.key,
                storage_path: row.storage_path,
                original_name: row.original_name,
                tags,
                hash: row.hash,
                size_bytes: row.size_bytes,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        }
    }

    fn tags_json(tags: &[String]) -> MetadataResult<String> {
        serde_json::to_string(tags)
            .map_err(|e| MetadataError::Tags(format!("encode failed: {e}")))
    }

    #[async_trait]
    impl FileRepo for SqliteStore {
        async fn create_file(&self, file: &NewFile) -> MetadataResult<Uuid> {
            let key = Uuid::new_v4();
            let now = OffsetDateTime::now_utc();
            let result = sqlx::query(
                r#"
                INSERT INTO files (
                    key, storage_path, original_name, tags, hash, size_bytes,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(key)
            .bind(&file.storage_path)
            .bind(&file.original_name)
            .bind(tags_json(&file.tags)?)
            .bind(&file.hash)
            .bind(file.size_bytes)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(key),
                Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                    "storage path {} already cataloged",
                    file.storage_path
                ))),
                Err(e) => Err(e.into()),
            }
        }

        async fn get_file(&self, key: Uuid) -> MetadataResult<Option<FileRow>> {
            let row = sqlx::query_as::<_, SqliteFileRow>("SELECT * FROM files WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            row.map(FileRow::try_from).transpose()
        }

        async fn list_file_keys(&self, query: &ListQuery) -> MetadataResult<Vec<Uuid>> {
            // A row matches when no requested tag is missing from its tag set.
            let sql = format!(
                r#"
                SELECT key FROM files
                WHERE NOT EXISTS (
                    SELECT 1 FROM json_each(?) AS wanted
                    WHERE wanted.value NOT IN (SELECT value FROM json_each(files.tags))
                )
                ORDER BY {}
                LIMIT ?
                "#,
                sqlite_order_by(query.sort_by, query.order)
            );
            let keys = sqlx::query_scalar::<_, Uuid>(&sql)
                .bind(tags_json(&query.tags)?)
                .bind(i64::from(query.limit))
                .fetch_all(&self.pool)
                .await?;
            Ok(keys)
        }

        async fn scan_files(
            &self,
            after: Option<Uuid>,
            limit: u32,
        ) -> MetadataResult<Vec<FileRow>> {
            let rows = match after {
                Some(after) => {
                    sqlx::query_as::<_, SqliteFileRow>(
                        "SELECT * FROM files WHERE key > ? ORDER BY key LIMIT ?",
                    )
                    .bind(after)
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool)
                    .await?
                }
                None => {
                    sqlx::query_as::<_, SqliteFileRow>("SELECT * FROM files ORDER BY key LIMIT ?")
                        .bind(i64::from(limit))
                        .fetch_all(&self.pool)
                        .await?
                }
            };
            rows.into_iter().map(FileRow::try_from).collect()
        }

        async fn set_file_hash(
            &self,
            key: Uuid,
            hash: &str,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE files SET hash = ?, updated_at = ? WHERE key = ?")
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
    impl TokenRepo for SqliteStore {
        async fn create_token(
            &self,
            token_hash: &str,
            description: Option<&str>,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "INSERT INTO tokens (token_hash, description, created_at) VALUES (?, ?, ?)",
            )
            .bind(token_hash)
            .bind(description)
            .bind(OffsetDateTime::now_utc())
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
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tokens WHERE token_hash = ?)")
                    .bind(token_hash)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }

        async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>> {
            let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl HeartbeatRepo for SqliteStore {
        async fn record_heartbeat(&self) -> MetadataResult<i64> {
            let id: i64 =
                sqlx::query_scalar("INSERT INTO heartbeats (created_at) VALUES (?) RETURNING id")
                    .bind(OffsetDateTime::now_utc())
                    .fetch_one(&self.pool)
                    .await?;
            Ok(id)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Cataloged files. tags holds a JSON array of strings.
CREATE TABLE IF NOT EXISTS files (
    key BLOB PRIMARY KEY,
    storage_path TEXT NOT NULL UNIQUE,
    original_name TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    hash TEXT,
    size_bytes INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at);
CREATE INDEX IF NOT EXISTS idx_files_updated_at ON files(updated_at);

-- Access tokens, stored as SHA-256 hex of the secret.
CREATE TABLE IF NOT EXISTS tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token_hash TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL
);

-- Liveness probe log.
CREATE TABLE IF NOT EXISTS heartbeats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_order_by_fragments() {
        assert_eq!(
            sqlite_order_by(SortField::CreatedAt, SortOrder::Desc),
            "julianday(created_at) DESC, rowid DESC"
        );
        assert_eq!(
            sqlite_order_by(SortField::UpdatedAt, SortOrder::Asc),
            "julianday(updated_at) ASC, rowid ASC"
        );
        assert_eq!(
            sqlite_order_by(SortField::Random, SortOrder::Asc),
            sqlite_order_by(SortField::Random, SortOrder::Desc)
        );
    }
}
