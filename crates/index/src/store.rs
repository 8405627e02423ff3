//! SQLite-backed event index.
//!
//! One logical table, `drive_events`, keyed by event id and storing the
//! full [`DriveRecord`] as JSON. A few columns are lifted out of the
//! record for indexed equality filters; anything richer goes through a
//! full-scan predicate. The schema is created on connect.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::record::DriveRecord;

/// Errors that can occur when using the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Equality filters over the indexed columns. Results are always
/// ordered newest-first (`created_at` descending, id ascending).
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub pubkey: Option<String>,
    pub item_type: Option<String>,
    pub path: Option<String>,
    pub limit: Option<u32>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pubkey(mut self, pubkey: impl Into<String>) -> Self {
        self.pubkey = Some(pubkey.into());
        self
    }

    pub fn item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The local index over a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct EventIndex {
    pool: SqlitePool,
}

impl EventIndex {
    /// Open (or create) a file-backed index.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.setup().await?;
        Ok(index)
    }

    /// Create an in-memory index, used by tests and scratch sessions.
    pub async fn in_memory() -> Result<Self, IndexError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let index = Self { pool };
        index.setup().await?;
        Ok(index)
    }

    async fn setup(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS drive_events (
                id TEXT PRIMARY KEY,
                pubkey TEXT NOT NULL,
                item_type TEXT NOT NULL,
                path TEXT NOT NULL,
                content_hash TEXT,
                created_at INTEGER NOT NULL,
                inserted_at INTEGER NOT NULL,
                record TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_drive_events_path ON drive_events (item_type, path)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_drive_events_pubkey ON drive_events (pubkey)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tombstones (
                id TEXT PRIMARY KEY,
                author TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a record. Re-inserting the same event id is idempotent.
    pub async fn put(&self, record: &DriveRecord) -> Result<(), IndexError> {
        let json = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO drive_events
                (id, pubkey, item_type, path, content_hash, created_at, inserted_at, record)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                pubkey = excluded.pubkey,
                item_type = excluded.item_type,
                path = excluded.path,
                content_hash = excluded.content_hash,
                created_at = excluded.created_at,
                record = excluded.record
            "#,
        )
        .bind(record.id())
        .bind(record.author())
        .bind(record.decrypted_content.type_name())
        .bind(record.path())
        .bind(record.decrypted_content.content_hash())
        .bind(record.created_at() as i64)
        .bind(now)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a record by event id.
    pub async fn get(&self, id: &str) -> Result<Option<DriveRecord>, IndexError> {
        let row = sqlx::query("SELECT record FROM drive_events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(row.get::<String, _>("record").as_str())?)),
            None => Ok(None),
        }
    }

    /// Check whether an event id is already indexed.
    pub async fn contains(&self, id: &str) -> Result<bool, IndexError> {
        let row = sqlx::query("SELECT 1 FROM drive_events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Point delete. Returns whether a record was removed.
    pub async fn remove(&self, id: &str) -> Result<bool, IndexError> {
        let result = sqlx::query("DELETE FROM drive_events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Query by the indexed columns, newest-first.
    pub async fn query(&self, q: RecordQuery) -> Result<Vec<DriveRecord>, IndexError> {
        let mut sql = String::from("SELECT record FROM drive_events WHERE 1 = 1");
        if q.pubkey.is_some() {
            sql.push_str(" AND pubkey = ?");
        }
        if q.item_type.is_some() {
            sql.push_str(" AND item_type = ?");
        }
        if q.path.is_some() {
            sql.push_str(" AND path = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id ASC");
        if q.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(pubkey) = &q.pubkey {
            query = query.bind(pubkey);
        }
        if let Some(item_type) = &q.item_type {
            query = query.bind(item_type);
        }
        if let Some(path) = &q.path {
            query = query.bind(path);
        }
        if let Some(limit) = q.limit {
            query = query.bind(limit as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(parse_rows(rows))
    }

    /// Full scan with an arbitrary predicate over the whole record.
    /// Used for tag scans and path-prefix scans.
    pub async fn scan<F>(&self, predicate: F) -> Result<Vec<DriveRecord>, IndexError>
    where
        F: Fn(&DriveRecord) -> bool,
    {
        let rows = sqlx::query(
            "SELECT record FROM drive_events ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(parse_rows(rows).into_iter().filter(|r| predicate(r)).collect())
    }

    /// The highest `created_at` in the index; the only sync state the
    /// engine persists.
    pub async fn watermark(&self) -> Result<Option<u64>, IndexError> {
        let row = sqlx::query("SELECT MAX(created_at) AS watermark FROM drive_events")
            .fetch_one(&self.pool)
            .await?;
        let watermark: Option<i64> = row.get("watermark");
        Ok(watermark.map(|w| w as u64))
    }

    /// How many file records reference a content hash, excluding one id.
    pub async fn count_hash_refs(
        &self,
        content_hash: &str,
        excluding_id: &str,
    ) -> Result<i64, IndexError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS refs FROM drive_events WHERE content_hash = ? AND id != ?",
        )
        .bind(content_hash)
        .bind(excluding_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("refs"))
    }

    /// Remember a deletion tombstone so a late-arriving target stays dead.
    pub async fn add_tombstone(&self, id: &str, author: &str) -> Result<(), IndexError> {
        sqlx::query("INSERT INTO tombstones (id, author) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(id)
            .bind(author)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The author of the tombstone covering `id`, if one exists.
    pub async fn tombstone_author(&self, id: &str) -> Result<Option<String>, IndexError> {
        let row = sqlx::query("SELECT author FROM tombstones WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("author")))
    }
}

fn parse_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Vec<DriveRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let json: String = row.get("record");
            match serde_json::from_str(&json) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!("dropping unparsable index record: {}", err);
                    None
                }
            }
        })
        .collect()
}
