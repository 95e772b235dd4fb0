//! SQLite-based execution record store

use crate::persistence::{ExecutionRecord, ExecutionRecordStore};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// SQLite execution record store.
///
/// Indexed columns for lookup, the full record as a JSON document.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self> {
        let in_memory = db_path == ":memory:";
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);

        // Each in-memory connection is its own database
        let max_connections = if in_memory { 1 } else { 5 };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("agentflow");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        let db_path = db_dir.join("executions.db");
        let db_path = db_path
            .to_str()
            .context("Database path is not valid UTF-8")?;
        Self::new(db_path).await
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_records (
                id TEXT PRIMARY KEY,
                pipeline_id TEXT NOT NULL,
                pipeline_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                record TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pipeline_id ON execution_records(pipeline_id);
            CREATE INDEX IF NOT EXISTS idx_started_at ON execution_records(started_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<ExecutionRecord> {
        let json: String = row.get("record");
        serde_json::from_str(&json).context("Failed to decode execution record")
    }
}

#[async_trait::async_trait]
impl ExecutionRecordStore for SqliteRecordStore {
    async fn save(&self, record: &ExecutionRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to encode execution record")?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO execution_records
            (id, pipeline_id, pipeline_name, status, started_at, completed_at, record)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.pipeline_id)
        .bind(&record.pipeline_name)
        .bind(record.status.as_str())
        .bind(Self::to_naive(record.start_time))
        .bind(record.end_time.map(Self::to_naive))
        .bind(json)
        .execute(&self.pool)
        .await
        .context("Failed to save execution record")?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ExecutionRecord>> {
        let row = sqlx::query("SELECT record FROM execution_records WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load execution record")?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn find_by_pipeline_id(&self, pipeline_id: &str) -> Result<Vec<ExecutionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT record
            FROM execution_records
            WHERE pipeline_id = ?1
            ORDER BY started_at DESC
            "#,
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list execution records")?;

        rows.iter().map(Self::decode).collect()
    }

    async fn find_all(&self) -> Result<Vec<ExecutionRecord>> {
        let rows = sqlx::query("SELECT record FROM execution_records ORDER BY started_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list execution records")?;

        rows.iter().map(Self::decode).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM execution_records WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete execution record")?;

        Ok(result.rows_affected() > 0)
    }
}
