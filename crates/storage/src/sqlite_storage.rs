//! SQLite storage backend.
//!
//! One row per run. Identity columns are written once by `create`; attributes
//! live in a JSON object column and are upserted one at a time with
//! `json_set`, so an attribute write is a single statement that never reads
//! the other attributes back into the process.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use qcflow_core::{Attribute, QcPid, RunKey, RunRecord, StatusCode, Verdict};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;

use super::trait_::{assemble, attributes_of, Identity};
use super::{Result, StoreError, SummaryStore};

/// SQLite store implementation.
#[derive(Clone)]
pub struct SqliteStore {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory database for testing.
    ///
    /// Limited to one connection: every connection to `:memory:` is its own
    /// database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(unavailable)?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS qc_summary (
                group_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                stream_id TEXT,
                qc_pid TEXT,
                attributes TEXT NOT NULL DEFAULT '{}',
                PRIMARY KEY (group_id, start_time)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

#[async_trait]
impl SummaryStore for SqliteStore {
    async fn create(&self, record: &RunRecord) -> Result<StatusCode> {
        let key = record.key();
        let attributes = serde_json::to_string(&attributes_of(record))?;

        sqlx::query(
            "INSERT OR REPLACE INTO qc_summary (group_id, start_time, stream_id, qc_pid, attributes)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&key.group_id)
        .bind(key.start_time_key())
        .bind(&record.stream_id)
        .bind(record.qc_pid.to_string())
        .bind(attributes)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(StatusCode::OK)
    }

    async fn fetch(&self, key: &RunKey) -> Result<Option<RunRecord>> {
        let row = sqlx::query(
            "SELECT stream_id, qc_pid, attributes FROM qc_summary
            WHERE group_id = ? AND start_time = ?",
        )
        .bind(&key.group_id)
        .bind(key.start_time_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stream_id: Option<String> = row.try_get("stream_id").map_err(unavailable)?;
        let qc_pid: Option<String> = row.try_get("qc_pid").map_err(unavailable)?;
        // Attribute upserts can land before the run is created.
        let (Some(stream_id), Some(qc_pid)) = (stream_id, qc_pid) else {
            return Ok(None);
        };
        let qc_pid: QcPid = qc_pid
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("QCPID {}: {}", qc_pid, e)))?;

        let attributes: String = row.try_get("attributes").map_err(unavailable)?;
        let attributes: BTreeMap<String, Verdict> = serde_json::from_str(&attributes)?;

        Ok(Some(assemble(key, Identity { stream_id, qc_pid }, attributes)))
    }

    async fn update_attribute(
        &self,
        key: &RunKey,
        attribute: &Attribute,
        value: Verdict,
    ) -> Result<StatusCode> {
        let name = attribute.name();
        let path = format!("$.\"{}\"", name.replace('"', "\\\""));

        sqlx::query(
            "INSERT INTO qc_summary (group_id, start_time, attributes)
            VALUES (?, ?, json_object(?, ?))
            ON CONFLICT (group_id, start_time)
            DO UPDATE SET attributes = json_set(qc_summary.attributes, ?, ?)",
        )
        .bind(&key.group_id)
        .bind(key.start_time_key())
        .bind(name)
        .bind(value.as_str())
        .bind(path)
        .bind(value.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(StatusCode::OK)
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_in_memory_storage() {
        let store = SqliteStore::in_memory().await.unwrap();
        let rec = RunRecord::new("G1", "S1", Utc::now(), QcPid::new());

        store.create(&rec).await.unwrap();
        let loaded = store.fetch(&rec.key()).await.unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[tokio::test]
    async fn test_attribute_upserts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let rec = RunRecord::new("G1", "S1", Utc::now(), QcPid::new());
        let key = rec.key();
        store.create(&rec).await.unwrap();

        let p1 = Attribute::Check("Process1Pass".into());
        let p3 = Attribute::Check("Process3Pass".into());
        store.update_attribute(&key, &p1, Verdict::Pass).await.unwrap();
        store.update_attribute(&key, &p3, Verdict::Fail).await.unwrap();
        store.update_attribute(&key, &p3, Verdict::Fail).await.unwrap();
        store.update_attribute(&key, &Attribute::TotalPass, Verdict::Fail).await.unwrap();

        let loaded = store.get(&key).await.unwrap();
        assert_eq!(loaded.checks.len(), 2);
        assert_eq!(loaded.verdict(&p1), Verdict::Pass);
        assert_eq!(loaded.verdict(&p3), Verdict::Fail);
        assert_eq!(loaded.total_pass, Verdict::Fail);
    }

    #[tokio::test]
    async fn test_upsert_without_record() {
        let store = SqliteStore::in_memory().await.unwrap();
        let key = RunKey::new("G1", Utc::now());
        store
            .update_attribute(&key, &Attribute::Check("Process1Pass".into()), Verdict::Pass)
            .await
            .unwrap();
        assert!(store.fetch(&key).await.unwrap().is_none());
    }
}
