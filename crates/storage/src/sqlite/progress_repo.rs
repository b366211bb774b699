use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{PROGRESS_KEY, ProgressRecord, ProgressRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load(&self) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query("SELECT payload FROM progress_records WHERE key = ?1")
            .bind(PROGRESS_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        ProgressRecord::from_json(&payload).map(Some)
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let payload = record.to_json()?;
        let updated_at = record.last_visited.unwrap_or_else(Utc::now);

        sqlx::query(
            r"
            INSERT INTO progress_records (key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(PROGRESS_KEY)
        .bind(payload)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM progress_records WHERE key = ?1")
            .bind(PROGRESS_KEY)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
