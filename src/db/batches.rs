//! Translation batch header CRUD and batch numbering.

use crate::error::DatabaseError;
use crate::types::{BatchId, ProjectLanguageId};
use crate::{Error, Result};

use super::{Batch, Database, NewBatch};

const BATCH_COLUMNS: &str = "id, project_language_id, provider_id, batch_number, units_count, \
                             status, retry_count, error_message, created_at, started_at, completed_at";

impl Database {
    /// Insert a new batch header, assigning the next batch number.
    ///
    /// The batch number is computed inside the INSERT itself
    /// (`max(existing) + 1` scoped to the project-language, 1 if none exist),
    /// so concurrent planners cannot observe a stale maximum. The
    /// UNIQUE(project_language_id, batch_number) constraint backs the
    /// never-reused invariant.
    ///
    /// Returns the new batch id and its assigned batch number.
    pub async fn insert_batch(&self, batch: &NewBatch) -> Result<(BatchId, i64)> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO translation_batches (
                project_language_id, provider_id, batch_number, units_count,
                status, retry_count, created_at
            ) VALUES (
                ?, ?,
                (SELECT COALESCE(MAX(batch_number), 0) + 1
                 FROM translation_batches WHERE project_language_id = ?),
                ?, ?, 0, ?
            )
            "#,
        )
        .bind(batch.project_language_id)
        .bind(&batch.provider_id)
        .bind(batch.project_language_id)
        .bind(batch.units_count)
        .bind(batch.status)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert batch: {}",
                e
            )))
        })?;

        let id = BatchId(result.last_insert_rowid());

        let batch_number: i64 =
            sqlx::query_scalar("SELECT batch_number FROM translation_batches WHERE id = ?")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read back batch number: {}",
                        e
                    )))
                })?;

        Ok((id, batch_number))
    }

    /// Get a batch by ID
    pub async fn get_batch(&self, id: BatchId) -> Result<Option<Batch>> {
        let row = sqlx::query_as::<_, Batch>(&format!(
            "SELECT {} FROM translation_batches WHERE id = ?",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get batch: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all batches for a project-language, oldest first
    pub async fn list_batches(&self, project_language_id: ProjectLanguageId) -> Result<Vec<Batch>> {
        let rows = sqlx::query_as::<_, Batch>(&format!(
            "SELECT {} FROM translation_batches WHERE project_language_id = ? ORDER BY batch_number ASC",
            BATCH_COLUMNS
        ))
        .bind(project_language_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list batches: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Update batch status
    pub async fn update_batch_status(&self, id: BatchId, status: i32) -> Result<()> {
        sqlx::query("UPDATE translation_batches SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update batch status: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Set batch error message
    pub async fn set_batch_error(&self, id: BatchId, error: &str) -> Result<()> {
        sqlx::query("UPDATE translation_batches SET error_message = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set batch error: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Set batch started timestamp (most recent execution start).
    ///
    /// A new execution reopens the batch: the terminal timestamp and any
    /// previous error message are cleared.
    pub async fn set_batch_started(&self, id: BatchId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            "UPDATE translation_batches SET started_at = ?, completed_at = NULL, error_message = NULL WHERE id = ?",
        )
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set batch started timestamp: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Set batch completed timestamp (terminal status reached)
    pub async fn set_batch_completed(&self, id: BatchId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE translation_batches SET completed_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set batch completed timestamp: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Increment the batch-level retry counter, returning the new value
    pub async fn increment_retry_count(&self, id: BatchId) -> Result<i32> {
        sqlx::query("UPDATE translation_batches SET retry_count = retry_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to increment retry count: {}",
                    e
                )))
            })?;

        let count: i32 =
            sqlx::query_scalar("SELECT retry_count FROM translation_batches WHERE id = ?")
                .bind(id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to read back retry count: {}",
                        e
                    )))
                })?;

        Ok(count)
    }
}
