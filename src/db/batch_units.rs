//! Batch unit ledger — processing order and per-unit status tracking.
//!
//! The ledger enforces the monotonic transition invariant itself rather than
//! relying on the database: a unit moves `pending -> completed` or
//! `pending -> failed` and never backward. The single sanctioned exception is
//! [`Database::reset_failed_units`], which the batch-level retry path uses to
//! re-attempt failed units within the same batch row.

use crate::error::DatabaseError;
use crate::types::{BatchId, UnitStatus};
use crate::{Error, Result};

use super::{BatchUnit, Database, NewBatchUnit};

const BATCH_UNIT_COLUMNS: &str =
    "id, batch_id, unit_id, processing_order, status, attempted_at";

impl Database {
    /// Insert the full unit ledger for a batch in one atomic operation.
    ///
    /// Runs inside a transaction: either every row is inserted or none are,
    /// even when the input spans multiple INSERT statements.
    pub async fn insert_batch_units(&self, units: &[NewBatchUnit]) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }

        // Each unit uses 4 bind variables, max 249 units per INSERT.
        const MAX_UNITS_PER_BATCH: usize = 249;

        let mut tx = self.pool().begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin batch unit insert: {}",
                e
            )))
        })?;

        for chunk in units.chunks(MAX_UNITS_PER_BATCH) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO translation_batch_units (batch_id, unit_id, processing_order, status) ",
            );

            query_builder.push_values(chunk, |mut b, unit| {
                b.push_bind(unit.batch_id)
                    .push_bind(unit.unit_id)
                    .push_bind(unit.processing_order)
                    .push_bind(UnitStatus::Pending.to_i32());
            });

            let query = query_builder.build();
            query.execute(&mut *tx).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert batch units: {}",
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit batch unit insert: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Get all ledger rows for a batch in processing order
    pub async fn get_batch_units(&self, batch_id: BatchId) -> Result<Vec<BatchUnit>> {
        let rows = sqlx::query_as::<_, BatchUnit>(&format!(
            "SELECT {} FROM translation_batch_units WHERE batch_id = ? ORDER BY processing_order ASC",
            BATCH_UNIT_COLUMNS
        ))
        .bind(batch_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get batch units: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Get pending ledger rows for a batch in processing order (for dispatch and resume)
    pub async fn get_pending_units(&self, batch_id: BatchId) -> Result<Vec<BatchUnit>> {
        let rows = sqlx::query_as::<_, BatchUnit>(&format!(
            "SELECT {} FROM translation_batch_units WHERE batch_id = ? AND status = 0 ORDER BY processing_order ASC",
            BATCH_UNIT_COLUMNS
        ))
        .bind(batch_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get pending batch units: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Move a single pending unit to a terminal status.
    ///
    /// Fails with a constraint violation if the unit is not pending: terminal
    /// rows never transition again within the same execution.
    pub async fn update_unit_status(&self, batch_unit_id: i64, status: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE translation_batch_units
            SET status = ?, attempted_at = ?
            WHERE id = ? AND status = 0
            "#,
        )
        .bind(status)
        .bind(now)
        .bind(batch_unit_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update batch unit status: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::ConstraintViolation(format!(
                "batch unit {} is not pending; terminal statuses never transition",
                batch_unit_id
            ))));
        }

        Ok(())
    }

    /// Move multiple pending units to terminal statuses in one query.
    ///
    /// The `status = 0` guard keeps the transition monotonic even in the bulk
    /// path; non-pending rows in the input are left untouched.
    pub async fn update_units_status_batch(&self, updates: &[(i64, i32)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        // Each update uses 2 bind variables in the CASE plus 1 in the WHERE.
        const MAX_UPDATES_PER_BATCH: usize = 100;

        let now = chrono::Utc::now().timestamp();

        for chunk in updates.chunks(MAX_UPDATES_PER_BATCH) {
            let mut query_builder =
                sqlx::QueryBuilder::new("UPDATE translation_batch_units SET status = CASE ");

            for (batch_unit_id, status) in chunk {
                query_builder.push("WHEN id = ");
                query_builder.push_bind(*batch_unit_id);
                query_builder.push(" THEN ");
                query_builder.push_bind(*status);
                query_builder.push(" ");
            }
            query_builder.push("END, attempted_at = ");
            query_builder.push_bind(now);
            query_builder.push(" WHERE status = 0 AND id IN (");

            let mut first = true;
            for (batch_unit_id, _) in chunk {
                if !first {
                    query_builder.push(", ");
                }
                query_builder.push_bind(*batch_unit_id);
                first = false;
            }
            query_builder.push(")");

            let query = query_builder.build();
            query.execute(self.pool()).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update batch unit statuses: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }

    /// Reset failed units back to pending for a batch-level retry.
    ///
    /// Returns the number of units reset.
    pub async fn reset_failed_units(&self, batch_id: BatchId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE translation_batch_units
            SET status = 0, attempted_at = NULL
            WHERE batch_id = ? AND status = 2
            "#,
        )
        .bind(batch_id)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to reset failed batch units: {}",
                e
            )))
        })?;

        Ok(result.rows_affected())
    }

    /// Count ledger rows with a specific status for a batch
    pub async fn count_units_by_status(&self, batch_id: BatchId, status: i32) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM translation_batch_units WHERE batch_id = ? AND status = ?",
        )
        .bind(batch_id)
        .bind(status)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count batch units: {}",
                e
            )))
        })?;

        Ok(count)
    }

    /// Get total ledger row count for a batch
    pub async fn count_units(&self, batch_id: BatchId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM translation_batch_units WHERE batch_id = ?")
                .bind(batch_id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to count batch units: {}",
                        e
                    )))
                })?;

        Ok(count)
    }
}
