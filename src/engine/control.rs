//! Batch lifecycle control — pause, resume, cancel, retry.

use std::sync::atomic::Ordering;

use crate::error::{BatchError, Error, Result};
use crate::types::{
    BatchId, BatchStatus, EventKind, MAX_BATCH_RETRIES, ProjectLanguageId, UnitStatus,
};

use super::{TranslationEngine, status_name};

impl TranslationEngine {
    /// Pause a translating batch.
    ///
    /// The running task holds between chunks; an in-flight provider call is
    /// allowed to complete and its result is still recorded. Pausing an
    /// already-paused batch is a no-op (idempotent, no event emitted).
    pub async fn pause(&self, id: BatchId) -> Result<()> {
        let batch = self
            .db
            .get_batch(id)
            .await?
            .ok_or(Error::Batch(BatchError::NotFound { id: id.get() }))?;

        let current_status = BatchStatus::from_i32(batch.status);
        match current_status {
            BatchStatus::Paused => {
                // Already paused, nothing to do
                return Ok(());
            }
            BatchStatus::Translating => {
                // Can be paused
            }
            _ => {
                return Err(Error::Batch(BatchError::InvalidState {
                    id: id.get(),
                    operation: "pause".to_string(),
                    current_state: status_name(current_status),
                }));
            }
        }

        // Signal the running task to hold before its next chunk
        {
            let active = self.exec.active_batches.lock().await;
            if let Some(handle) = active.get(&id) {
                handle.pause_tx.send(true).ok();
            } else {
                tracing::warn!(
                    batch_id = id.0,
                    "Pause requested for a batch with no running task"
                );
            }
        }

        self.db
            .update_batch_status(id, BatchStatus::Paused.to_i32())
            .await?;

        let completed = self
            .db
            .count_units_by_status(id, UnitStatus::Completed.to_i32())
            .await?;
        self.emit_event(EventKind::BatchPaused {
            batch_id: id,
            project_language_id: ProjectLanguageId(batch.project_language_id),
            completed_units: completed as u64,
            total_units: batch.units_count as u64,
        });

        Ok(())
    }

    /// Resume a paused batch.
    ///
    /// The task continues from the first non-completed unit in processing
    /// order. Resuming a translating batch is a no-op (idempotent, no event
    /// emitted).
    pub async fn resume(&self, id: BatchId) -> Result<()> {
        let batch = self
            .db
            .get_batch(id)
            .await?
            .ok_or(Error::Batch(BatchError::NotFound { id: id.get() }))?;

        let current_status = BatchStatus::from_i32(batch.status);
        match current_status {
            BatchStatus::Translating => {
                // Already running, nothing to do
                return Ok(());
            }
            BatchStatus::Paused => {
                // Can be resumed
            }
            _ => {
                return Err(Error::Batch(BatchError::InvalidState {
                    id: id.get(),
                    operation: "resume".to_string(),
                    current_state: status_name(current_status),
                }));
            }
        }

        {
            let active = self.exec.active_batches.lock().await;
            if let Some(handle) = active.get(&id) {
                handle.pause_tx.send(false).ok();
            } else {
                tracing::warn!(
                    batch_id = id.0,
                    "Resume requested for a batch with no running task"
                );
            }
        }

        self.db
            .update_batch_status(id, BatchStatus::Translating.to_i32())
            .await?;

        let completed = self
            .db
            .count_units_by_status(id, UnitStatus::Completed.to_i32())
            .await?;
        self.emit_event(EventKind::BatchResumed {
            batch_id: id,
            project_language_id: ProjectLanguageId(batch.project_language_id),
            completed_units: completed as u64,
            total_units: batch.units_count as u64,
        });

        Ok(())
    }

    /// Cancel a batch.
    ///
    /// Cooperative: the running task stops submitting at the next chunk
    /// boundary, leaves unresolved units pending (not failed), and records
    /// the terminal state. Already-completed unit results are preserved. A
    /// cancel request for a batch in a terminal state is a no-op.
    pub async fn cancel(&self, id: BatchId, reason: &str) -> Result<()> {
        let batch = self
            .db
            .get_batch(id)
            .await?
            .ok_or(Error::Batch(BatchError::NotFound { id: id.get() }))?;

        let current_status = BatchStatus::from_i32(batch.status);
        if current_status.is_terminal() {
            // No-op after terminal
            return Ok(());
        }

        let signalled = {
            let active = self.exec.active_batches.lock().await;
            if let Some(handle) = active.get(&id) {
                *handle.cancel_reason.lock().await = Some(reason.to_string());
                handle.cancel_token.cancel();
                true
            } else {
                false
            }
        };

        if signalled {
            // The task observes the flag at its next suspension point and
            // performs the terminal transition itself.
            return Ok(());
        }

        // Planned but never started: terminal transition happens here
        self.db
            .update_batch_status(id, BatchStatus::Cancelled.to_i32())
            .await?;
        self.db.set_batch_completed(id).await?;
        self.exec.contexts.lock().await.remove(&id);

        let completed = self
            .db
            .count_units_by_status(id, UnitStatus::Completed.to_i32())
            .await?;
        self.emit_event(EventKind::BatchCancelled {
            batch_id: id,
            project_language_id: ProjectLanguageId(batch.project_language_id),
            completed_units: completed as u64,
            total_units: batch.units_count as u64,
            reason: reason.to_string(),
        });

        Ok(())
    }

    /// Retry a failed batch.
    ///
    /// Bounded at [`MAX_BATCH_RETRIES`]: the retry counter is incremented,
    /// failed units are reset to pending, and a follow-on execution of the
    /// same batch row (same batch number) resumes from the first
    /// non-completed unit in processing order. The retained context of the
    /// failed run is reused.
    pub async fn retry(&self, id: BatchId) -> Result<()> {
        if !self.exec.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let batch = self
            .db
            .get_batch(id)
            .await?
            .ok_or(Error::Batch(BatchError::NotFound { id: id.get() }))?;

        let current_status = BatchStatus::from_i32(batch.status);
        if current_status != BatchStatus::Failed {
            return Err(Error::Batch(BatchError::InvalidState {
                id: id.get(),
                operation: "retry".to_string(),
                current_state: status_name(current_status),
            }));
        }

        if batch.retry_count as u32 >= MAX_BATCH_RETRIES {
            return Err(Error::Batch(BatchError::RetryExhausted {
                id: id.get(),
                retry_count: batch.retry_count as u32,
            }));
        }

        let context = self
            .exec
            .contexts
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::Batch(BatchError::MissingContext { id: id.get() }))?;

        let project_language_id = ProjectLanguageId(batch.project_language_id);
        self.reserve_project_language(project_language_id).await?;

        let retry_count = match self.db.increment_retry_count(id).await {
            Ok(count) => count,
            Err(e) => {
                self.release_project_language(project_language_id).await;
                return Err(e);
            }
        };
        let reset_units = match self.db.reset_failed_units(id).await {
            Ok(count) => count,
            Err(e) => {
                self.release_project_language(project_language_id).await;
                return Err(e);
            }
        };

        tracing::info!(
            batch_id = id.0,
            retry_count = retry_count,
            reset_units = reset_units,
            "Retrying failed batch"
        );

        self.spawn_execution(id, project_language_id, context).await;
        Ok(())
    }
}
