//! Batch planning — candidate selection, batch numbering, and ledger creation.

use std::collections::HashSet;

use crate::db::{NewBatch, NewBatchUnit};
use crate::error::{BatchError, Error, Result};
use crate::types::{BatchId, BatchStatus, ProjectLanguageId, UnitId};

use super::TranslationEngine;

/// Result of planning a batch: the persisted header plus its ordered unit ids
#[derive(Clone, Debug)]
pub struct PlannedBatch {
    /// The new batch
    pub batch_id: BatchId,

    /// Assigned batch number (1-based, strictly increasing per project-language)
    pub batch_number: i64,

    /// Owning project-language
    pub project_language_id: ProjectLanguageId,

    /// Unit ids in processing order
    pub unit_ids: Vec<UnitId>,
}

impl TranslationEngine {
    /// Plan a new batch for a project-language.
    ///
    /// The candidate unit list is either freshly queried (all currently
    /// untranslated units, `candidates = None`) or supplied by the caller and
    /// narrowed to those still untranslated. Processing order equals the input
    /// list order; callers are responsible for any pre-sort.
    ///
    /// The batch header and its full unit ledger are written together: if the
    /// header insert fails nothing is written, and if the ledger insert fails
    /// the header is poisoned (marked failed) so it can never start.
    pub async fn plan_batch(
        &self,
        project_language_id: ProjectLanguageId,
        provider_id: &str,
        candidates: Option<Vec<UnitId>>,
    ) -> Result<PlannedBatch> {
        if !self
            .exec
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(Error::ShuttingDown);
        }

        self.db
            .get_project_language(project_language_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "project-language {} not found",
                    project_language_id
                ))
            })?;

        let unit_ids = match candidates {
            Some(ids) => {
                // A duplicate candidate is a caller bug, not a runtime state
                let mut seen = HashSet::with_capacity(ids.len());
                for id in &ids {
                    if !seen.insert(*id) {
                        return Err(Error::Batch(BatchError::DuplicateCandidate {
                            unit_id: id.get(),
                        }));
                    }
                }
                self.db
                    .filter_untranslated_ids(&ids, project_language_id)
                    .await?
            }
            None => self.db.get_untranslated_ids(project_language_id).await?,
        };

        if unit_ids.is_empty() {
            return Err(Error::Batch(BatchError::NothingToTranslate {
                project_language_id: project_language_id.get(),
            }));
        }

        let (batch_id, batch_number) = self
            .db
            .insert_batch(&NewBatch {
                project_language_id,
                provider_id: provider_id.to_string(),
                units_count: unit_ids.len() as i64,
                status: BatchStatus::Pending.to_i32(),
            })
            .await?;

        let rows: Vec<NewBatchUnit> = unit_ids
            .iter()
            .enumerate()
            .map(|(order, unit_id)| NewBatchUnit {
                batch_id,
                unit_id: *unit_id,
                processing_order: order as i32,
            })
            .collect();

        if let Err(e) = self.db.insert_batch_units(&rows).await {
            // The header row is not rolled back; poison it so the execution
            // controller can never start a batch without its ledger.
            let reason = e.to_string();
            tracing::error!(
                batch_id = batch_id.0,
                error = %reason,
                "Batch unit ledger insert failed"
            );
            if let Err(update_err) = self
                .db
                .update_batch_status(batch_id, BatchStatus::Failed.to_i32())
                .await
            {
                tracing::error!(
                    batch_id = batch_id.0,
                    error = %update_err,
                    "Failed to mark ledger-less batch as failed"
                );
            }
            if let Err(update_err) = self
                .db
                .set_batch_error(batch_id, &format!("unit ledger insert failed: {}", reason))
                .await
            {
                tracing::error!(
                    batch_id = batch_id.0,
                    error = %update_err,
                    "Failed to record ledger insert error"
                );
            }
            return Err(Error::Batch(BatchError::LedgerIncomplete {
                id: batch_id.get(),
                reason,
            }));
        }

        tracing::info!(
            batch_id = batch_id.0,
            batch_number = batch_number,
            units = unit_ids.len(),
            project_language_id = project_language_id.0,
            provider_id = provider_id,
            "Planned translation batch"
        );

        Ok(PlannedBatch {
            batch_id,
            batch_number,
            project_language_id,
            unit_ids,
        })
    }
}
