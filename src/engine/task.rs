//! Per-batch execution task — chunked dispatch, progress accounting, and finalization.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::context::TranslationContext;
use crate::error::ProviderError;
use crate::provider::{SourceText, Translation};
use crate::retry::translate_with_retry;
use crate::types::{BatchId, BatchStatus, EventKind, ProjectLanguageId, UnitId, UnitStatus};

use super::TranslationEngine;

/// Engine-chosen chunk size when the context leaves it automatic (0).
///
/// Sequential dispatch — one unit per provider request — is the safe default
/// when provider capabilities are unknown.
const DEFAULT_CHUNK_SIZE: usize = 1;

/// Shared context for a single batch execution task
pub(crate) struct BatchTaskContext {
    pub(crate) engine: TranslationEngine,
    pub(crate) batch_id: BatchId,
    pub(crate) project_language_id: ProjectLanguageId,
    pub(crate) context: Arc<TranslationContext>,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) pause_rx: watch::Receiver<bool>,
    pub(crate) cancel_reason: Arc<tokio::sync::Mutex<Option<String>>>,
}

/// Decision of the between-chunks control gate
enum Gate {
    Proceed,
    Cancelled,
}

/// Per-chunk dispatch outcome (running-counter deltas)
struct ChunkOutcome {
    completed: u64,
    failed: u64,
}

/// Core batch task -- orchestrates the full lifecycle of a single execution.
///
/// Phases:
/// 1. Wait for handle registration, then for a concurrency permit
/// 2. Transition the batch to Translating
/// 3. Dispatch pending units chunk by chunk, sequentially, honoring
///    pause/cancel between chunks
/// 4. Finalize as completed, failed, or cancelled
pub(crate) async fn run_batch_task(
    mut ctx: BatchTaskContext,
    ready: tokio::sync::oneshot::Receiver<()>,
) {
    // The engine registers our control handle right after spawning; wait so
    // pause/cancel always have something to grab onto.
    let _ = ready.await;

    // Respect the batch parallelism bound; a queued batch can still be cancelled
    let permit = tokio::select! {
        permit = ctx.engine.exec.concurrent_limit.clone().acquire_owned() => {
            match permit {
                Ok(p) => p,
                Err(_) => {
                    tracing::error!(
                        batch_id = ctx.batch_id.0,
                        "Concurrency limiter closed, abandoning batch"
                    );
                    ctx.engine
                        .finish_execution(ctx.batch_id, ctx.project_language_id, true)
                        .await;
                    return;
                }
            }
        }
        _ = ctx.cancel_token.cancelled() => {
            // Cancelled while waiting for a slot; nothing was dispatched
            let counts = ledger_counts(&ctx.engine, ctx.batch_id).await;
            finalize_cancelled(&ctx, counts.0, counts.1).await;
            return;
        }
    };

    run_execution(&mut ctx).await;
    drop(permit);
}

/// Current (completed, total) counts from the ledger
async fn ledger_counts(engine: &TranslationEngine, batch_id: BatchId) -> (u64, u64) {
    let completed = engine
        .db
        .count_units_by_status(batch_id, UnitStatus::Completed.to_i32())
        .await
        .unwrap_or(0);
    let total = engine.db.count_units(batch_id).await.unwrap_or(0);
    (completed as u64, total as u64)
}

async fn run_execution(ctx: &mut BatchTaskContext) {
    let engine = ctx.engine.clone();
    let id = ctx.batch_id;

    let batch = match engine.db.get_batch(id).await {
        Ok(Some(batch)) => batch,
        Ok(None) => {
            tracing::warn!(batch_id = id.0, "Batch not found in database");
            engine
                .finish_execution(id, ctx.project_language_id, true)
                .await;
            return;
        }
        Err(e) => {
            tracing::error!(batch_id = id.0, error = %e, "Failed to fetch batch");
            engine
                .finish_execution(id, ctx.project_language_id, true)
                .await;
            return;
        }
    };

    let current_status = BatchStatus::from_i32(batch.status);
    if !current_status.can_transition_to(BatchStatus::Translating) {
        tracing::warn!(
            batch_id = id.0,
            status = ?current_status,
            "Batch is not startable, abandoning execution"
        );
        engine
            .finish_execution(id, ctx.project_language_id, true)
            .await;
        return;
    }

    if let Err(e) = engine
        .db
        .update_batch_status(id, BatchStatus::Translating.to_i32())
        .await
    {
        tracing::error!(batch_id = id.0, error = %e, "Failed to update batch status");
        engine
            .finish_execution(id, ctx.project_language_id, true)
            .await;
        return;
    }
    if let Err(e) = engine.db.set_batch_started(id).await {
        tracing::error!(batch_id = id.0, error = %e, "Failed to set batch start time");
    }

    let total = batch.units_count as u64;

    // Running counters seed from the ledger so completions of an earlier
    // execution (before a retry) keep counting; progress stays O(1) per chunk.
    let mut completed = match engine
        .db
        .count_units_by_status(id, UnitStatus::Completed.to_i32())
        .await
    {
        Ok(n) => n as u64,
        Err(e) => {
            finalize_failed(ctx, &batch, e.to_string(), 0, total).await;
            return;
        }
    };
    let mut failed = match engine
        .db
        .count_units_by_status(id, UnitStatus::Failed.to_i32())
        .await
    {
        Ok(n) => n as u64,
        Err(e) => {
            finalize_failed(ctx, &batch, e.to_string(), completed, total).await;
            return;
        }
    };

    engine.emit_event(EventKind::BatchStarted {
        batch_id: id,
        project_language_id: ctx.project_language_id,
        provider_id: batch.provider_id.clone(),
        batch_number: batch.batch_number,
        total_units: total,
    });

    let pending = match engine.db.get_pending_units(id).await {
        Ok(pending) => pending,
        Err(e) => {
            finalize_failed(ctx, &batch, e.to_string(), completed, total).await;
            return;
        }
    };

    let chunk_size = if ctx.context.units_per_batch == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        ctx.context.units_per_batch
    };
    let execution_start = Instant::now();

    for chunk in pending.chunks(chunk_size) {
        // Cancellation and pause are observed between chunks only; an
        // in-flight provider call always completes and its result is
        // recorded for audit before the terminal transition.
        match control_gate(ctx).await {
            Gate::Proceed => {}
            Gate::Cancelled => {
                finalize_cancelled(ctx, completed, total).await;
                return;
            }
        }

        match dispatch_chunk(ctx, chunk).await {
            Ok(outcome) => {
                completed += outcome.completed;
                failed += outcome.failed;
            }
            Err(e) => {
                finalize_failed(ctx, &batch, e.to_string(), completed, total).await;
                return;
            }
        }

        ctx.engine.emit_event(EventKind::BatchProgress {
            batch_id: id,
            total_units: total,
            completed_units: completed,
            failed_units: failed,
        });
    }

    finalize_completed(ctx, &batch, completed, failed, total, execution_start.elapsed()).await;
}

/// Hold between chunks while paused; report cancellation.
async fn control_gate(ctx: &mut BatchTaskContext) -> Gate {
    loop {
        if ctx.cancel_token.is_cancelled() {
            return Gate::Cancelled;
        }
        if !*ctx.pause_rx.borrow() {
            return Gate::Proceed;
        }

        tokio::select! {
            changed = ctx.pause_rx.changed() => {
                if changed.is_err() {
                    // Control handle gone; treat as resumed
                    return Gate::Proceed;
                }
            }
            _ = ctx.cancel_token.cancelled() => {
                return Gate::Cancelled;
            }
        }
    }
}

/// Dispatch one chunk to the provider and record per-unit outcomes.
///
/// Unit-local failures mark the chunk's units failed and let the batch
/// continue; batch-fatal failures (and transient failures that exhausted
/// their retries) are returned to the caller to abort the batch.
async fn dispatch_chunk(
    ctx: &BatchTaskContext,
    chunk: &[crate::db::BatchUnit],
) -> Result<ChunkOutcome, ProviderError> {
    let engine = &ctx.engine;
    let id = ctx.batch_id;

    let unit_ids: Vec<UnitId> = chunk.iter().map(|u| UnitId(u.unit_id)).collect();
    let units = match engine.db.get_unit_texts(&unit_ids).await {
        Ok(units) => units,
        Err(e) => {
            // Source texts unavailable: fail the chunk locally, keep the batch going
            tracing::error!(batch_id = id.0, error = %e, "Failed to load source texts for chunk");
            let updates: Vec<(i64, i32)> = chunk
                .iter()
                .map(|u| (u.id, UnitStatus::Failed.to_i32()))
                .collect();
            record_ledger_updates(engine, id, &updates).await;
            return Ok(ChunkOutcome {
                completed: 0,
                failed: updates.len() as u64,
            });
        }
    };

    // Ledger rows whose content unit vanished are unit-local failures
    let found: HashSet<i64> = units.iter().map(|u| u.id).collect();
    let mut failed_rows: Vec<(i64, i32)> = chunk
        .iter()
        .filter(|u| !found.contains(&u.unit_id))
        .map(|u| (u.id, UnitStatus::Failed.to_i32()))
        .collect();
    for (row_id, _) in &failed_rows {
        tracing::warn!(
            batch_id = id.0,
            batch_unit_id = *row_id,
            "Content unit missing, marking batch unit failed"
        );
    }

    let texts: Vec<SourceText> = units
        .iter()
        .map(|u| SourceText {
            unit_id: UnitId(u.id),
            key: u.unit_key.clone(),
            text: u.source_text.clone(),
        })
        .collect();

    if texts.is_empty() {
        record_ledger_updates(engine, id, &failed_rows).await;
        return Ok(ChunkOutcome {
            completed: 0,
            failed: failed_rows.len() as u64,
        });
    }

    let result = translate_with_retry(&engine.config.retry, || {
        engine.provider.translate(&ctx.context, &texts)
    })
    .await;

    match result {
        Ok(translations) => {
            let mut by_unit: HashMap<i64, Translation> = translations
                .into_iter()
                .map(|t| (t.unit_id.get(), t))
                .collect();

            let mut completed_rows: Vec<(i64, i32)> = Vec::with_capacity(chunk.len());
            for ledger_row in chunk.iter().filter(|u| found.contains(&u.unit_id)) {
                match by_unit.remove(&ledger_row.unit_id) {
                    Some(translation) => {
                        if let Err(e) = engine
                            .db
                            .set_translation(UnitId(ledger_row.unit_id), &translation.text)
                            .await
                        {
                            tracing::error!(
                                batch_id = id.0,
                                unit_id = ledger_row.unit_id,
                                error = %e,
                                "Failed to store translation, marking unit failed"
                            );
                            failed_rows.push((ledger_row.id, UnitStatus::Failed.to_i32()));
                        } else {
                            completed_rows.push((ledger_row.id, UnitStatus::Completed.to_i32()));
                        }
                    }
                    None => {
                        tracing::warn!(
                            batch_id = id.0,
                            unit_id = ledger_row.unit_id,
                            "Provider response missing unit, marking failed"
                        );
                        failed_rows.push((ledger_row.id, UnitStatus::Failed.to_i32()));
                    }
                }
            }
            if !by_unit.is_empty() {
                tracing::warn!(
                    batch_id = id.0,
                    unknown_units = by_unit.len(),
                    "Provider returned translations for units not in the chunk, ignoring"
                );
            }

            let completed = completed_rows.len() as u64;
            let failed = failed_rows.len() as u64;
            let mut updates = completed_rows;
            updates.append(&mut failed_rows);
            record_ledger_updates(engine, id, &updates).await;

            Ok(ChunkOutcome { completed, failed })
        }
        Err(e) if e.is_unit_local() => {
            // Failure is local to this chunk's units; siblings keep going
            tracing::warn!(
                batch_id = id.0,
                units = chunk.len(),
                error = %e,
                "Unit-local provider failure, continuing with remaining units"
            );
            let mut updates = failed_rows;
            updates.extend(
                chunk
                    .iter()
                    .filter(|u| found.contains(&u.unit_id))
                    .map(|u| (u.id, UnitStatus::Failed.to_i32())),
            );
            record_ledger_updates(engine, id, &updates).await;
            Ok(ChunkOutcome {
                completed: 0,
                failed: updates.len() as u64,
            })
        }
        Err(e) => Err(e),
    }
}

/// Persist ledger transitions for a chunk, logging (not propagating) failures.
async fn record_ledger_updates(engine: &TranslationEngine, batch_id: BatchId, updates: &[(i64, i32)]) {
    if updates.is_empty() {
        return;
    }
    if let Err(e) = engine.db.update_units_status_batch(updates).await {
        tracing::error!(
            batch_id = batch_id.0,
            updates = updates.len(),
            error = %e,
            "Failed to persist batch unit statuses"
        );
    }
}

async fn finalize_completed(
    ctx: &BatchTaskContext,
    batch: &crate::db::Batch,
    completed: u64,
    failed: u64,
    total: u64,
    processing_duration: Duration,
) {
    let engine = &ctx.engine;
    let id = ctx.batch_id;

    // A non-zero failed count is still Completed; the failed units stay
    // inspectable in the ledger and a new batch can pick them up.
    if let Err(e) = engine
        .db
        .update_batch_status(id, BatchStatus::Completed.to_i32())
        .await
    {
        tracing::error!(batch_id = id.0, error = %e, "Failed to mark batch completed");
        engine
            .finish_execution(id, ctx.project_language_id, true)
            .await;
        return;
    }
    if let Err(e) = engine.db.set_batch_completed(id).await {
        tracing::error!(batch_id = id.0, error = %e, "Failed to set batch completion time");
    }

    tracing::info!(
        batch_id = id.0,
        completed = completed,
        failed = failed,
        duration_ms = processing_duration.as_millis(),
        "Batch completed"
    );

    engine
        .finish_execution(id, ctx.project_language_id, true)
        .await;
    engine.emit_event(EventKind::BatchCompleted {
        batch_id: id,
        project_language_id: ctx.project_language_id,
        batch_number: batch.batch_number,
        total_units: total,
        completed_units: completed,
        failed_units: failed,
        processing_duration,
    });
}

async fn finalize_failed(
    ctx: &BatchTaskContext,
    batch: &crate::db::Batch,
    error: String,
    completed: u64,
    total: u64,
) {
    let engine = &ctx.engine;
    let id = ctx.batch_id;

    tracing::error!(batch_id = id.0, error = %error, "Batch failed");

    if let Err(e) = engine
        .db
        .update_batch_status(id, BatchStatus::Failed.to_i32())
        .await
    {
        tracing::error!(batch_id = id.0, error = %e, "Failed to mark batch failed");
    }
    if let Err(e) = engine.db.set_batch_error(id, &error).await {
        tracing::error!(batch_id = id.0, error = %e, "Failed to record batch error");
    }
    if let Err(e) = engine.db.set_batch_completed(id).await {
        tracing::error!(batch_id = id.0, error = %e, "Failed to set batch completion time");
    }

    // Keep the context registered so a retry can reuse it
    engine
        .finish_execution(id, ctx.project_language_id, false)
        .await;
    engine.emit_event(EventKind::BatchFailed {
        batch_id: id,
        project_language_id: ctx.project_language_id,
        batch_number: batch.batch_number,
        error,
        completed_before_failure: completed,
        total_units: total,
        retry_count: batch.retry_count as u32,
    });
}

async fn finalize_cancelled(ctx: &BatchTaskContext, completed: u64, total: u64) {
    let engine = &ctx.engine;
    let id = ctx.batch_id;

    let reason = ctx
        .cancel_reason
        .lock()
        .await
        .take()
        .unwrap_or_else(|| "cancelled by user".to_string());

    tracing::info!(
        batch_id = id.0,
        completed = completed,
        reason = %reason,
        "Batch cancelled; unresolved units stay pending"
    );

    if let Err(e) = engine
        .db
        .update_batch_status(id, BatchStatus::Cancelled.to_i32())
        .await
    {
        tracing::error!(batch_id = id.0, error = %e, "Failed to mark batch cancelled");
    }
    if let Err(e) = engine.db.set_batch_completed(id).await {
        tracing::error!(batch_id = id.0, error = %e, "Failed to set batch completion time");
    }

    engine
        .finish_execution(id, ctx.project_language_id, true)
        .await;
    engine.emit_event(EventKind::BatchCancelled {
        batch_id: id,
        project_language_id: ctx.project_language_id,
        completed_units: completed,
        total_units: total,
        reason,
    });
}
