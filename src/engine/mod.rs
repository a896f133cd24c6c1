//! Core orchestration engine split into focused submodules.
//!
//! The `TranslationEngine` struct and its methods are organized by domain:
//! - [`planner`] - Batch planning and unit ledger creation
//! - [`control`] - Batch lifecycle control (pause/resume/cancel/retry)
//! - [`task`] - Per-batch execution task (chunked dispatch, progress, finalization)

mod control;
mod planner;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use planner::PlannedBatch;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Mutex, Semaphore, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::context::{ContextBuilder, ContextOverrides, TranslationContext};
use crate::db::Database;
use crate::error::{BatchError, Error, Result};
use crate::provider::TranslationProvider;
use crate::types::{
    BatchEvent, BatchId, BatchInfo, BatchStatus, EventId, EventKind, ProjectId, ProjectLanguageId,
    UnitStatus,
};

/// Control handles for one executing batch task
pub(crate) struct BatchHandle {
    /// Signals cooperative cancellation, polled between chunks
    pub(crate) cancel_token: CancellationToken,
    /// Pause flag; the task holds between chunks while true
    pub(crate) pause_tx: watch::Sender<bool>,
    /// Reason supplied with the cancel request, read by the task at finalization
    pub(crate) cancel_reason: Arc<Mutex<Option<String>>>,
    /// Task handle, awaited during shutdown
    pub(crate) join: tokio::task::JoinHandle<()>,
}

/// Execution state shared across engine clones
pub(crate) struct ExecState {
    /// Map of executing batches to their control handles
    pub(crate) active_batches: Mutex<HashMap<BatchId, BatchHandle>>,
    /// Project-languages with an execution in flight (never two batches for
    /// the same project-language concurrently)
    pub(crate) busy_project_languages: Mutex<HashSet<ProjectLanguageId>>,
    /// Semaphore bounding concurrent batch executions at `parallel_batches`
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Flag to indicate whether new executions are accepted (false during shutdown)
    pub(crate) accepting_new: AtomicBool,
    /// Monotonic event id counter
    pub(crate) event_seq: AtomicU64,
    /// Contexts retained per batch for the lifetime of the run (kept after a
    /// batch-level failure so a retry can reuse them)
    pub(crate) contexts: Mutex<HashMap<BatchId, Arc<TranslationContext>>>,
}

/// Main orchestration engine (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct TranslationEngine {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to seed the catalog and query ledger state
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<BatchEvent>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Translation provider (capability boundary, injected at construction)
    pub(crate) provider: Arc<dyn TranslationProvider>,
    /// Context builder over the same database
    pub(crate) context_builder: Arc<ContextBuilder>,
    /// Execution state shared across clones
    pub(crate) exec: Arc<ExecState>,
}

impl TranslationEngine {
    /// Create a new TranslationEngine instance
    ///
    /// This initializes all core components:
    /// - Opens/creates the SQLite database and runs migrations
    /// - Sets up the event broadcast channel
    /// - Creates the concurrency limiter for parallel batch execution
    ///
    /// The provider is injected explicitly; the engine never resolves
    /// collaborators from ambient global state.
    pub async fn new(config: Config, provider: Arc<dyn TranslationProvider>) -> Result<Self> {
        config.validate()?;

        // Initialize database
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        // Create broadcast channel with buffer size of 1000 events
        // This allows multiple subscribers to receive all events independently
        let (event_tx, _rx) = broadcast::channel(1000);

        let config = Arc::new(config);
        let context_builder = Arc::new(ContextBuilder::new(
            Arc::clone(&db),
            config.translation.clone(),
        ));

        let exec = Arc::new(ExecState {
            active_batches: Mutex::new(HashMap::new()),
            busy_project_languages: Mutex::new(HashSet::new()),
            concurrent_limit: Arc::new(Semaphore::new(config.translation.parallel_batches)),
            accepting_new: AtomicBool::new(true),
            event_seq: AtomicU64::new(1),
            contexts: Mutex::new(HashMap::new()),
        });

        tracing::info!(
            provider = provider.name(),
            parallel_batches = config.translation.parallel_batches,
            "Translation engine initialized"
        );

        Ok(Self {
            db,
            event_tx,
            config,
            provider,
            context_builder,
            exec,
        })
    }

    /// Subscribe to batch lifecycle events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. Events are buffered, but if a subscriber falls behind by
    /// more than 1000 events, it will receive a `RecvError::Lagged` error.
    ///
    /// Delivery is at-least-once; consumers deduplicate by
    /// [`BatchEvent::id`](crate::types::BatchEvent).
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.event_tx.subscribe()
    }

    /// The context builder backed by this engine's database
    pub fn context_builder(&self) -> &ContextBuilder {
        &self.context_builder
    }

    /// Build a context and run a full translation pass for a project-language.
    ///
    /// Convenience wrapper: builds the context, plans a batch over all
    /// currently untranslated units, and starts execution. Returns the id of
    /// the started batch.
    pub async fn translate_project_language(
        &self,
        project_id: ProjectId,
        project_language_id: ProjectLanguageId,
        provider_id: &str,
        overrides: ContextOverrides,
    ) -> Result<BatchId> {
        let context = self
            .context_builder
            .build(project_id, project_language_id, provider_id, overrides)
            .await;
        let planned = self
            .plan_batch(project_language_id, provider_id, None)
            .await?;
        self.start_batch(planned.batch_id, context).await?;
        Ok(planned.batch_id)
    }

    /// Start executing a planned batch under the given context.
    ///
    /// Fails if the batch is not pending, or if another batch for the same
    /// project-language is already executing. The context is retained for the
    /// duration of the run (and after a batch-level failure, for retry).
    pub async fn start_batch(&self, batch_id: BatchId, context: TranslationContext) -> Result<()> {
        if !self.exec.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let batch = self.db.get_batch(batch_id).await?.ok_or(Error::Batch(
            BatchError::NotFound { id: batch_id.get() },
        ))?;

        let current_status = BatchStatus::from_i32(batch.status);
        if current_status != BatchStatus::Pending {
            return Err(Error::Batch(BatchError::InvalidState {
                id: batch_id.get(),
                operation: "start".to_string(),
                current_state: status_name(current_status),
            }));
        }

        let project_language_id = ProjectLanguageId(batch.project_language_id);
        self.reserve_project_language(project_language_id).await?;
        self.spawn_execution(batch_id, project_language_id, Arc::new(context))
            .await;
        Ok(())
    }

    /// Get an inspectable snapshot of a batch
    pub async fn get_batch(&self, batch_id: BatchId) -> Result<BatchInfo> {
        let batch = self.db.get_batch(batch_id).await?.ok_or(Error::Batch(
            BatchError::NotFound { id: batch_id.get() },
        ))?;
        self.batch_info(batch).await
    }

    /// List all batches for a project-language, oldest first (the audit trail)
    pub async fn list_batches(
        &self,
        project_language_id: ProjectLanguageId,
    ) -> Result<Vec<BatchInfo>> {
        let batches = self.db.list_batches(project_language_id).await?;
        let mut infos = Vec::with_capacity(batches.len());
        for batch in batches {
            infos.push(self.batch_info(batch).await?);
        }
        Ok(infos)
    }

    /// Gracefully shut down the engine.
    ///
    /// Stops accepting new executions, cancels every active batch, waits for
    /// their tasks to finish recording state, and closes the database.
    pub async fn shutdown(&self) -> Result<()> {
        self.exec.accepting_new.store(false, Ordering::SeqCst);

        let handles: Vec<(BatchId, BatchHandle)> = {
            let mut active = self.exec.active_batches.lock().await;
            active.drain().collect()
        };

        for (batch_id, handle) in &handles {
            tracing::info!(batch_id = batch_id.0, "Cancelling batch for shutdown");
            *handle.cancel_reason.lock().await = Some("engine shutdown".to_string());
            handle.cancel_token.cancel();
        }

        for (batch_id, handle) in handles {
            if let Err(e) = handle.join.await {
                tracing::error!(batch_id = batch_id.0, error = %e, "Batch task panicked during shutdown");
            }
        }

        self.db.close().await;
        Ok(())
    }

    /// Emit an event to all subscribers
    ///
    /// Events get a unique id and timestamp here. If there are no active
    /// subscribers, the event is silently dropped (ok() converts Err to None);
    /// execution continues even if no one is listening.
    pub(crate) fn emit_event(&self, kind: EventKind) {
        let event = BatchEvent {
            id: EventId(self.exec.event_seq.fetch_add(1, Ordering::Relaxed)),
            timestamp: Utc::now(),
            kind,
        };
        self.event_tx.send(event).ok();
    }

    /// Claim the per-project-language execution slot
    pub(crate) async fn reserve_project_language(
        &self,
        project_language_id: ProjectLanguageId,
    ) -> Result<()> {
        let mut busy = self.exec.busy_project_languages.lock().await;
        if busy.contains(&project_language_id) {
            return Err(Error::Batch(BatchError::ProjectLanguageBusy {
                project_language_id: project_language_id.get(),
            }));
        }
        busy.insert(project_language_id);
        Ok(())
    }

    /// Release the per-project-language execution slot
    pub(crate) async fn release_project_language(&self, project_language_id: ProjectLanguageId) {
        let mut busy = self.exec.busy_project_languages.lock().await;
        busy.remove(&project_language_id);
    }

    /// Spawn the execution task for a batch and register its control handle.
    ///
    /// The caller must have reserved the project-language slot. The task waits
    /// for the handle to be registered before touching any state, so control
    /// operations observe a consistent map.
    pub(crate) async fn spawn_execution(
        &self,
        batch_id: BatchId,
        project_language_id: ProjectLanguageId,
        context: Arc<TranslationContext>,
    ) {
        self.exec
            .contexts
            .lock()
            .await
            .insert(batch_id, Arc::clone(&context));

        let cancel_token = CancellationToken::new();
        let (pause_tx, pause_rx) = watch::channel(false);
        let cancel_reason = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let task_ctx = task::BatchTaskContext {
            engine: self.clone(),
            batch_id,
            project_language_id,
            context,
            cancel_token: cancel_token.clone(),
            pause_rx,
            cancel_reason: Arc::clone(&cancel_reason),
        };
        let join = tokio::spawn(task::run_batch_task(task_ctx, ready_rx));

        self.exec.active_batches.lock().await.insert(
            batch_id,
            BatchHandle {
                cancel_token,
                pause_tx,
                cancel_reason,
                join,
            },
        );
        let _ = ready_tx.send(());
    }

    /// Tear down an execution's registration.
    ///
    /// Runs before the terminal event is emitted so a caller reacting to the
    /// event (e.g., issuing a retry) observes a quiescent engine. The context
    /// is retained when `drop_context` is false (batch-level failure, retry
    /// still possible).
    pub(crate) async fn finish_execution(
        &self,
        batch_id: BatchId,
        project_language_id: ProjectLanguageId,
        drop_context: bool,
    ) {
        self.exec.active_batches.lock().await.remove(&batch_id);
        self.release_project_language(project_language_id).await;
        if drop_context {
            self.exec.contexts.lock().await.remove(&batch_id);
        }
    }

    /// Assemble a [`BatchInfo`] from a batch row plus ledger counts
    async fn batch_info(&self, batch: crate::db::Batch) -> Result<BatchInfo> {
        let id = BatchId(batch.id);
        let completed = self
            .db
            .count_units_by_status(id, UnitStatus::Completed.to_i32())
            .await?;
        let failed = self
            .db
            .count_units_by_status(id, UnitStatus::Failed.to_i32())
            .await?;

        Ok(BatchInfo {
            id,
            project_language_id: ProjectLanguageId(batch.project_language_id),
            provider_id: batch.provider_id,
            batch_number: batch.batch_number,
            status: BatchStatus::from_i32(batch.status),
            total_units: batch.units_count as u64,
            completed_units: completed as u64,
            failed_units: failed as u64,
            retry_count: batch.retry_count as u32,
            error_message: batch.error_message,
            created_at: timestamp(batch.created_at),
            started_at: batch.started_at.map(timestamp),
            completed_at: batch.completed_at.map(timestamp),
        })
    }
}

/// Lowercase status name for error messages
pub(crate) fn status_name(status: BatchStatus) -> String {
    format!("{:?}", status).to_lowercase()
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}
