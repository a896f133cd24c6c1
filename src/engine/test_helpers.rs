//! Shared fixtures for engine tests: scripted providers and seed helpers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::sync::{Mutex, mpsc};

use crate::config::{Config, RetryConfig};
use crate::context::TranslationContext;
use crate::db::NewUnit;
use crate::error::ProviderError;
use crate::provider::{SourceText, Translation, TranslationProvider};
use crate::types::{BatchEvent, ProjectId, ProjectLanguageId, UnitId};

use super::TranslationEngine;

/// Config with a temp database and fast, deterministic retry delays.
pub(crate) fn fast_config(db_path: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = db_path.to_path_buf();
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

pub(crate) async fn test_engine(
    provider: Arc<dyn TranslationProvider>,
) -> (TranslationEngine, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let engine = TranslationEngine::new(fast_config(temp_file.path()), provider)
        .await
        .unwrap();
    (engine, temp_file)
}

pub(crate) async fn seed_project_language(
    engine: &TranslationEngine,
) -> (ProjectId, ProjectLanguageId) {
    let project_id = engine.db.insert_project("Frostmark Saga").await.unwrap();
    let language_id = engine.db.insert_language("de", "German").await.unwrap();
    let pl_id = engine
        .db
        .insert_project_language(project_id, language_id)
        .await
        .unwrap();
    (project_id, pl_id)
}

/// Seed a second project-language (French) for cross-scope tests.
pub(crate) async fn seed_second_project_language(
    engine: &TranslationEngine,
) -> (ProjectId, ProjectLanguageId) {
    let project_id = engine.db.insert_project("Other Mod").await.unwrap();
    let language_id = engine.db.insert_language("fr", "French").await.unwrap();
    let pl_id = engine
        .db
        .insert_project_language(project_id, language_id)
        .await
        .unwrap();
    (project_id, pl_id)
}

pub(crate) async fn seed_units(
    engine: &TranslationEngine,
    project_language_id: ProjectLanguageId,
    count: usize,
) -> Vec<UnitId> {
    let units: Vec<NewUnit> = (0..count)
        .map(|i| NewUnit {
            project_language_id,
            unit_key: format!("dialogue/line_{:03}", i),
            source_text: format!("Source line {}", i),
        })
        .collect();
    engine.db.insert_units_batch(&units).await.unwrap();
    engine
        .db
        .get_untranslated_ids(project_language_id)
        .await
        .unwrap()
}

/// Receive the next event or fail the test after a generous timeout.
pub(crate) async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<BatchEvent>,
) -> BatchEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Provider that translates instantly with a target-language prefix.
pub(crate) struct EchoProvider;

#[async_trait::async_trait]
impl TranslationProvider for EchoProvider {
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        Ok(texts
            .iter()
            .map(|t| Translation {
                unit_id: t.unit_id,
                text: format!("[{}] {}", context.target_language, t.text),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Provider that rejects any request whose texts contain a marker substring.
pub(crate) struct RejectingProvider {
    pub(crate) marker: &'static str,
}

#[async_trait::async_trait]
impl TranslationProvider for RejectingProvider {
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        if texts.iter().any(|t| t.text.contains(self.marker)) {
            return Err(ProviderError::Rejected(format!(
                "matched marker {:?}",
                self.marker
            )));
        }
        EchoProvider.translate(context, texts).await
    }

    fn name(&self) -> &str {
        "rejecting"
    }
}

/// Provider that always fails authentication (batch-fatal).
pub(crate) struct AuthFailProvider;

#[async_trait::async_trait]
impl TranslationProvider for AuthFailProvider {
    async fn translate(
        &self,
        _context: &TranslationContext,
        _texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        Err(ProviderError::Auth("invalid API key".to_string()))
    }

    fn name(&self) -> &str {
        "auth-fail"
    }
}

/// Provider that fails transiently N times across all calls, then echoes.
pub(crate) struct TransientProvider {
    pub(crate) failures_remaining: AtomicU32,
}

#[async_trait::async_trait]
impl TranslationProvider for TransientProvider {
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        if self.failures_remaining.load(Ordering::SeqCst) > 0 {
            self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(ProviderError::Network("connection reset".to_string()));
        }
        EchoProvider.translate(context, texts).await
    }

    fn name(&self) -> &str {
        "transient"
    }
}

/// Provider that succeeds for the first N calls, then fails transiently
/// until healed. Retry attempts count as calls.
pub(crate) struct FailAfterProvider {
    succeed_first: usize,
    healed: std::sync::atomic::AtomicBool,
    calls: AtomicUsize,
}

impl FailAfterProvider {
    pub(crate) fn new(succeed_first: usize) -> Arc<Self> {
        Arc::new(Self {
            succeed_first,
            healed: std::sync::atomic::AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn heal(&self) {
        self.healed.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl TranslationProvider for FailAfterProvider {
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.healed.load(Ordering::SeqCst) || call <= self.succeed_first {
            EchoProvider.translate(context, texts).await
        } else {
            Err(ProviderError::Network("connection reset".to_string()))
        }
    }

    fn name(&self) -> &str {
        "fail-after"
    }
}

/// Provider that sleeps briefly per call, giving control operations a window.
pub(crate) struct SlowProvider;

#[async_trait::async_trait]
impl TranslationProvider for SlowProvider {
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        EchoProvider.translate(context, texts).await
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Provider gated by the test: announces each call on `started`, then holds
/// until the test sends one permit on the gate channel. Makes chunk
/// boundaries fully deterministic for pause/cancel tests.
pub(crate) struct GatedProvider {
    started_tx: mpsc::UnboundedSender<usize>,
    gate_rx: Mutex<mpsc::UnboundedReceiver<()>>,
    calls: AtomicUsize,
}

impl GatedProvider {
    pub(crate) fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<usize>,
        mpsc::UnboundedSender<()>,
    ) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let (gate_tx, gate_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                started_tx,
                gate_rx: Mutex::new(gate_rx),
                calls: AtomicUsize::new(0),
            }),
            started_rx,
            gate_tx,
        )
    }
}

#[async_trait::async_trait]
impl TranslationProvider for GatedProvider {
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> Result<Vec<Translation>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.started_tx.send(call).ok();
        self.gate_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| ProviderError::Network("gate closed".to_string()))?;
        EchoProvider.translate(context, texts).await
    }

    fn name(&self) -> &str {
        "gated"
    }
}
