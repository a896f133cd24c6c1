//! # modloc
//!
//! Translation batch orchestration library for game mod localization.
//!
//! ## Design Philosophy
//!
//! modloc is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Provider-agnostic** - Translation providers plug in behind a trait
//! - **Event-driven** - Consumers subscribe to lifecycle events, no polling required
//! - **Resumable** - Every unit's status is persisted, so batches survive
//!   pause, cancellation, and bounded retry without losing completed work
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use modloc::{Config, TranslationEngine, TranslationProvider};
//!
//! # fn provider() -> Arc<dyn TranslationProvider> { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = TranslationEngine::new(Config::default(), provider()).await?;
//!
//!     // Subscribe to lifecycle events
//!     let mut events = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Translation request context assembly
pub mod context;
/// Database persistence layer
pub mod db;
/// Batch planning, execution, and lifecycle control
pub mod engine;
/// Error types
pub mod error;
/// Translation provider capability boundary
pub mod provider;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, PersistenceConfig, RetryConfig, TranslationConfig};
pub use context::{ContextBuilder, ContextOverrides, GlossaryTerm, TmHint, TranslationContext};
pub use db::Database;
pub use engine::{PlannedBatch, TranslationEngine};
pub use error::{BatchError, DatabaseError, Error, ProviderError, Result};
pub use provider::{SourceText, Translation, TranslationProvider};
pub use types::{
    BatchEvent, BatchId, BatchInfo, BatchStatus, EventId, EventKind, GlossaryId, LanguageId,
    MAX_BATCH_RETRIES, ProjectId, ProjectLanguageId, SOURCE_LANGUAGE, UnitId, UnitStatus,
};
