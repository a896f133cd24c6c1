//! Database layer for modloc
//!
//! Handles SQLite persistence for the localization catalog, content units,
//! glossaries, and the batch/unit ledger.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`catalog`] — Projects, languages, and project-language pairs
//! - [`units`] — Translatable content units and untranslated queries
//! - [`glossaries`] — Glossaries and term lists with surface-form variants
//! - [`batches`] — Translation batch headers and batch numbering
//! - [`batch_units`] — The per-unit ledger: processing order and unit status

use sqlx::{FromRow, sqlite::SqlitePool};

use crate::types::{BatchId, GlossaryId, ProjectLanguageId, UnitId};

mod batch_units;
mod batches;
mod catalog;
mod glossaries;
mod migrations;
mod units;

/// Project record from database
#[derive(Debug, Clone, FromRow)]
pub struct Project {
    /// Unique database ID
    pub id: i64,
    /// Display name (typically the game or mod project name)
    pub name: String,
    /// Unix timestamp when the project was created
    pub created_at: i64,
}

/// Language record from database
#[derive(Debug, Clone, FromRow)]
pub struct Language {
    /// Unique database ID
    pub id: i64,
    /// ISO language code (e.g., "de")
    pub code: String,
    /// Display name (e.g., "German")
    pub name: String,
}

/// Project-language pair record from database
#[derive(Debug, Clone, FromRow)]
pub struct ProjectLanguage {
    /// Unique database ID
    pub id: i64,
    /// Owning project
    pub project_id: i64,
    /// Target language of this pair
    pub language_id: i64,
}

/// New content unit to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewUnit {
    /// Project-language this unit belongs to
    pub project_language_id: ProjectLanguageId,
    /// Stable key of the unit (e.g., "dialogue/greeting_01")
    pub unit_key: String,
    /// Untranslated source text
    pub source_text: String,
}

/// Content unit record from database
#[derive(Debug, Clone, FromRow)]
pub struct Unit {
    /// Unique database ID
    pub id: i64,
    /// Project-language this unit belongs to
    pub project_language_id: i64,
    /// Stable key of the unit
    pub unit_key: String,
    /// Untranslated source text
    pub source_text: String,
    /// Accepted translation (None = untranslated)
    pub translated_text: Option<String>,
    /// Unix timestamp when the translation was stored
    pub translated_at: Option<i64>,
    /// Unix timestamp when the unit was imported
    pub created_at: i64,
}

/// Glossary record from database
#[derive(Debug, Clone, FromRow)]
pub struct Glossary {
    /// Unique database ID
    pub id: i64,
    /// Owning project (None = universal glossary)
    pub project_id: Option<i64>,
    /// Target language code this glossary applies to (uppercased)
    pub language_code: String,
    /// Display name
    pub name: String,
}

/// New glossary term to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewGlossaryTerm {
    /// Glossary this term belongs to
    pub glossary_id: GlossaryId,
    /// Source-language term
    pub source_term: String,
    /// Mandated target-language rendering
    pub target_term: String,
    /// Alternate surface forms (stored as a JSON array)
    pub variants: Vec<String>,
}

/// Glossary term record from database
#[derive(Debug, Clone, FromRow)]
pub struct GlossaryTermRow {
    /// Unique database ID
    pub id: i64,
    /// Glossary this term belongs to
    pub glossary_id: i64,
    /// Source-language term
    pub source_term: String,
    /// Mandated target-language rendering
    pub target_term: String,
    /// Alternate surface forms as a JSON array (None = no variants)
    pub variants: Option<String>,
}

/// Source/translation pair used for translation-memory hints
#[derive(Debug, Clone, FromRow)]
pub struct TranslatedPair {
    /// Previously translated source text
    pub source_text: String,
    /// Its accepted translation
    pub translated_text: String,
}

/// New translation batch header to be inserted into the database
///
/// The batch number is not a field: it is assigned atomically at insert time
/// as `max(existing) + 1` within the project-language.
#[derive(Debug, Clone)]
pub struct NewBatch {
    /// Project-language this batch belongs to
    pub project_language_id: ProjectLanguageId,
    /// Provider the batch dispatches to
    pub provider_id: String,
    /// Number of units assigned to the batch
    pub units_count: i64,
    /// Initial status (0 = pending)
    pub status: i32,
}

/// Translation batch record from database
#[derive(Debug, Clone, FromRow)]
pub struct Batch {
    /// Unique database ID
    pub id: i64,
    /// Project-language this batch belongs to
    pub project_language_id: i64,
    /// Provider the batch dispatches to
    pub provider_id: String,
    /// Batch number within the project-language (1-based, never reused)
    pub batch_number: i64,
    /// Number of units assigned to the batch
    pub units_count: i64,
    /// Current status (see [`crate::types::BatchStatus`])
    pub status: i32,
    /// Batch-level retries consumed
    pub retry_count: i32,
    /// Error message of the most recent batch-level failure
    pub error_message: Option<String>,
    /// Unix timestamp when the batch was planned
    pub created_at: i64,
    /// Unix timestamp when the most recent execution started
    pub started_at: Option<i64>,
    /// Unix timestamp when the batch reached a terminal status
    pub completed_at: Option<i64>,
}

/// New batch unit assignment to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewBatchUnit {
    /// Owning batch
    pub batch_id: BatchId,
    /// The content unit assigned to the batch
    pub unit_id: UnitId,
    /// Dispatch position within the batch (0-based)
    pub processing_order: i32,
}

/// Batch unit ledger record from database
#[derive(Debug, Clone, FromRow)]
pub struct BatchUnit {
    /// Unique database ID
    pub id: i64,
    /// Owning batch
    pub batch_id: i64,
    /// The content unit assigned to the batch
    pub unit_id: i64,
    /// Dispatch position within the batch (0-based)
    pub processing_order: i32,
    /// Unit status (see [`crate::types::UnitStatus`])
    pub status: i32,
    /// Unix timestamp when the unit reached a terminal status
    pub attempted_at: Option<i64>,
}

/// Database handle for modloc
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
