//! Translation request context assembly.
//!
//! The [`ContextBuilder`] resolves the target language, glossary terms, and
//! translation-memory hints for one translation request and freezes them into
//! an immutable [`TranslationContext`] shared by every unit of the batch.
//! Changing the target language or glossary means building a new context and
//! planning a new batch, never mutating in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::TranslationConfig;
use crate::db::Database;
use crate::types::{GlossaryId, ProjectId, ProjectLanguageId, SOURCE_LANGUAGE};

/// Unique identifier for a translation context (opaque, per-engine)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A controlled source→target vocabulary mapping supplied to providers.
///
/// `variants` carries inflected or alternate surface forms of the source
/// term. No per-unit filtering happens here; matching terms against an
/// individual source text is a downstream concern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    /// Source-language term
    pub source: String,

    /// Mandated target-language rendering
    pub target: String,

    /// Alternate surface forms of the source term (inflections, plurals)
    pub variants: Vec<String>,
}

/// A prior translation supplied to providers as a consistency hint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmHint {
    /// Previously translated source text
    pub source: String,

    /// Its accepted translation
    pub target: String,
}

/// Immutable request envelope shared by all units of one batch run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranslationContext {
    /// Opaque context identifier
    pub id: ContextId,

    /// Owning project
    pub project_id: ProjectId,

    /// Owning project-language
    pub project_language_id: ProjectLanguageId,

    /// Provider the batch dispatches to (opaque id)
    pub provider_id: String,

    /// Provider-specific model selection (opaque id)
    pub model_id: Option<String>,

    /// Source language code (always [`SOURCE_LANGUAGE`])
    pub source_language: String,

    /// Target language code, uppercased (e.g., "DE")
    pub target_language: String,

    /// Primary glossary for providers that accept only one glossary reference
    pub primary_glossary_id: Option<GlossaryId>,

    /// All glossary terms in scope for this target language
    pub glossary_terms: Vec<GlossaryTerm>,

    /// Translation-memory hints (empty when lookups are skipped)
    pub tm_hints: Vec<TmHint>,

    /// Units submitted per provider request (0 = engine chooses)
    pub units_per_batch: usize,

    /// Maximum batches executing concurrently
    pub parallel_batches: usize,

    /// Whether translation-memory lookups were skipped
    pub skip_translation_memory: bool,

    /// When the context was built
    pub created_at: DateTime<Utc>,

    /// When the context was last touched (equals `created_at`; contexts are immutable)
    pub updated_at: DateTime<Utc>,
}

// Contexts are compared across runs to decide whether a rebuild produced the
// same request; the opaque id and timestamps are delivery metadata, not
// request content, so they are excluded.
impl PartialEq for TranslationContext {
    fn eq(&self, other: &Self) -> bool {
        self.project_id == other.project_id
            && self.project_language_id == other.project_language_id
            && self.provider_id == other.provider_id
            && self.model_id == other.model_id
            && self.source_language == other.source_language
            && self.target_language == other.target_language
            && self.primary_glossary_id == other.primary_glossary_id
            && self.glossary_terms == other.glossary_terms
            && self.tm_hints == other.tm_hints
            && self.units_per_batch == other.units_per_batch
            && self.parallel_batches == other.parallel_batches
            && self.skip_translation_memory == other.skip_translation_memory
    }
}

impl Eq for TranslationContext {}

/// Per-request overrides applied on top of the configured defaults
#[derive(Clone, Debug, Default)]
pub struct ContextOverrides {
    /// Provider-specific model selection
    pub model_id: Option<String>,

    /// Override the configured units-per-request chunk size
    pub units_per_batch: Option<usize>,

    /// Override the configured batch parallelism (clamped to >= 1)
    pub parallel_batches: Option<usize>,

    /// Override the configured translation-memory skip flag
    pub skip_translation_memory: Option<bool>,
}

/// Assembles immutable [`TranslationContext`] values from repository lookups.
///
/// Dependencies are injected explicitly; the builder performs read-only
/// lookups and emits no events. It never fails: any lookup error degrades to
/// usable defaults (English target, no glossary, no hints) and is logged.
pub struct ContextBuilder {
    db: Arc<Database>,
    defaults: TranslationConfig,
    next_context_id: AtomicU64,
}

impl ContextBuilder {
    /// Create a builder over the given database with configured defaults
    pub fn new(db: Arc<Database>, defaults: TranslationConfig) -> Self {
        Self {
            db,
            defaults,
            next_context_id: AtomicU64::new(1),
        }
    }

    /// Build the context for one translation request.
    ///
    /// Resolves the target language from the project-language's language
    /// reference, loads glossary terms scoped to the project and target
    /// language (project-specific glossary preferred as primary over a
    /// universal one), and assembles translation-memory hints unless skipped.
    pub async fn build(
        &self,
        project_id: ProjectId,
        project_language_id: ProjectLanguageId,
        provider_id: &str,
        overrides: ContextOverrides,
    ) -> TranslationContext {
        let target_language = self.resolve_target_language(project_language_id).await;

        let (primary_glossary_id, glossary_terms) =
            self.load_glossary(project_id, &target_language).await;

        let skip_translation_memory = overrides
            .skip_translation_memory
            .unwrap_or(self.defaults.skip_translation_memory);

        let tm_hints = if skip_translation_memory {
            Vec::new()
        } else {
            self.load_tm_hints(project_language_id).await
        };

        let now = Utc::now();
        TranslationContext {
            id: ContextId(self.next_context_id.fetch_add(1, Ordering::Relaxed)),
            project_id,
            project_language_id,
            provider_id: provider_id.to_string(),
            model_id: overrides.model_id,
            source_language: SOURCE_LANGUAGE.to_string(),
            target_language,
            primary_glossary_id,
            glossary_terms,
            tm_hints,
            units_per_batch: overrides
                .units_per_batch
                .unwrap_or(self.defaults.units_per_batch),
            parallel_batches: overrides
                .parallel_batches
                .unwrap_or(self.defaults.parallel_batches)
                .max(1),
            skip_translation_memory,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve the target language code, degrading to the source language.
    async fn resolve_target_language(&self, project_language_id: ProjectLanguageId) -> String {
        let project_language = match self.db.get_project_language(project_language_id).await {
            Ok(Some(pl)) => pl,
            Ok(None) => {
                tracing::warn!(
                    project_language_id = project_language_id.0,
                    "Project-language not found, using degraded default target language"
                );
                return SOURCE_LANGUAGE.to_string();
            }
            Err(e) => {
                tracing::warn!(
                    project_language_id = project_language_id.0,
                    error = %e,
                    "Project-language lookup failed, using degraded default target language"
                );
                return SOURCE_LANGUAGE.to_string();
            }
        };

        match self
            .db
            .get_language(crate::types::LanguageId(project_language.language_id))
            .await
        {
            Ok(Some(language)) => language.code.to_uppercase(),
            Ok(None) => {
                tracing::warn!(
                    language_id = project_language.language_id,
                    "Language not found, using degraded default target language"
                );
                SOURCE_LANGUAGE.to_string()
            }
            Err(e) => {
                tracing::warn!(
                    language_id = project_language.language_id,
                    error = %e,
                    "Language lookup failed, using degraded default target language"
                );
                SOURCE_LANGUAGE.to_string()
            }
        }
    }

    /// Load glossaries for the project and target language.
    ///
    /// The primary glossary id prefers a project-scoped glossary over a
    /// universal one; the term list is the union of every glossary in scope.
    async fn load_glossary(
        &self,
        project_id: ProjectId,
        target_language: &str,
    ) -> (Option<GlossaryId>, Vec<GlossaryTerm>) {
        let glossaries = match self
            .db
            .get_glossaries_for_language(project_id, target_language)
            .await
        {
            Ok(glossaries) => glossaries,
            Err(e) => {
                tracing::warn!(
                    project_id = project_id.0,
                    target_language = target_language,
                    error = %e,
                    "Glossary lookup failed, continuing without glossary"
                );
                return (None, Vec::new());
            }
        };

        if glossaries.is_empty() {
            return (None, Vec::new());
        }

        let primary = glossaries
            .iter()
            .find(|g| g.project_id.is_some())
            .or_else(|| glossaries.first())
            .map(|g| GlossaryId(g.id));

        let glossary_ids: Vec<GlossaryId> = glossaries.iter().map(|g| GlossaryId(g.id)).collect();
        let term_rows = match self.db.get_terms_for_glossaries(&glossary_ids).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Glossary term lookup failed, continuing without glossary terms"
                );
                return (primary, Vec::new());
            }
        };

        let terms = term_rows
            .into_iter()
            .map(|row| {
                let variants = match row.variants.as_deref() {
                    Some(json) => serde_json::from_str(json).unwrap_or_else(|e| {
                        tracing::warn!(
                            term_id = row.id,
                            error = %e,
                            "Failed to decode glossary term variants, dropping them"
                        );
                        Vec::new()
                    }),
                    None => Vec::new(),
                };
                GlossaryTerm {
                    source: row.source_term,
                    target: row.target_term,
                    variants,
                }
            })
            .collect();

        (primary, terms)
    }

    /// Load translation-memory hints from previously translated units.
    async fn load_tm_hints(&self, project_language_id: ProjectLanguageId) -> Vec<TmHint> {
        match self
            .db
            .get_translated_pairs(project_language_id, self.defaults.tm_hint_limit)
            .await
        {
            Ok(pairs) => pairs
                .into_iter()
                .map(|pair| TmHint {
                    source: pair.source_text,
                    target: pair.translated_text,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(
                    project_language_id = project_language_id.0,
                    error = %e,
                    "Translation-memory lookup failed, continuing without hints"
                );
                Vec::new()
            }
        }
    }
}
