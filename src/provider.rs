//! Translation provider capability boundary.
//!
//! Providers are external translation capabilities (LLM-based or specialized
//! MT services) addressed by opaque `provider_id`/`model_id` strings. The
//! engine only sees this trait; selection and wire formats live behind it.

use crate::context::TranslationContext;
use crate::error::ProviderError;
use crate::types::UnitId;
use serde::{Deserialize, Serialize};

/// One source text submitted for translation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceText {
    /// The content unit this text belongs to
    pub unit_id: UnitId,

    /// Stable key of the unit (e.g., "dialogue/greeting_01")
    pub key: String,

    /// The untranslated source text
    pub text: String,
}

/// One translated text returned by a provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Translation {
    /// The content unit this translation belongs to
    pub unit_id: UnitId,

    /// The translated text
    pub text: String,
}

/// Abstraction over translation providers, enabling testability.
///
/// Implementations receive the immutable per-batch [`TranslationContext`]
/// (languages, glossary terms, translation-memory hints) together with one or
/// more source texts, and return a translation per submitted unit or a typed
/// failure. Failure classification (see
/// [`ProviderError`](crate::error::ProviderError)) decides whether one unit,
/// one chunk, or the whole batch is affected.
#[async_trait::async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate the given source texts under the batch context.
    ///
    /// The returned list should contain one entry per submitted unit; the
    /// engine matches results by `unit_id`, so intra-chunk ordering is free.
    /// Units missing from the response are marked failed.
    async fn translate(
        &self,
        context: &TranslationContext,
        texts: &[SourceText],
    ) -> std::result::Result<Vec<Translation>, ProviderError>;

    /// Human-readable provider name for logging
    fn name(&self) -> &str;
}
