//! Glossary CRUD — glossaries and term lists with surface-form variants.

use crate::error::DatabaseError;
use crate::types::{GlossaryId, ProjectId};
use crate::{Error, Result};

use super::{Database, Glossary, GlossaryTermRow, NewGlossaryTerm};

impl Database {
    /// Insert a new glossary
    ///
    /// Pass `project_id = None` for a universal glossary that applies to every
    /// project targeting the language.
    pub async fn insert_glossary(
        &self,
        project_id: Option<ProjectId>,
        language_code: &str,
        name: &str,
    ) -> Result<GlossaryId> {
        let result =
            sqlx::query("INSERT INTO glossaries (project_id, language_code, name) VALUES (?, ?, ?)")
                .bind(project_id)
                .bind(language_code)
                .bind(name)
                .execute(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to insert glossary: {}",
                        e
                    )))
                })?;

        Ok(GlossaryId(result.last_insert_rowid()))
    }

    /// Insert multiple glossary terms
    ///
    /// Variants are stored as a JSON array; an empty variant list is stored
    /// as NULL.
    pub async fn insert_glossary_terms(&self, terms: &[NewGlossaryTerm]) -> Result<()> {
        if terms.is_empty() {
            return Ok(());
        }

        // Serialize variants up front so a bad entry fails before any insert
        let mut encoded = Vec::with_capacity(terms.len());
        for term in terms {
            let variants = if term.variants.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&term.variants)?)
            };
            encoded.push((term, variants));
        }

        // Each term uses 4 bind variables, max 249 terms per INSERT.
        const MAX_TERMS_PER_BATCH: usize = 249;

        for chunk in encoded.chunks(MAX_TERMS_PER_BATCH) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO glossary_terms (glossary_id, source_term, target_term, variants) ",
            );

            query_builder.push_values(chunk, |mut b, (term, variants)| {
                b.push_bind(term.glossary_id)
                    .push_bind(&term.source_term)
                    .push_bind(&term.target_term)
                    .push_bind(variants.clone());
            });

            let query = query_builder.build();
            query.execute(self.pool()).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert glossary terms: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }

    /// Get glossaries in scope for a project and target language.
    ///
    /// Returns project-scoped glossaries first, then universal ones.
    pub async fn get_glossaries_for_language(
        &self,
        project_id: ProjectId,
        language_code: &str,
    ) -> Result<Vec<Glossary>> {
        let rows = sqlx::query_as::<_, Glossary>(
            r#"
            SELECT id, project_id, language_code, name
            FROM glossaries
            WHERE language_code = ? AND (project_id = ? OR project_id IS NULL)
            ORDER BY project_id IS NULL, id ASC
            "#,
        )
        .bind(language_code)
        .bind(project_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get glossaries: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Get all terms belonging to the given glossaries
    pub async fn get_terms_for_glossaries(
        &self,
        glossary_ids: &[GlossaryId],
    ) -> Result<Vec<GlossaryTermRow>> {
        if glossary_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "SELECT id, glossary_id, source_term, target_term, variants FROM glossary_terms WHERE glossary_id IN (",
        );
        let mut separated = query_builder.separated(", ");
        for id in glossary_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY glossary_id ASC, id ASC");

        let rows: Vec<GlossaryTermRow> = query_builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to get glossary terms: {}",
                    e
                )))
            })?;

        Ok(rows)
    }
}
