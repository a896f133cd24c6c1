//! Content unit operations — import, untranslated queries, and translation storage.

use crate::error::DatabaseError;
use crate::types::{ProjectLanguageId, UnitId};
use crate::{Error, Result};

use super::{Database, NewUnit, TranslatedPair, Unit};

// SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999; keep IN-clauses well under it.
const MAX_IDS_PER_QUERY: usize = 500;

impl Database {
    /// Insert a single content unit
    pub async fn insert_unit(&self, unit: &NewUnit) -> Result<UnitId> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO units (project_language_id, unit_key, source_text, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(unit.project_language_id)
        .bind(&unit.unit_key)
        .bind(&unit.source_text)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert unit: {}",
                e
            )))
        })?;

        Ok(UnitId(result.last_insert_rowid()))
    }

    /// Insert multiple content units in a batch (more efficient for imports)
    ///
    /// Automatically chunks the input to stay within SQLite's bind variable limit.
    pub async fn insert_units_batch(&self, units: &[NewUnit]) -> Result<()> {
        if units.is_empty() {
            return Ok(());
        }

        // Each unit uses 4 bind variables, max 249 units per INSERT.
        const MAX_UNITS_PER_BATCH: usize = 249;

        let now = chrono::Utc::now().timestamp();

        for chunk in units.chunks(MAX_UNITS_PER_BATCH) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO units (project_language_id, unit_key, source_text, created_at) ",
            );

            query_builder.push_values(chunk, |mut b, unit| {
                b.push_bind(unit.project_language_id)
                    .push_bind(&unit.unit_key)
                    .push_bind(&unit.source_text)
                    .push_bind(now);
            });

            let query = query_builder.build();
            query.execute(self.pool()).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert units batch: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }

    /// Get a content unit by ID
    pub async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>> {
        let row = sqlx::query_as::<_, Unit>(
            r#"
            SELECT id, project_language_id, unit_key, source_text, translated_text,
                   translated_at, created_at
            FROM units
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get unit: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Get the ids of all currently untranslated units for a project-language
    pub async fn get_untranslated_ids(
        &self,
        project_language_id: ProjectLanguageId,
    ) -> Result<Vec<UnitId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM units
            WHERE project_language_id = ? AND translated_text IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(project_language_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get untranslated ids: {}",
                e
            )))
        })?;

        Ok(ids.into_iter().map(UnitId).collect())
    }

    /// Narrow a caller-supplied candidate list to units still needing translation.
    ///
    /// The caller's ordering is preserved; units belonging to a different
    /// project-language are dropped along with translated ones.
    pub async fn filter_untranslated_ids(
        &self,
        ids: &[UnitId],
        project_language_id: ProjectLanguageId,
    ) -> Result<Vec<UnitId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut untranslated = std::collections::HashSet::new();
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "SELECT id FROM units WHERE project_language_id = ",
            );
            query_builder.push_bind(project_language_id);
            query_builder.push(" AND translated_text IS NULL AND id IN (");
            let mut separated = query_builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows: Vec<i64> = query_builder
                .build_query_scalar()
                .fetch_all(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to filter untranslated ids: {}",
                        e
                    )))
                })?;
            untranslated.extend(rows);
        }

        Ok(ids
            .iter()
            .filter(|id| untranslated.contains(&id.0))
            .copied()
            .collect())
    }

    /// Fetch units by id, returned in input order.
    ///
    /// Ids with no matching row are silently skipped; callers detect gaps by
    /// comparing lengths.
    pub async fn get_unit_texts(&self, ids: &[UnitId]) -> Result<Vec<Unit>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_id = std::collections::HashMap::new();
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let mut query_builder = sqlx::QueryBuilder::new(
                r#"
                SELECT id, project_language_id, unit_key, source_text, translated_text,
                       translated_at, created_at
                FROM units WHERE id IN (
                "#,
            );
            let mut separated = query_builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows: Vec<Unit> = query_builder
                .build_query_as()
                .fetch_all(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to get unit texts: {}",
                        e
                    )))
                })?;
            for row in rows {
                by_id.insert(row.id, row);
            }
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(&id.0)).collect())
    }

    /// Store the accepted translation for a unit
    pub async fn set_translation(&self, id: UnitId, text: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE units SET translated_text = ?, translated_at = ? WHERE id = ?")
            .bind(text)
            .bind(now)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to set translation: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Get recent source/translation pairs for translation-memory hints
    pub async fn get_translated_pairs(
        &self,
        project_language_id: ProjectLanguageId,
        limit: usize,
    ) -> Result<Vec<TranslatedPair>> {
        let rows = sqlx::query_as::<_, TranslatedPair>(
            r#"
            SELECT source_text, translated_text
            FROM units
            WHERE project_language_id = ? AND translated_text IS NOT NULL
            ORDER BY translated_at DESC
            LIMIT ?
            "#,
        )
        .bind(project_language_id)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get translated pairs: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
