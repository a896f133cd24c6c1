//! Catalog CRUD — projects, languages, and project-language pairs.

use crate::error::DatabaseError;
use crate::types::{LanguageId, ProjectId, ProjectLanguageId};
use crate::{Error, Result};

use super::{Database, Language, Project, ProjectLanguage};

impl Database {
    /// Insert a new project
    pub async fn insert_project(&self, name: &str) -> Result<ProjectId> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("INSERT INTO projects (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert project: {}",
                    e
                )))
            })?;

        Ok(ProjectId(result.last_insert_rowid()))
    }

    /// Get a project by ID
    pub async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query_as::<_, Project>(
            "SELECT id, name, created_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get project: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Insert a new language
    pub async fn insert_language(&self, code: &str, name: &str) -> Result<LanguageId> {
        let result = sqlx::query("INSERT INTO languages (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert language: {}",
                    e
                )))
            })?;

        Ok(LanguageId(result.last_insert_rowid()))
    }

    /// Get a language by ID
    pub async fn get_language(&self, id: LanguageId) -> Result<Option<Language>> {
        let row =
            sqlx::query_as::<_, Language>("SELECT id, code, name FROM languages WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to get language: {}",
                        e
                    )))
                })?;

        Ok(row)
    }

    /// Insert a new project-language pair
    pub async fn insert_project_language(
        &self,
        project_id: ProjectId,
        language_id: LanguageId,
    ) -> Result<ProjectLanguageId> {
        let result =
            sqlx::query("INSERT INTO project_languages (project_id, language_id) VALUES (?, ?)")
                .bind(project_id)
                .bind(language_id)
                .execute(self.pool())
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to insert project language: {}",
                        e
                    )))
                })?;

        Ok(ProjectLanguageId(result.last_insert_rowid()))
    }

    /// Get a project-language pair by ID
    pub async fn get_project_language(
        &self,
        id: ProjectLanguageId,
    ) -> Result<Option<ProjectLanguage>> {
        let row = sqlx::query_as::<_, ProjectLanguage>(
            "SELECT id, project_id, language_id FROM project_languages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get project language: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Delete a project-language pair.
    ///
    /// This is the only delete path for batches: the cascade removes the
    /// pair's units, batch headers, and batch unit ledger rows.
    pub async fn delete_project_language(&self, id: ProjectLanguageId) -> Result<()> {
        sqlx::query("DELETE FROM project_languages WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete project language: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
