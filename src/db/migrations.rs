//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Connect to database with foreign key enforcement and WAL mode
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        // Run migrations
        db.run_migrations().await?;

        Ok(db)
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        // Create schema version table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        // Check current version
        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        // Apply migrations
        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: Create initial schema
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            Self::create_catalog_schema(conn).await?;
            Self::create_units_schema(conn).await?;
            Self::create_glossary_schema(conn).await?;
            Self::create_batch_schema(conn).await?;
            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(|e| {
                    Error::Database(DatabaseError::MigrationFailed(format!(
                        "Failed to commit migration: {}",
                        e
                    )))
                })?;
                Ok(())
            }
            Err(e) => {
                // Roll back; the original error is the interesting one
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    /// Create projects, languages, and project-language tables
    async fn create_catalog_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("projects", e))?;

        sqlx::query(
            r#"
            CREATE TABLE languages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("languages", e))?;

        sqlx::query(
            r#"
            CREATE TABLE project_languages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                language_id INTEGER NOT NULL REFERENCES languages(id),
                UNIQUE(project_id, language_id)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("project_languages", e))?;

        Ok(())
    }

    /// Create the content units table
    async fn create_units_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE units (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_language_id INTEGER NOT NULL REFERENCES project_languages(id) ON DELETE CASCADE,
                unit_key TEXT NOT NULL,
                source_text TEXT NOT NULL,
                translated_text TEXT,
                translated_at INTEGER,
                created_at INTEGER NOT NULL,
                UNIQUE(project_language_id, unit_key)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("units", e))?;

        sqlx::query(
            "CREATE INDEX idx_units_untranslated ON units(project_language_id) WHERE translated_text IS NULL",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("idx_units_untranslated", e))?;

        Ok(())
    }

    /// Create glossary tables
    async fn create_glossary_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE glossaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
                language_code TEXT NOT NULL,
                name TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("glossaries", e))?;

        sqlx::query(
            r#"
            CREATE TABLE glossary_terms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                glossary_id INTEGER NOT NULL REFERENCES glossaries(id) ON DELETE CASCADE,
                source_term TEXT NOT NULL,
                target_term TEXT NOT NULL,
                variants TEXT
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("glossary_terms", e))?;

        Ok(())
    }

    /// Create batch header and batch unit ledger tables
    async fn create_batch_schema(conn: &mut SqliteConnection) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE translation_batches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_language_id INTEGER NOT NULL REFERENCES project_languages(id) ON DELETE CASCADE,
                provider_id TEXT NOT NULL,
                batch_number INTEGER NOT NULL,
                units_count INTEGER NOT NULL,
                status INTEGER NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER,
                UNIQUE(project_language_id, batch_number)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("translation_batches", e))?;

        sqlx::query(
            r#"
            CREATE TABLE translation_batch_units (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id INTEGER NOT NULL REFERENCES translation_batches(id) ON DELETE CASCADE,
                unit_id INTEGER NOT NULL REFERENCES units(id) ON DELETE CASCADE,
                processing_order INTEGER NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                attempted_at INTEGER,
                UNIQUE(batch_id, unit_id),
                UNIQUE(batch_id, processing_order)
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("translation_batch_units", e))?;

        sqlx::query(
            "CREATE INDEX idx_batch_units_status ON translation_batch_units(batch_id, status)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| migration_failed("idx_batch_units_status", e))?;

        Ok(())
    }

    /// Record a completed migration version
    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration {}: {}",
                    version, e
                )))
            })?;
        Ok(())
    }
}

fn migration_failed(what: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!(
        "Failed to create {}: {}",
        what, e
    )))
}
