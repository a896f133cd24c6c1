use super::*;
use crate::types::ProjectLanguageId;
use tempfile::NamedTempFile;

mod batches;
mod units;

/// Create a fresh migrated database backed by a temp file.
pub(crate) async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

/// Seed one project, language, and project-language pair.
pub(crate) async fn seed_project_language(db: &Database) -> ProjectLanguageId {
    let project_id = db.insert_project("Frostmark Saga").await.unwrap();
    let language_id = db.insert_language("de", "German").await.unwrap();
    db.insert_project_language(project_id, language_id)
        .await
        .unwrap()
}

/// Seed `count` untranslated units for the given project-language.
pub(crate) async fn seed_units(
    db: &Database,
    project_language_id: ProjectLanguageId,
    count: usize,
) -> Vec<crate::types::UnitId> {
    let units: Vec<NewUnit> = (0..count)
        .map(|i| NewUnit {
            project_language_id,
            unit_key: format!("dialogue/line_{:03}", i),
            source_text: format!("Source line {}", i),
        })
        .collect();
    db.insert_units_batch(&units).await.unwrap();
    db.get_untranslated_ids(project_language_id).await.unwrap()
}
