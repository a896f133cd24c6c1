use super::*;
use crate::types::UnitId;

#[tokio::test]
async fn test_insert_and_get_unit() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;

    let id = db
        .insert_unit(&NewUnit {
            project_language_id: pl_id,
            unit_key: "ui/confirm".to_string(),
            source_text: "Are you sure?".to_string(),
        })
        .await
        .unwrap();

    let unit = db.get_unit(id).await.unwrap().unwrap();
    assert_eq!(unit.project_language_id, pl_id.0);
    assert_eq!(unit.unit_key, "ui/confirm");
    assert_eq!(unit.source_text, "Are you sure?");
    assert!(unit.translated_text.is_none());
    assert!(unit.translated_at.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_duplicate_unit_key_within_project_language_is_rejected() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;

    let unit = NewUnit {
        project_language_id: pl_id,
        unit_key: "ui/confirm".to_string(),
        source_text: "Are you sure?".to_string(),
    };
    db.insert_unit(&unit).await.unwrap();
    assert!(db.insert_unit(&unit).await.is_err());

    db.close().await;
}

#[tokio::test]
async fn test_untranslated_ids_shrink_as_translations_arrive() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let ids = seed_units(&db, pl_id, 5).await;
    assert_eq!(ids.len(), 5);

    db.set_translation(ids[1], "Zeile eins").await.unwrap();
    db.set_translation(ids[3], "Zeile drei").await.unwrap();

    let remaining = db.get_untranslated_ids(pl_id).await.unwrap();
    assert_eq!(remaining, vec![ids[0], ids[2], ids[4]]);

    let translated = db.get_unit(ids[1]).await.unwrap().unwrap();
    assert_eq!(translated.translated_text.as_deref(), Some("Zeile eins"));
    assert!(translated.translated_at.is_some());

    db.close().await;
}

#[tokio::test]
async fn test_filter_untranslated_ids_preserves_caller_order() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let ids = seed_units(&db, pl_id, 4).await;

    db.set_translation(ids[2], "fertig").await.unwrap();

    // Caller supplies a custom priority order, including a translated unit
    // and an id that does not exist
    let candidates = vec![ids[3], ids[2], UnitId(9999), ids[0]];
    let filtered = db.filter_untranslated_ids(&candidates, pl_id).await.unwrap();
    assert_eq!(filtered, vec![ids[3], ids[0]]);

    db.close().await;
}

#[tokio::test]
async fn test_filter_untranslated_ids_drops_units_of_other_project_languages() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let ids = seed_units(&db, pl_id, 2).await;

    let project_id = db.insert_project("Other Mod").await.unwrap();
    let language_id = db.insert_language("fr", "French").await.unwrap();
    let other_pl = db
        .insert_project_language(project_id, language_id)
        .await
        .unwrap();
    let other_ids = seed_units(&db, other_pl, 1).await;

    let filtered = db
        .filter_untranslated_ids(&[ids[0], other_ids[0], ids[1]], pl_id)
        .await
        .unwrap();
    assert_eq!(filtered, vec![ids[0], ids[1]]);

    db.close().await;
}

#[tokio::test]
async fn test_get_unit_texts_returns_input_order() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let ids = seed_units(&db, pl_id, 3).await;

    let reversed = vec![ids[2], ids[1], ids[0]];
    let units = db.get_unit_texts(&reversed).await.unwrap();
    assert_eq!(units.len(), 3);
    assert_eq!(units[0].id, ids[2].0);
    assert_eq!(units[2].id, ids[0].0);

    // Missing ids are skipped, not errors
    let partial = db.get_unit_texts(&[ids[0], UnitId(9999)]).await.unwrap();
    assert_eq!(partial.len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_translated_pairs_are_recent_first_and_limited() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let ids = seed_units(&db, pl_id, 3).await;

    for (i, id) in ids.iter().enumerate() {
        db.set_translation(*id, &format!("Übersetzung {}", i))
            .await
            .unwrap();
    }

    let pairs = db.get_translated_pairs(pl_id, 2).await.unwrap();
    assert_eq!(pairs.len(), 2, "limit is applied");
    for pair in &pairs {
        assert!(pair.translated_text.starts_with("Übersetzung"));
    }

    db.close().await;
}

#[tokio::test]
async fn test_bulk_insert_spans_multiple_chunks() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;

    // More than one 249-row INSERT chunk
    let ids = seed_units(&db, pl_id, 300).await;
    assert_eq!(ids.len(), 300);

    db.close().await;
}
