use super::*;
use crate::types::{BatchId, BatchStatus};

fn new_batch(pl_id: ProjectLanguageId, units: i64) -> NewBatch {
    NewBatch {
        project_language_id: pl_id,
        provider_id: "deepl".to_string(),
        units_count: units,
        status: BatchStatus::Pending.to_i32(),
    }
}

#[tokio::test]
async fn test_insert_and_get_batch() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;

    let (id, number) = db.insert_batch(&new_batch(pl_id, 5)).await.unwrap();
    assert!(id.0 > 0);
    assert_eq!(number, 1, "first batch gets number 1");

    let batch = db.get_batch(id).await.unwrap().unwrap();
    assert_eq!(batch.project_language_id, pl_id.0);
    assert_eq!(batch.provider_id, "deepl");
    assert_eq!(batch.batch_number, 1);
    assert_eq!(batch.units_count, 5);
    assert_eq!(batch.status, BatchStatus::Pending.to_i32());
    assert_eq!(batch.retry_count, 0);
    assert!(batch.error_message.is_none());
    assert!(batch.started_at.is_none());

    assert!(db.get_batch(BatchId(999)).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_batch_numbers_are_gapless_per_project_language() {
    let (db, _file) = test_db().await;
    let pl1 = seed_project_language(&db).await;

    let project_id = db.insert_project("Other Mod").await.unwrap();
    let language_id = db.insert_language("fr", "French").await.unwrap();
    let pl2 = db
        .insert_project_language(project_id, language_id)
        .await
        .unwrap();

    // Interleave creations across the two project-languages
    let (_, n1) = db.insert_batch(&new_batch(pl1, 1)).await.unwrap();
    let (_, m1) = db.insert_batch(&new_batch(pl2, 1)).await.unwrap();
    let (_, n2) = db.insert_batch(&new_batch(pl1, 1)).await.unwrap();
    let (_, n3) = db.insert_batch(&new_batch(pl1, 1)).await.unwrap();
    let (_, m2) = db.insert_batch(&new_batch(pl2, 1)).await.unwrap();

    assert_eq!((n1, n2, n3), (1, 2, 3));
    assert_eq!((m1, m2), (1, 2));

    let numbers: Vec<i64> = db
        .list_batches(pl1)
        .await
        .unwrap()
        .iter()
        .map(|b| b.batch_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3], "no gaps, no repeats");

    db.close().await;
}

#[tokio::test]
async fn test_status_error_and_timestamps_update() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let (id, _) = db.insert_batch(&new_batch(pl_id, 2)).await.unwrap();

    db.update_batch_status(id, BatchStatus::Translating.to_i32())
        .await
        .unwrap();
    db.set_batch_started(id).await.unwrap();
    db.update_batch_status(id, BatchStatus::Failed.to_i32())
        .await
        .unwrap();
    db.set_batch_error(id, "provider unreachable").await.unwrap();
    db.set_batch_completed(id).await.unwrap();

    let batch = db.get_batch(id).await.unwrap().unwrap();
    assert_eq!(batch.status, BatchStatus::Failed.to_i32());
    assert_eq!(batch.error_message.as_deref(), Some("provider unreachable"));
    assert!(batch.started_at.is_some());
    assert!(batch.completed_at.is_some());

    db.close().await;
}

#[tokio::test]
async fn test_increment_retry_count_returns_new_value() {
    let (db, _file) = test_db().await;
    let pl_id = seed_project_language(&db).await;
    let (id, _) = db.insert_batch(&new_batch(pl_id, 2)).await.unwrap();

    assert_eq!(db.increment_retry_count(id).await.unwrap(), 1);
    assert_eq!(db.increment_retry_count(id).await.unwrap(), 2);
    assert_eq!(db.increment_retry_count(id).await.unwrap(), 3);

    let batch = db.get_batch(id).await.unwrap().unwrap();
    assert_eq!(batch.retry_count, 3);

    db.close().await;
}
