//! Bulk create and bulk update.

mod common;

use common::*;
use lineage_core::LineageError;
use serde_json::json;

#[tokio::test]
async fn bulk_create_stores_every_item_as_a_root() {
    let store = store();
    let created = store
        .bulk_create(json!([{"a": 1}, {"a": 2}, {"a": 3}]), ALICE)
        .await
        .expect("bulk create");

    assert_eq!(created.len(), 3);
    for doc in &created {
        assert_eq!(prime(doc), "root");
        assert_eq!(doc["__lineage"]["provenance"]["generatedBy"], ALICE);
    }
    assert_eq!(store.collection().len(), 3);
    assert_tree_invariants(&store).await;
}

#[tokio::test]
async fn bulk_create_validates_everything_before_writing() {
    let store = store();

    let err = store
        .bulk_create(json!([{"a": 1}, [1, 2]]), ALICE)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = store
        .bulk_create(json!([{"a": 1}, {"@id": "http://elsewhere/1"}]), ALICE)
        .await
        .unwrap_err();
    assert!(matches!(err, LineageError::Validation(_)));

    let err = store.bulk_create(json!([]), ALICE).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = store.bulk_create(json!({"a": 1}), ALICE).await.unwrap_err();
    assert_eq!(err.status_code(), 400);

    assert!(store.collection().is_empty());
}

#[tokio::test]
async fn bulk_update_forks_each_item_and_links_parents() {
    let store = store();
    let x = store.create(json!({"v": "x0"}), ALICE, None).await.unwrap();
    let y = store.create(json!({"v": "y0"}), ALICE, None).await.unwrap();

    let forked = store
        .bulk_update(
            json!([
                {"@id": id_of(&x), "v": "x1"},
                {"@id": id_of(&y), "v": "y1"},
                {"@id": id_of(&x), "v": "x2"}
            ]),
            ALICE,
        )
        .await
        .expect("bulk update");

    assert_eq!(forked.len(), 3);
    assert_eq!(previous(&forked[0]), id_of(&x));
    assert_eq!(previous(&forked[1]), id_of(&y));
    assert_eq!(forked[2]["v"], "x2");

    let x = store.get(&id_of(&x)).await.unwrap();
    assert_eq!(next(&x), vec![id_of(&forked[0]), id_of(&forked[2])]);
    assert_eq!(x["v"], "x0");
    assert_tree_invariants(&store).await;
}

#[tokio::test]
async fn bulk_update_skips_missing_deleted_and_foreign_targets() {
    let store = store();
    let x = store.create(json!({"v": 0}), ALICE, None).await.unwrap();
    let gone = store.create(json!({"v": 0}), ALICE, None).await.unwrap();
    let bobs = store.create(json!({"v": 0}), BOB, None).await.unwrap();
    store.delete(&id_of(&gone), ALICE).await.unwrap();

    let forked = store
        .bulk_update(
            json!([
                {"@id": format!("{}missing", PREFIX), "v": 1},
                {"@id": id_of(&x), "v": 1},
                {"@id": id_of(&gone), "v": 1},
                {"@id": id_of(&bobs), "v": 1},
                {"@id": "http://elsewhere.org/1", "v": 1}
            ]),
            ALICE,
        )
        .await
        .expect("bulk update");

    assert_eq!(forked.len(), 1);
    assert_eq!(previous(&forked[0]), id_of(&x));
    assert_tree_invariants(&store).await;
}

#[tokio::test]
async fn bulk_update_requires_identifiers() {
    let store = store();
    let x = store.create(json!({"v": 0}), ALICE, None).await.unwrap();
    let err = store
        .bulk_update(json!([{"@id": id_of(&x), "v": 1}, {"v": 2}]), ALICE)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(store.collection().len(), 1);
}

#[tokio::test]
async fn bulk_update_isolates_item_failures() {
    let store = store();
    let x = store.create(json!({"v": 0}), ALICE, None).await.unwrap();
    let y = store.create(json!({"v": 0}), ALICE, None).await.unwrap();
    let y_record = id_of(&y).trim_start_matches(PREFIX).to_string();

    // y's link cannot be written; x's fork and link are unaffected
    store.collection().fail_writes_for(y_record);
    let forked = store
        .bulk_update(
            json!([{"@id": id_of(&x), "v": 1}, {"@id": id_of(&y), "v": 1}]),
            ALICE,
        )
        .await
        .expect("bulk update");
    assert_eq!(forked.len(), 2);

    let x = store.get(&id_of(&x)).await.unwrap();
    assert_eq!(next(&x), vec![id_of(&forked[0])]);
    let y = store.get(&id_of(&y)).await.unwrap();
    assert!(next(&y).is_empty());
}
