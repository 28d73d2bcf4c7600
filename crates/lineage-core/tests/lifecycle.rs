//! Create, lookup, overwrite and query behaviour of `DocumentStore`.

mod common;

use common::*;
use lineage_core::{LineageError, Page};
use serde_json::json;

#[tokio::test]
async fn create_then_get_round_trips() {
    let store = store();
    let created = store
        .create(json!({"a": 1}), ALICE, None)
        .await
        .expect("create");

    let id = id_of(&created);
    assert!(id.starts_with(PREFIX));

    let fetched = store.get(&id).await.expect("get");
    assert_eq!(fetched["a"], 1);
    assert_eq!(
        fetched["__lineage"]["history"],
        json!({"prime": "root", "previous": "", "next": []})
    );
    assert_eq!(fetched["__lineage"]["provenance"]["generatedBy"], ALICE);
    assert_eq!(fetched["__lineage"]["provenance"]["isOverwritten"], "");
    assert!(!is_released(&fetched));
    assert!(fetched.get("_id").is_none());
    assert_tree_invariants(&store).await;
}

#[tokio::test]
async fn create_rejects_declared_identifier_and_non_objects() {
    let store = store();
    let err = store
        .create(json!({"@id": "http://elsewhere/1", "a": 1}), ALICE, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = store.create(json!([1, 2]), ALICE, None).await.unwrap_err();
    assert!(matches!(err, LineageError::Validation(_)));
    assert!(store.collection().is_empty());
}

#[tokio::test]
async fn create_with_slug_uses_it_as_record_id() {
    let store = store();
    let created = store
        .create(json!({"label": "folio"}), ALICE, Some("folio-12r"))
        .await
        .expect("create");
    assert_eq!(id_of(&created), format!("{}folio-12r", PREFIX));

    let by_slug = store.get("folio-12r").await.expect("get by slug");
    assert_eq!(by_slug["label"], "folio");

    let err = store
        .create(json!({"label": "again"}), BOB, Some("folio-12r"))
        .await
        .unwrap_err();
    assert!(matches!(err, LineageError::DuplicateIdentifier(_)));

    let err = store
        .create(json!({"label": "bad"}), ALICE, Some("no spaces"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn iiif_documents_render_with_plain_id() {
    let store = store();
    let created = store
        .create(
            json!({
                "@context": "http://iiif.io/api/presentation/3/context.json",
                "type": "Manifest",
                "label": {"en": ["Book"]}
            }),
            ALICE,
            None,
        )
        .await
        .expect("create");

    assert!(created.get("@id").is_none());
    let keys: Vec<&String> = created.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["@context", "id", "type", "label", "__lineage"]);

    // a plain `id` is how a IIIF body names its target
    let mut body = created.clone();
    body["label"] = json!({"en": ["Book, revised"]});
    let outcome = store.update(body, ALICE).await.expect("update");
    assert!(outcome.is_forked());
    assert_eq!(previous(outcome.document()), id_of(&created));
}

#[tokio::test]
async fn overwrite_replaces_content_in_place_and_returns_token() {
    let store = store();
    let created = store.create(json!({"a": 1}), ALICE, None).await.unwrap();
    let id = id_of(&created);

    let first = store
        .overwrite(json!({"@id": id, "a": 2}), ALICE, None)
        .await
        .expect("overwrite");
    assert!(!first.version.is_empty());
    assert_eq!(first.document["a"], 2);
    assert_eq!(id_of(&first.document), id);

    let second = store
        .overwrite(json!({"@id": id, "a": 3}), ALICE, Some(&first.version))
        .await
        .expect("overwrite with current token");
    assert_ne!(second.version, first.version);

    assert_eq!(store.get(&id).await.unwrap()["a"], 3);
    assert_eq!(store.collection().len(), 1);
}

#[tokio::test]
async fn overwrite_with_stale_token_returns_current_version() {
    let store = store();
    let created = store.create(json!({"a": 1}), ALICE, None).await.unwrap();
    let id = id_of(&created);
    let t1 = store
        .overwrite(json!({"@id": id, "a": 2}), ALICE, None)
        .await
        .unwrap()
        .version;

    let err = store
        .overwrite(json!({"@id": id, "a": 99}), ALICE, Some("stale-token"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    match err {
        LineageError::VersionConflict { current_version } => {
            assert_eq!(current_version["a"], 2);
            assert_eq!(current_version["__lineage"]["provenance"]["isOverwritten"], t1);
        }
        other => panic!("expected version conflict, got {:?}", other),
    }
    assert_eq!(store.get(&id).await.unwrap()["a"], 2);
}

#[tokio::test]
async fn overwrite_enforces_generator_and_release_state() {
    let store = store();
    let created = store.create(json!({"a": 1}), ALICE, None).await.unwrap();
    let id = id_of(&created);

    let err = store
        .overwrite(json!({"@id": id, "a": 2}), BOB, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);

    // the configured bot may act for anyone
    store
        .overwrite(json!({"@id": id, "a": 2}), BOT, None)
        .await
        .expect("bot overwrite");

    store.release(&id, ALICE, None).await.expect("release");
    let err = store
        .overwrite(json!({"@id": id, "a": 3}), ALICE, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let err = store
        .overwrite(json!({"@id": format!("{}missing", PREFIX), "a": 3}), ALICE, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);

    let err = store.overwrite(json!({"a": 3}), ALICE, None).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn query_matches_content_and_pages() {
    let store = store();
    for n in 0..5 {
        store
            .create(json!({"kind": "note", "n": n}), ALICE, None)
            .await
            .unwrap();
    }
    store
        .create(json!({"kind": "other"}), ALICE, None)
        .await
        .unwrap();

    let notes = store.query(json!({"kind": "note"}), None).await.unwrap();
    assert_eq!(notes.len(), 5);

    let page = store
        .query(json!({"kind": "note"}), Some(Page::new(2, 1)))
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["n"], 1);

    let by_agent = store
        .query(json!({"__lineage.provenance.generatedBy": ALICE}), None)
        .await
        .unwrap();
    assert_eq!(by_agent.len(), 6);
}

#[tokio::test]
async fn query_rejects_empty_filter() {
    let store = store();
    let err = store.query(json!({}), None).await.unwrap_err();
    assert!(matches!(err, LineageError::Validation(_)));
    let err = store.query(json!("kind"), None).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn history_and_since_walk_the_tree() {
    let store = store();
    let x = store.create(json!({"v": 0}), ALICE, None).await.unwrap();
    let x_id = id_of(&x);
    let y = store
        .update(json!({"@id": x_id, "v": 1}), ALICE)
        .await
        .unwrap()
        .into_document();
    let y_id = id_of(&y);
    let z = store
        .update(json!({"@id": y_id, "v": 2}), ALICE)
        .await
        .unwrap()
        .into_document();
    let z_id = id_of(&z);

    let history: Vec<String> = store.history(&z_id).await.unwrap().iter().map(id_of).collect();
    assert_eq!(history, vec![y_id.clone(), x_id.clone()]);

    let since: Vec<String> = store.since(&x_id).await.unwrap().iter().map(id_of).collect();
    assert_eq!(since, vec![y_id, z_id]);

    assert!(store.history(&x_id).await.unwrap().is_empty());
    let err = store.since(&format!("{}nope", PREFIX)).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn get_unknown_and_foreign_identifiers_are_not_found() {
    let store = store();
    let err = store.get(&format!("{}nope", PREFIX)).await.unwrap_err();
    assert!(matches!(err, LineageError::NotFound(_)));
    let err = store.get("http://elsewhere.org/thing/1").await.unwrap_err();
    assert!(matches!(err, LineageError::NotFound(_)));
}
