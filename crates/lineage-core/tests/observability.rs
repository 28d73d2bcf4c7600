//! Observability tests for Lineage mutation tracing.
//!
//! These verify that the structured events named in `lineage_core::obs`
//! are emitted by the operations that own them.

mod common;

use common::*;
use lineage_core::obs::{
    emit_bulk_item_skipped, emit_tree_heal_failed, emit_version_unchanged, OperationSpan,
};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_operation_span_enter_creates_span() {
    let span = OperationSpan::enter("delete", "agent:test");
    drop(span);
}

#[traced_test]
#[test]
fn test_warn_level_events_are_captured() {
    emit_tree_heal_failed("delete", "http://store.test/v1/id/x", &"disk full");
    emit_bulk_item_skipped("update", 3, &"target not found");
    assert!(logs_contain("tree.heal_failed"));
    assert!(logs_contain("bulk.item_skipped"));
}

#[traced_test]
#[test]
fn test_unchanged_event_names_kind() {
    emit_version_unchanged("http://store.test/v1/id/x", "set");
    assert!(logs_contain("version.unchanged"));
    assert!(logs_contain("set"));
}

#[traced_test]
#[tokio::test]
async fn test_create_and_fork_emit_lifecycle_events() {
    let store = store();
    let x = store.create(json!({"a": 1}), ALICE, None).await.unwrap();
    store
        .set_keys(json!({"@id": id_of(&x), "b": 2}), ALICE)
        .await
        .unwrap();

    assert!(logs_contain("document.created"));
    assert!(logs_contain("version.forked"));
}

#[traced_test]
#[tokio::test]
async fn test_delete_and_release_emit_events() {
    let store = store();
    let x = store.create(json!({"a": 1}), ALICE, None).await.unwrap();
    let y = store
        .update(json!({"@id": id_of(&x), "a": 2}), ALICE)
        .await
        .unwrap()
        .into_document();

    store.release(&id_of(&x), ALICE, None).await.unwrap();
    store.delete(&id_of(&y), ALICE).await.unwrap();

    assert!(logs_contain("document.released"));
    assert!(logs_contain("mode=establish"));
    assert!(logs_contain("document.deleted"));
}

#[traced_test]
#[tokio::test]
async fn test_bulk_skip_is_logged() {
    let store = store();
    store
        .bulk_update(
            json!([{"@id": format!("{}missing", PREFIX), "v": 1}]),
            ALICE,
        )
        .await
        .unwrap();

    assert!(logs_contain("bulk.item_skipped"));
    assert!(logs_contain("bulk.written"));
}
