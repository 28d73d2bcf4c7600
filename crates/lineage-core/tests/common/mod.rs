//! Shared fixtures for lineage-core integration tests.
#![allow(dead_code)]

use std::collections::HashMap;

use lineage_core::{DocumentCollection, DocumentStore, Filter, Page, StoreConfig};
use lineage_state::fakes::MemoryCollection;
use serde_json::Value;

pub const PREFIX: &str = "http://store.test/v1/id/";
pub const ALICE: &str = "http://store.test/agent/alice";
pub const BOB: &str = "http://store.test/agent/bob";
pub const BOT: &str = "http://store.test/agent/bot";

pub type TestStore = DocumentStore<MemoryCollection>;

pub fn config() -> StoreConfig {
    StoreConfig::default()
        .with_id_prefix(PREFIX)
        .with_bot_agent(BOT)
}

pub fn store() -> TestStore {
    DocumentStore::new(MemoryCollection::new(), config()).expect("valid config")
}

/// External id of a rendered document, under either convention.
pub fn id_of(doc: &Value) -> String {
    doc.get("@id")
        .or_else(|| doc.get("id"))
        .and_then(Value::as_str)
        .expect("document carries an identifier")
        .to_string()
}

pub fn prime(doc: &Value) -> String {
    doc["__lineage"]["history"]["prime"]
        .as_str()
        .expect("prime")
        .to_string()
}

pub fn previous(doc: &Value) -> String {
    doc["__lineage"]["history"]["previous"]
        .as_str()
        .expect("previous")
        .to_string()
}

pub fn next(doc: &Value) -> Vec<String> {
    string_list(&doc["__lineage"]["history"]["next"])
}

pub fn release_previous(doc: &Value) -> String {
    doc["__lineage"]["release"]["releases"]["previous"]
        .as_str()
        .expect("release previous")
        .to_string()
}

pub fn release_next(doc: &Value) -> Vec<String> {
    string_list(&doc["__lineage"]["release"]["releases"]["next"])
}

pub fn release_replaces(doc: &Value) -> String {
    doc["__lineage"]["release"]["releases"]["replaces"]
        .as_str()
        .expect("replaces")
        .to_string()
}

pub fn is_released(doc: &Value) -> bool {
    doc["__lineage"]["release"]["isReleased"]
        .as_str()
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string id").to_string())
        .collect()
}

/// Every stored document, as held by the collection.
pub async fn stored(store: &TestStore) -> Vec<Value> {
    store
        .collection()
        .find_many(&Filter::new(), Page::all())
        .await
        .expect("scan collection")
}

/// Assert the edit-history invariants over the whole collection:
/// - a non-root names a live root as its prime
/// - `previous` and `next` links agree in both directions
/// - tombstones are referenced by nothing
pub async fn assert_tree_invariants(store: &TestStore) {
    let all = stored(store).await;
    let by_id: HashMap<String, &Value> = all.iter().map(|d| (id_of(d), d)).collect();
    let live = |id: &str| by_id.get(id).filter(|d| d.get("__lineage").is_some());

    for doc in all.iter().filter(|d| d.get("__lineage").is_some()) {
        let id = id_of(doc);
        let prime = prime(doc);
        if prime != "root" {
            let root = live(&prime).unwrap_or_else(|| panic!("{} names missing root {}", id, prime));
            assert_eq!(self::prime(root), "root", "{} names non-root {} as prime", id, prime);
        }

        let previous = previous(doc);
        if previous.starts_with(PREFIX) {
            let parent =
                live(&previous).unwrap_or_else(|| panic!("{} has missing previous {}", id, previous));
            assert!(
                next(parent).contains(&id),
                "{} lists {} as previous, but is not in its next {:?}",
                id,
                previous,
                next(parent)
            );
        }

        for child in next(doc) {
            let child_doc = live(&child).unwrap_or_else(|| panic!("{} has missing next {}", id, child));
            assert_eq!(
                self::previous(child_doc),
                id,
                "{} lists {} in next, but its previous disagrees",
                id,
                child
            );
        }
    }
}
