//! Storage trait definitions for Lineage
//!
//! The engine consumes its backing store through five primitives only:
//! - `find_one` / `find_many`: equality filters over dotted JSON paths
//! - `insert_one`: atomic single-document insert keyed by `_id`
//! - `replace_one`: atomic single-document replacement
//! - `bulk_write`: an unordered batch of inserts and replacements
//!
//! Nothing spans more than one document atomically. In-memory fakes are
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Key under which every stored document carries its surrogate id.
pub const RECORD_ID_KEY: &str = "_id";

/// Read the surrogate id of a stored document.
pub fn record_id_of(document: &Value) -> StorageResult<&str> {
    document
        .get(RECORD_ID_KEY)
        .and_then(Value::as_str)
        .ok_or(StorageError::MissingRecordId)
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Conjunction of equality clauses over dotted JSON paths.
///
/// A clause matches when the value found at its path equals the expected
/// value, or when the value at the path is an array containing the expected
/// scalar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// An empty filter matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality clause.
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((path.into(), value.into()));
        self
    }

    /// Match the document with the given surrogate id.
    pub fn by_record_id(record_id: &str) -> Self {
        Self::new().eq(RECORD_ID_KEY, record_id)
    }

    /// Build a filter from a caller-supplied JSON object, one clause per key.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            clauses: object
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// When the filter is exactly a surrogate id lookup, return that id.
    pub fn as_record_id(&self) -> Option<&str> {
        match self.clauses.as_slice() {
            [(path, Value::String(id))] if path == RECORD_ID_KEY => Some(id),
            _ => None,
        }
    }

    /// Evaluate the filter against a document.
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|(path, expected)| {
            match lookup_path(document, path) {
                Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
                Some(found) => found == expected,
                None => expected.is_null(),
            }
        })
    }
}

fn lookup_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

/// Skip/limit window applied to `find_many` results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub skip: usize,
}

impl Page {
    /// Every matching document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: usize, skip: usize) -> Self {
        Self {
            limit: Some(limit),
            skip,
        }
    }

    /// Apply the window to an iterator of matches.
    pub fn apply<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        items
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Bulk writes
// ---------------------------------------------------------------------------

/// A single item of an unordered bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    InsertOne { document: Value },
    ReplaceOne { filter: Filter, replacement: Value },
}

/// Result of one bulk item, aligned by index with the submitted operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted { record_id: String },
    Replaced { matched: u64 },
    Failed { error: String },
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            WriteOutcome::Inserted { .. } => true,
            WriteOutcome::Replaced { matched } => *matched > 0,
            WriteOutcome::Failed { .. } => false,
        }
    }
}

/// Outcome of a whole batch. Item failures never abort sibling items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub outcomes: Vec<WriteOutcome>,
}

impl BulkWriteResult {
    pub fn succeeded(&self, index: usize) -> bool {
        self.outcomes
            .get(index)
            .map(WriteOutcome::is_success)
            .unwrap_or(false)
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

// ---------------------------------------------------------------------------
// DocumentCollection
// ---------------------------------------------------------------------------

/// Flat collection of opaque JSON documents keyed by `_id`.
///
/// Guarantees:
/// - `insert_one` and `replace_one` are atomic per document.
/// - `insert_one` fails with `StorageError::DuplicateKey` on an `_id` clash.
/// - `replace_one` keeps the matched document's `_id` and reports the number
///   of matched documents (0 or 1).
/// - `bulk_write` is unordered; every item is attempted.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// First document matching the filter, if any.
    async fn find_one(&self, filter: &Filter) -> StorageResult<Option<Value>>;

    /// Every document matching the filter, windowed by `page`, in insertion order.
    async fn find_many(&self, filter: &Filter, page: Page) -> StorageResult<Vec<Value>>;

    /// Insert a document carrying its own `_id`; returns that id.
    async fn insert_one(&self, document: Value) -> StorageResult<String>;

    /// Replace the first document matching the filter.
    async fn replace_one(&self, filter: &Filter, replacement: Value) -> StorageResult<u64>;

    /// Submit an unordered batch of writes.
    async fn bulk_write(&self, ops: Vec<WriteOp>) -> StorageResult<BulkWriteResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_nested_paths() {
        let doc = json!({"_id": "a", "__lineage": {"history": {"prime": "root"}}});
        assert!(Filter::new()
            .eq("__lineage.history.prime", "root")
            .matches(&doc));
        assert!(!Filter::new()
            .eq("__lineage.history.prime", "http://x/b")
            .matches(&doc));
    }

    #[test]
    fn filter_scalar_matches_array_member() {
        let doc = json!({"_id": "a", "tags": ["red", "blue"]});
        assert!(Filter::new().eq("tags", "blue").matches(&doc));
        assert!(!Filter::new().eq("tags", "green").matches(&doc));
        assert!(Filter::new()
            .eq("tags", json!(["red", "blue"]))
            .matches(&doc));
    }

    #[test]
    fn missing_path_only_matches_null() {
        let doc = json!({"_id": "a"});
        assert!(Filter::new().eq("absent", Value::Null).matches(&doc));
        assert!(!Filter::new().eq("absent", 1).matches(&doc));
    }

    #[test]
    fn record_id_fast_path_detection() {
        assert_eq!(Filter::by_record_id("abc").as_record_id(), Some("abc"));
        assert_eq!(
            Filter::by_record_id("abc").eq("x", 1).as_record_id(),
            None
        );
    }

    #[test]
    fn page_applies_skip_then_limit() {
        let page = Page::new(2, 1);
        assert_eq!(page.apply(1..=5), vec![2, 3]);
        assert_eq!(Page::all().apply(1..=3), vec![1, 2, 3]);
    }
}
