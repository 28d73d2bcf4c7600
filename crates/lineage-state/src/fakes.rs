//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryCollection` satisfies the `DocumentCollection` contract without any
//! external dependencies. Writes can be made to fail per record id so that
//! partial-failure paths of multi-write operations are reachable in tests.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory document collection backed by an insertion-ordered `Vec`.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    documents: Mutex<Vec<Value>>,
    faulty: Mutex<HashSet<String>>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert or replace of `record_id` fail.
    pub fn fail_writes_for(&self, record_id: impl Into<String>) {
        lock(&self.faulty).insert(record_id.into());
    }

    /// Disarm all write faults.
    pub fn clear_faults(&self) {
        lock(&self.faulty).clear();
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_fault(&self, record_id: &str) -> StorageResult<()> {
        if lock(&self.faulty).contains(record_id) {
            return Err(StorageError::InjectedFault {
                record_id: record_id.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&self, documents: &mut Vec<Value>, document: Value) -> StorageResult<String> {
        if !document.is_object() {
            return Err(StorageError::Malformed(
                "documents must be JSON objects".to_string(),
            ));
        }
        let record_id = record_id_of(&document)?.to_string();
        self.check_fault(&record_id)?;
        if documents
            .iter()
            .any(|d| d.get(RECORD_ID_KEY).and_then(Value::as_str) == Some(record_id.as_str()))
        {
            return Err(StorageError::DuplicateKey { record_id });
        }
        documents.push(document);
        Ok(record_id)
    }

    fn replace(
        &self,
        documents: &mut [Value],
        filter: &Filter,
        mut replacement: Value,
    ) -> StorageResult<u64> {
        let Some(slot) = documents.iter_mut().find(|d| filter.matches(d)) else {
            return Ok(0);
        };
        let record_id = record_id_of(slot)?.to_string();
        self.check_fault(&record_id)?;
        let Some(object) = replacement.as_object_mut() else {
            return Err(StorageError::Malformed(
                "replacement must be a JSON object".to_string(),
            ));
        };
        object.insert(RECORD_ID_KEY.to_string(), Value::String(record_id));
        *slot = replacement;
        Ok(1)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    async fn find_one(&self, filter: &Filter) -> StorageResult<Option<Value>> {
        let documents = lock(&self.documents);
        Ok(documents.iter().find(|d| filter.matches(d)).cloned())
    }

    async fn find_many(&self, filter: &Filter, page: Page) -> StorageResult<Vec<Value>> {
        let documents = lock(&self.documents);
        Ok(page.apply(documents.iter().filter(|d| filter.matches(d)).cloned()))
    }

    async fn insert_one(&self, document: Value) -> StorageResult<String> {
        let mut documents = lock(&self.documents);
        self.insert(&mut documents, document)
    }

    async fn replace_one(&self, filter: &Filter, replacement: Value) -> StorageResult<u64> {
        let mut documents = lock(&self.documents);
        self.replace(&mut documents, filter, replacement)
    }

    async fn bulk_write(&self, ops: Vec<WriteOp>) -> StorageResult<BulkWriteResult> {
        let mut documents = lock(&self.documents);
        let outcomes = ops
            .into_iter()
            .map(|op| {
                let result = match op {
                    WriteOp::InsertOne { document } => self
                        .insert(&mut documents, document)
                        .map(|record_id| WriteOutcome::Inserted { record_id }),
                    WriteOp::ReplaceOne {
                        filter,
                        replacement,
                    } => self
                        .replace(&mut documents, &filter, replacement)
                        .map(|matched| WriteOutcome::Replaced { matched }),
                };
                result.unwrap_or_else(|e| WriteOutcome::Failed {
                    error: e.to_string(),
                })
            })
            .collect();
        Ok(BulkWriteResult { outcomes })
    }
}
