//! SurrealDB implementation of `DocumentCollection`.
//!
//! Surrogate-id lookups go through the unique `record_id` index. The
//! external id, prime and slug of each document are mirrored into indexed
//! columns, so a filter with a string clause on one of those paths only
//! decodes the rows that index selects. Everything else is evaluated
//! in-process over the decoded bodies, since the remaining paths address
//! caller-defined JSON the table schema knows nothing about.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::handle::SurrealHandle;
use crate::storage_traits::*;

/// Document paths mirrored into indexed columns, as `(path, column)`.
const INDEXED_COLUMNS: [(&str, &str); 3] = [
    ("@id", "external_id"),
    ("__lineage.history.prime", "prime"),
    ("__lineage.slug", "slug"),
];

/// String values of the mirrored paths, in `INDEXED_COLUMNS` order.
fn column_values(document: &Value) -> [(&'static str, Option<String>); 3] {
    INDEXED_COLUMNS.map(|(path, column)| {
        let value = path
            .split('.')
            .try_fold(document, |current, segment| current.get(segment))
            .and_then(Value::as_str)
            .map(str::to_string);
        (column, value)
    })
}

/// First clause of `filter` the column index can answer.
fn indexed_clause(filter: &Filter) -> Option<(&'static str, String)> {
    filter.clauses().iter().find_map(|(path, value)| {
        let (_, column) = INDEXED_COLUMNS.iter().find(|(p, _)| *p == path.as_str())?;
        Some((*column, value.as_str()?.to_string()))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentRow {
    record_id: String,
    body: String,
}

impl DocumentRow {
    fn decode(self) -> StorageResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// SurrealDB-backed document collection.
#[derive(Clone)]
pub struct SurrealCollection {
    handle: Arc<SurrealHandle>,
}

impl SurrealCollection {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    async fn select_by_record_id(&self, record_id: &str) -> StorageResult<Option<Value>> {
        let mut result = self
            .handle
            .db()
            .query("SELECT record_id, body FROM documents WHERE record_id = $record_id")
            .bind(("record_id", record_id.to_string()))
            .await?;
        let rows: Vec<DocumentRow> = result.take(0)?;
        rows.into_iter().next().map(DocumentRow::decode).transpose()
    }

    async fn scan(&self) -> StorageResult<Vec<Value>> {
        let mut result = self
            .handle
            .db()
            .query("SELECT record_id, body, inserted_at FROM documents ORDER BY inserted_at ASC")
            .await?;
        let rows: Vec<DocumentRow> = result.take(0)?;
        rows.into_iter().map(DocumentRow::decode).collect()
    }

    /// Documents that may match `filter`, in insertion order: the rows an
    /// indexed clause selects, or the whole table.
    async fn candidates(&self, filter: &Filter) -> StorageResult<Vec<Value>> {
        let Some((column, value)) = indexed_clause(filter) else {
            return self.scan().await;
        };
        let mut result = self
            .handle
            .db()
            .query(format!(
                "SELECT record_id, body, inserted_at FROM documents WHERE {} = $value ORDER BY inserted_at ASC",
                column
            ))
            .bind(("value", value))
            .await?;
        let rows: Vec<DocumentRow> = result.take(0)?;
        rows.into_iter().map(DocumentRow::decode).collect()
    }

    /// Surrogate id of the first document matching `filter`.
    async fn resolve_target(&self, filter: &Filter) -> StorageResult<Option<String>> {
        if let Some(record_id) = filter.as_record_id() {
            return Ok(Some(record_id.to_string()));
        }
        Ok(self
            .candidates(filter)
            .await?
            .iter()
            .find(|d| filter.matches(d))
            .and_then(|d| record_id_of(d).ok().map(str::to_string)))
    }

    async fn apply(&self, op: WriteOp) -> WriteOutcome {
        let result = match op {
            WriteOp::InsertOne { document } => self
                .insert_one(document)
                .await
                .map(|record_id| WriteOutcome::Inserted { record_id }),
            WriteOp::ReplaceOne {
                filter,
                replacement,
            } => self
                .replace_one(&filter, replacement)
                .await
                .map(|matched| WriteOutcome::Replaced { matched }),
        };
        result.unwrap_or_else(|e| WriteOutcome::Failed {
            error: e.to_string(),
        })
    }
}

fn classify_insert_error(err: surrealdb::Error, record_id: &str) -> StorageError {
    let message = err.to_string();
    if message.contains("already contains") {
        StorageError::DuplicateKey {
            record_id: record_id.to_string(),
        }
    } else {
        StorageError::Query(message)
    }
}

#[async_trait]
impl DocumentCollection for SurrealCollection {
    #[instrument(skip(self))]
    async fn find_one(&self, filter: &Filter) -> StorageResult<Option<Value>> {
        if let Some(record_id) = filter.as_record_id() {
            return self.select_by_record_id(record_id).await;
        }
        Ok(self
            .candidates(filter)
            .await?
            .into_iter()
            .find(|d| filter.matches(d)))
    }

    #[instrument(skip(self))]
    async fn find_many(&self, filter: &Filter, page: Page) -> StorageResult<Vec<Value>> {
        if let Some(record_id) = filter.as_record_id() {
            let found = self.select_by_record_id(record_id).await?;
            return Ok(page.apply(found.into_iter()));
        }
        let documents = self.candidates(filter).await?;
        Ok(page.apply(documents.into_iter().filter(|d| filter.matches(d))))
    }

    #[instrument(skip(self, document))]
    async fn insert_one(&self, document: Value) -> StorageResult<String> {
        if !document.is_object() {
            return Err(StorageError::Malformed(
                "documents must be JSON objects".to_string(),
            ));
        }
        let record_id = record_id_of(&document)?.to_string();
        let body = serde_json::to_string(&document)?;

        let mut query = self
            .handle
            .db()
            .query(
                "CREATE documents SET record_id = $record_id, body = $body, \
                 external_id = $external_id, prime = $prime, slug = $slug, \
                 inserted_at = time::now()",
            )
            .bind(("record_id", record_id.clone()))
            .bind(("body", body));
        for column in column_values(&document) {
            query = query.bind(column);
        }
        let mut response = query.await?;
        let created: Vec<DocumentRow> = response
            .take(0)
            .map_err(|e| classify_insert_error(e, &record_id))?;
        if created.is_empty() {
            return Err(StorageError::Query(format!(
                "insert of {} returned no row",
                record_id
            )));
        }

        debug!(record_id = %record_id, "document inserted");
        Ok(record_id)
    }

    #[instrument(skip(self, replacement))]
    async fn replace_one(&self, filter: &Filter, mut replacement: Value) -> StorageResult<u64> {
        let Some(record_id) = self.resolve_target(filter).await? else {
            return Ok(0);
        };
        let Some(object) = replacement.as_object_mut() else {
            return Err(StorageError::Malformed(
                "replacement must be a JSON object".to_string(),
            ));
        };
        object.insert(RECORD_ID_KEY.to_string(), Value::String(record_id.clone()));
        let body = serde_json::to_string(&replacement)?;

        let mut query = self
            .handle
            .db()
            .query(
                "UPDATE documents SET body = $body, external_id = $external_id, \
                 prime = $prime, slug = $slug WHERE record_id = $record_id RETURN AFTER",
            )
            .bind(("record_id", record_id.clone()))
            .bind(("body", body));
        for column in column_values(&replacement) {
            query = query.bind(column);
        }
        let mut response = query.await?;
        let updated: Vec<DocumentRow> = response.take(0)?;

        debug!(record_id = %record_id, matched = updated.len(), "document replaced");
        Ok(updated.len() as u64)
    }

    #[instrument(skip(self, ops), fields(ops = ops.len()))]
    async fn bulk_write(&self, ops: Vec<WriteOp>) -> StorageResult<BulkWriteResult> {
        let outcomes = join_all(ops.into_iter().map(|op| self.apply(op))).await;
        Ok(BulkWriteResult { outcomes })
    }
}
