//! Bulk create and bulk update.
//!
//! The whole input is validated before anything is written. Writes then go
//! out as one unordered batch; items fail independently and only the ones
//! that landed are returned.

use std::collections::HashMap;

use lineage_state::{DocumentCollection, Filter, WriteOp, WriteOutcome};
use serde_json::{Map, Value};
use tracing::instrument;

use super::{kind_of, require_agent, DocumentStore};
use crate::domain::{IdScheme, LineageError, Result, StoredDocument, VersionedDocument};
use crate::obs;

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Create a new version tree for every item.
    #[instrument(skip(self, bodies), fields(agent = %agent))]
    pub async fn bulk_create(&self, bodies: Value, agent: &str) -> Result<Vec<Value>> {
        require_agent(agent)?;
        let items = bulk_items(bodies)?;
        for (index, item) in items.iter().enumerate() {
            if self.negotiator.declared_identifier(item).is_some() {
                return Err(LineageError::Validation(format!(
                    "item {} declares an identifier; bulk create only accepts new documents",
                    index
                )));
            }
        }

        let docs: Vec<VersionedDocument> = items
            .into_iter()
            .map(|item| {
                self.new_root(
                    IdScheme::generate_record_id(),
                    self.negotiator.sanitize(item),
                    agent,
                )
            })
            .collect();
        let ops = docs
            .iter()
            .map(|doc| Ok(WriteOp::InsertOne { document: doc.to_stored()? }))
            .collect::<Result<Vec<_>>>()?;

        let result = self.collection.bulk_write(ops).await?;
        let requested = docs.len();
        let mut written = Vec::new();
        for (index, doc) in docs.into_iter().enumerate() {
            if result.succeeded(index) {
                obs::emit_document_created(&doc.external_id, agent);
                written.push(self.render(&doc)?);
            } else {
                report_failure("create", index, result.outcomes.get(index));
            }
        }
        obs::emit_bulk_written("create", requested, written.len());
        Ok(written)
    }

    /// Fork a new version from each item's target, linking every parent in
    /// the same batch.
    ///
    /// Items whose target is missing, deleted, minted elsewhere or generated
    /// by another agent are skipped, not failed.
    #[instrument(skip(self, bodies), fields(agent = %agent))]
    pub async fn bulk_update(&self, bodies: Value, agent: &str) -> Result<Vec<Value>> {
        require_agent(agent)?;
        let items = bulk_items(bodies)?;
        let mut targets = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match self.target_identifier(item) {
                Ok(id) => targets.push(id),
                Err(_) => {
                    return Err(LineageError::Validation(format!(
                        "item {} declares no string identifier",
                        index
                    )))
                }
            }
        }

        // Parents are accumulated so several items forking the same target
        // produce one replacement carrying every new link.
        let mut parents: Vec<VersionedDocument> = Vec::new();
        let mut parent_slot: HashMap<String, usize> = HashMap::new();
        let mut children: Vec<(usize, VersionedDocument)> = Vec::new();

        for (index, (item, identifier)) in items.into_iter().zip(targets).enumerate() {
            if !self.ids.is_local(&identifier) {
                obs::emit_bulk_item_skipped("update", index, &"identifier is not minted by this store");
                continue;
            }
            let parent = match self.fetch(&identifier).await? {
                Some(StoredDocument::Live(doc)) => doc,
                Some(StoredDocument::Deleted(_)) => {
                    obs::emit_bulk_item_skipped("update", index, &"target is deleted");
                    continue;
                }
                None => {
                    obs::emit_bulk_item_skipped("update", index, &"target not found");
                    continue;
                }
            };
            if self.authorize_edit(agent, &parent).is_err() {
                obs::emit_bulk_item_skipped("update", index, &"agent is not the generator");
                continue;
            }

            let slot = *parent_slot
                .entry(parent.record_id.clone())
                .or_insert_with(|| {
                    parents.push(parent);
                    parents.len() - 1
                });
            let child = self.new_fork(&parents[slot], self.negotiator.sanitize(item), agent);
            parents[slot].meta.history.link_next(&child.external_id);
            children.push((index, child));
        }

        let mut ops = Vec::with_capacity(children.len() + parents.len());
        for (_, child) in &children {
            ops.push(WriteOp::InsertOne {
                document: child.to_stored()?,
            });
        }
        for parent in &parents {
            ops.push(WriteOp::ReplaceOne {
                filter: Filter::by_record_id(&parent.record_id),
                replacement: parent.to_stored()?,
            });
        }

        let result = self.collection.bulk_write(ops).await?;
        for (offset, parent) in parents.iter().enumerate() {
            let at = children.len() + offset;
            if !result.succeeded(at) {
                let error = match result.outcomes.get(at) {
                    Some(WriteOutcome::Failed { error }) => error.clone(),
                    _ => "parent no longer exists".to_string(),
                };
                obs::emit_tree_heal_failed("bulk_update", &parent.external_id, &error);
            }
        }

        let requested = children.len();
        let mut written = Vec::new();
        for (at, (index, child)) in children.into_iter().enumerate() {
            if result.succeeded(at) {
                obs::emit_version_forked(&child.meta.history.previous, &child.external_id, "update");
                written.push(self.render(&child)?);
            } else {
                report_failure("update", index, result.outcomes.get(at));
            }
        }
        obs::emit_bulk_written("update", requested, written.len());
        Ok(written)
    }
}

/// A non-empty array of JSON objects.
fn bulk_items(bodies: Value) -> Result<Vec<Map<String, Value>>> {
    let Value::Array(items) = bodies else {
        return Err(LineageError::Validation(format!(
            "bulk operations take an array of objects, got {}",
            kind_of(&bodies)
        )));
    };
    if items.is_empty() {
        return Err(LineageError::Validation(
            "bulk operations need at least one item".to_string(),
        ));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) if !map.is_empty() => Ok(map),
            Value::Object(_) => Err(LineageError::Validation(format!("item {} is empty", index))),
            other => Err(LineageError::Validation(format!(
                "item {} is {}, not an object",
                index,
                kind_of(&other)
            ))),
        })
        .collect()
}

fn report_failure(kind: &str, index: usize, outcome: Option<&WriteOutcome>) {
    match outcome {
        Some(WriteOutcome::Failed { error }) => obs::emit_bulk_item_skipped(kind, index, error),
        _ => obs::emit_bulk_item_skipped(kind, index, &"write had no effect"),
    }
}
