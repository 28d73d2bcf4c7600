//! The document store: mutation and query operations over a backing
//! collection.
//!
//! Every operation is a self-contained sequence of single-document calls
//! against the collection. Preconditions (existence, authorization,
//! immutability) are checked before the first write. Multi-write sequences
//! (fork then link, delete healing, release healing) are not atomic: a
//! failure part way is reported as `LineageError::Integrity` and every step
//! is safe to re-run.

mod bulk;
mod create;
mod delete;
mod fork;
mod overwrite;
mod query;
mod release;

use lineage_state::{DocumentCollection, Filter, Page, StorageError};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::StoreConfig;
use crate::domain::{
    ImmutableReason, IdScheme, LineageError, Result, StoredDocument, VersionMeta,
    VersionedDocument, JSONLD_ID_KEY, PRIME_PATH, SLUG_PATH,
};
use crate::graph::VersionTree;
use crate::negotiate::Negotiator;
use crate::obs;

pub use fork::ForkKind;

/// Result of an in-place overwrite.
#[derive(Debug, Clone, PartialEq)]
pub struct Overwritten {
    pub document: Value,
    /// Token to pass to the next overwrite of this document.
    pub version: String,
}

/// Result of a fork-family mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// A new version was stored.
    Forked(Value),
    /// Nothing changed; the original is returned as-is.
    Unchanged(Value),
}

impl MutationOutcome {
    pub fn is_forked(&self) -> bool {
        matches!(self, MutationOutcome::Forked(_))
    }

    pub fn document(&self) -> &Value {
        match self {
            MutationOutcome::Forked(doc) | MutationOutcome::Unchanged(doc) => doc,
        }
    }

    pub fn into_document(self) -> Value {
        match self {
            MutationOutcome::Forked(doc) | MutationOutcome::Unchanged(doc) => doc,
        }
    }
}

/// Version-preserving document store over a `DocumentCollection`.
pub struct DocumentStore<C> {
    collection: C,
    config: StoreConfig,
    ids: IdScheme,
    negotiator: Negotiator,
}

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    pub fn new(collection: C, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ids: IdScheme::new(config.id_prefix.clone()),
            negotiator: Negotiator::new(config.local_id_contexts.clone()),
            collection,
            config,
        })
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn ids(&self) -> &IdScheme {
        &self.ids
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Resolve an identifier (external id, record id or slug) to whatever is
    /// stored under it. Foreign URIs resolve to nothing.
    async fn fetch(&self, identifier: &str) -> Result<Option<StoredDocument>> {
        let Some(local) = self.ids.resolve(identifier) else {
            return Ok(None);
        };
        let mut found = self
            .collection
            .find_one(&Filter::by_record_id(local))
            .await?;
        if found.is_none() {
            found = self
                .collection
                .find_one(&Filter::new().eq(SLUG_PATH, local))
                .await?;
        }
        found.map(StoredDocument::from_stored).transpose()
    }

    /// Load a live version, refusing tombstones.
    async fn load_live(&self, identifier: &str) -> Result<VersionedDocument> {
        match self.fetch(identifier).await? {
            Some(StoredDocument::Live(doc)) => Ok(doc),
            Some(StoredDocument::Deleted(doc)) => Err(LineageError::Immutable {
                id: doc.external_id,
                reason: ImmutableReason::Deleted,
            }),
            None => Err(LineageError::NotFound(identifier.to_string())),
        }
    }

    /// Current stored state of an already-loaded version.
    async fn reload(&self, doc: &VersionedDocument) -> Result<VersionedDocument> {
        self.load_live(&doc.record_id).await
    }

    /// Every version sharing `doc`'s root, root first.
    async fn version_tree(&self, doc: &VersionedDocument) -> Result<VersionTree> {
        let root_id = doc.tree_root_id().to_string();
        let root = if doc.is_root() {
            doc.clone()
        } else {
            let stored = self
                .collection
                .find_one(&Filter::new().eq(JSONLD_ID_KEY, root_id.as_str()))
                .await?;
            match stored.map(StoredDocument::from_stored).transpose()? {
                Some(StoredDocument::Live(root)) if root.is_root() => root,
                Some(_) => {
                    return Err(LineageError::Integrity(format!(
                        "{} names {} as its root, which is not a live root",
                        doc.external_id, root_id
                    )))
                }
                None => {
                    return Err(LineageError::Integrity(format!(
                        "root {} of {} does not exist",
                        root_id, doc.external_id
                    )))
                }
            }
        };

        let members = self
            .collection
            .find_many(&Filter::new().eq(PRIME_PATH, root_id.as_str()), Page::all())
            .await?;
        let mut nodes = vec![root];
        for member in members {
            if let StoredDocument::Live(live) = StoredDocument::from_stored(member)? {
                nodes.push(live);
            }
        }
        debug!(root = %root_id, versions = nodes.len(), "loaded version tree");
        Ok(VersionTree::new(nodes))
    }

    // -----------------------------------------------------------------------
    // Authorization
    // -----------------------------------------------------------------------

    /// Overwrite and the fork family answer a generator mismatch with 401.
    fn authorize_edit(&self, agent: &str, doc: &VersionedDocument) -> Result<()> {
        if self
            .config
            .may_act_for(agent, &doc.meta.provenance.generated_by)
        {
            Ok(())
        } else {
            Err(LineageError::Unauthorized {
                agent: agent.to_string(),
                id: doc.external_id.clone(),
            })
        }
    }

    /// Delete and release answer a generator mismatch with 403.
    fn authorize_owner(
        &self,
        agent: &str,
        action: &'static str,
        doc: &VersionedDocument,
    ) -> Result<()> {
        if self
            .config
            .may_act_for(agent, &doc.meta.provenance.generated_by)
        {
            Ok(())
        } else {
            Err(LineageError::Forbidden {
                agent: agent.to_string(),
                action,
                id: doc.external_id.clone(),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    async fn insert(&self, doc: &VersionedDocument) -> Result<()> {
        self.collection
            .insert_one(doc.to_stored()?)
            .await
            .map_err(|err| match err {
                StorageError::DuplicateKey { record_id } => {
                    LineageError::DuplicateIdentifier(self.ids.external_id(&record_id))
                }
                other => other.into(),
            })?;
        Ok(())
    }

    /// Replace a version in place.
    async fn persist(&self, doc: &VersionedDocument) -> Result<()> {
        self.replace_stored(&doc.record_id, doc.to_stored()?).await
    }

    async fn replace_stored(&self, record_id: &str, replacement: Value) -> Result<()> {
        let matched = self
            .collection
            .replace_one(&Filter::by_record_id(record_id), replacement)
            .await?;
        if matched == 0 {
            return Err(LineageError::Integrity(format!(
                "record {} vanished while being rewritten",
                record_id
            )));
        }
        Ok(())
    }

    /// Apply a healing plan one version at a time. Stops at the first
    /// failure; the writes already applied stay applied.
    async fn persist_healing(
        &self,
        op: &str,
        target: &str,
        rewrites: &[VersionedDocument],
    ) -> Result<usize> {
        for (done, doc) in rewrites.iter().enumerate() {
            if let Err(err) = self.persist(doc).await {
                obs::emit_tree_heal_failed(op, target, &err);
                return Err(LineageError::Integrity(format!(
                    "{} of {} stopped after {} of {} neighbor rewrites: {}",
                    op,
                    target,
                    done,
                    rewrites.len(),
                    err
                )));
            }
        }
        Ok(rewrites.len())
    }

    /// Append `child` to the freshly reloaded parent's `next`.
    async fn link_child(&self, parent: &VersionedDocument, child: &VersionedDocument) -> Result<()> {
        let linked = async {
            let mut current = self.reload(parent).await?;
            if current.meta.history.link_next(&child.external_id) {
                self.persist(&current).await?;
            }
            Ok::<(), LineageError>(())
        }
        .await;
        linked.map_err(|err| {
            obs::emit_tree_heal_failed("link", &parent.external_id, &err);
            LineageError::Integrity(format!(
                "{} was stored but could not be linked from {}: {}",
                child.external_id, parent.external_id, err
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Building versions
    // -----------------------------------------------------------------------

    fn new_root(
        &self,
        record_id: String,
        content: Map<String, Value>,
        agent: &str,
    ) -> VersionedDocument {
        VersionedDocument {
            external_id: self.ids.external_id(&record_id),
            record_id,
            content,
            meta: VersionMeta::origin(agent, &self.config.api_version),
        }
    }

    /// A new version derived from `parent`. Its release lineage starts empty.
    fn new_fork(
        &self,
        parent: &VersionedDocument,
        content: Map<String, Value>,
        agent: &str,
    ) -> VersionedDocument {
        let mut child = self.new_root(IdScheme::generate_record_id(), content, agent);
        child.meta.history.prime = parent.tree_root_id().to_string();
        child.meta.history.previous = parent.external_id.clone();
        child
    }

    /// Record id currently claiming `slug`, as a record id or an alias.
    async fn slug_owner(&self, slug: &str) -> Result<Option<String>> {
        for filter in [Filter::by_record_id(slug), Filter::new().eq(SLUG_PATH, slug)] {
            if let Some(found) = self.collection.find_one(&filter).await? {
                return Ok(Some(lineage_state::record_id_of(&found)?.to_string()));
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Input shaping
    // -----------------------------------------------------------------------

    /// The identifier a body targets; required by overwrite and the fork family.
    fn target_identifier(&self, body: &Map<String, Value>) -> Result<String> {
        match self.negotiator.declared_identifier(body) {
            Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
            Some(_) => Err(LineageError::Validation(
                "declared identifier must be a non-empty string".to_string(),
            )),
            None => Err(LineageError::Validation(
                "body declares no identifier".to_string(),
            )),
        }
    }

    fn render(&self, doc: &VersionedDocument) -> Result<Value> {
        self.negotiator.render_live(doc)
    }
}

fn require_agent(agent: &str) -> Result<()> {
    if agent.trim().is_empty() {
        return Err(LineageError::Validation(
            "calling agent must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(LineageError::Validation(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
