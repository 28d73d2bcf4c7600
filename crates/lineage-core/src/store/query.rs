use lineage_state::{DocumentCollection, Filter, Page};
use serde_json::Value;
use tracing::instrument;

use super::{into_object, DocumentStore};
use crate::domain::{LineageError, Result, StoredDocument, VersionedDocument};

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Look up a version, live or tombstoned, by external id, record id or
    /// slug.
    #[instrument(skip(self))]
    pub async fn get(&self, identifier: &str) -> Result<Value> {
        match self.fetch(identifier).await? {
            Some(doc) => self.negotiator.render(&doc),
            None => Err(LineageError::NotFound(identifier.to_string())),
        }
    }

    /// Documents matching every `path: value` pair of `filter`.
    ///
    /// Without a page, the configured default limit applies.
    #[instrument(skip(self, filter))]
    pub async fn query(&self, filter: Value, page: Option<Page>) -> Result<Vec<Value>> {
        let filter = Filter::from_object(&into_object(filter)?);
        if filter.is_empty() {
            return Err(LineageError::Validation(
                "query filter must not be empty".to_string(),
            ));
        }
        let page = page.unwrap_or_else(|| Page::new(self.config.default_query_limit, 0));
        self.collection
            .find_many(&filter, page)
            .await?
            .into_iter()
            .map(|stored| self.negotiator.render(&StoredDocument::from_stored(stored)?))
            .collect()
    }

    /// Every version `identifier` descends from, nearest first.
    #[instrument(skip(self))]
    pub async fn history(&self, identifier: &str) -> Result<Vec<Value>> {
        let Some(doc) = self.positioned(identifier).await? else {
            return Ok(Vec::new());
        };
        let tree = self.version_tree(&doc).await?;
        let target = tree.get(&doc.external_id).unwrap_or(&doc);
        tree.ancestors(target)?
            .into_iter()
            .map(|ancestor| self.render(ancestor))
            .collect()
    }

    /// Every version derived from `identifier`, depth-first.
    #[instrument(skip(self))]
    pub async fn since(&self, identifier: &str) -> Result<Vec<Value>> {
        let Some(doc) = self.positioned(identifier).await? else {
            return Ok(Vec::new());
        };
        let tree = self.version_tree(&doc).await?;
        let target = tree.get(&doc.external_id).unwrap_or(&doc);
        tree.descendants(target)
            .into_iter()
            .map(|descendant| self.render(descendant))
            .collect()
    }

    /// The live version behind `identifier`; `None` for a tombstone, which
    /// has no place in any tree.
    async fn positioned(&self, identifier: &str) -> Result<Option<VersionedDocument>> {
        match self.fetch(identifier).await? {
            Some(StoredDocument::Live(doc)) => Ok(Some(doc)),
            Some(StoredDocument::Deleted(_)) => Ok(None),
            None => Err(LineageError::NotFound(identifier.to_string())),
        }
    }
}
