use lineage_state::{DocumentCollection, Filter, Page};
use tracing::{debug, instrument, warn};

use super::{require_agent, DocumentStore};
use crate::domain::{
    ImmutableReason, LineageError, Result, StoredDocument, VersionedDocument, JSONLD_ID_KEY,
    PRIME_PATH,
};
use crate::graph::{plan_delete_healing, VersionTree};
use crate::obs;

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Soft-delete a version.
    ///
    /// Neighbors are healed first so the tree stays connected without the
    /// target; only then is the target replaced by its tombstone. If healing
    /// stops part way the target stays live, and calling `delete` again
    /// finishes the job.
    #[instrument(skip(self), fields(agent = %agent))]
    pub async fn delete(&self, identifier: &str, agent: &str) -> Result<()> {
        require_agent(agent)?;
        let loaded = self.load_live(identifier).await?;
        self.authorize_owner(agent, "delete", &loaded)?;
        if loaded.is_released() {
            return Err(LineageError::Immutable {
                id: loaded.external_id,
                reason: ImmutableReason::Released,
            });
        }

        let tree = self.deletion_tree(&loaded).await?;
        let target = tree.get(&loaded.external_id).cloned().unwrap_or(loaded);
        for child in &target.meta.history.next {
            if tree.get(child).is_none() {
                warn!(id = %target.external_id, child = %child, "next link points outside the tree, skipping");
            }
        }

        let rewrites = plan_delete_healing(&tree, &target).into_changed(&tree);
        let healed = self
            .persist_healing("delete", &target.external_id, &rewrites)
            .await?;

        let external_id = target.external_id.clone();
        let tombstone = target.into_tombstone(agent)?;
        self.replace_stored(&tombstone.record_id, tombstone.to_stored()?)
            .await?;
        obs::emit_document_deleted(&external_id, agent, healed);
        Ok(())
    }

    /// The target's version tree, plus any children of a root target that an
    /// earlier, interrupted delete already promoted along with the versions
    /// already moved under them.
    async fn deletion_tree(&self, target: &VersionedDocument) -> Result<VersionTree> {
        let tree = self.version_tree(target).await?;
        if !target.is_root() {
            return Ok(tree);
        }

        let mut nodes = tree.nodes().to_vec();
        let mut adopted = 0;
        for child_id in &target.meta.history.next {
            let mut found = self
                .collection
                .find_many(&Filter::new().eq(PRIME_PATH, child_id.as_str()), Page::all())
                .await?;
            if tree.get(child_id).is_none() {
                if let Some(child) = self
                    .collection
                    .find_one(&Filter::new().eq(JSONLD_ID_KEY, child_id.as_str()))
                    .await?
                {
                    found.insert(0, child);
                }
            }
            for stored in found {
                if let StoredDocument::Live(live) = StoredDocument::from_stored(stored)? {
                    if tree.get(&live.external_id).is_none()
                        && !nodes.iter().any(|n| n.external_id == live.external_id)
                    {
                        nodes.push(live);
                        adopted += 1;
                    }
                }
            }
        }
        if adopted > 0 {
            debug!(root = %target.external_id, adopted, "resuming an interrupted root delete");
        }
        Ok(VersionTree::new(nodes))
    }
}
