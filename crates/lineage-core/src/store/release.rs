use lineage_state::DocumentCollection;
use serde_json::Value;
use tracing::instrument;

use super::{require_agent, DocumentStore};
use crate::domain::{timestamp, validate_slug, ImmutableReason, LineageError, Result};
use crate::obs;
use crate::release_tree::plan_release;

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Freeze a version as a citable release, optionally under a slug alias.
    ///
    /// The release chain around the target is established or healed first;
    /// the target is stamped last, so an interrupted release can be retried.
    #[instrument(skip(self), fields(agent = %agent))]
    pub async fn release(&self, identifier: &str, agent: &str, slug: Option<&str>) -> Result<Value> {
        require_agent(agent)?;
        if identifier.trim().is_empty() {
            return Err(LineageError::Validation(
                "release requires an identifier".to_string(),
            ));
        }
        let loaded = self.load_live(identifier).await?;
        self.authorize_owner(agent, "release", &loaded)?;
        if loaded.is_released() {
            return Err(LineageError::Immutable {
                id: loaded.external_id,
                reason: ImmutableReason::Released,
            });
        }
        if let Some(slug) = slug {
            validate_slug(slug)?;
            match self.slug_owner(slug).await? {
                Some(owner) if owner != loaded.record_id => {
                    return Err(LineageError::DuplicateIdentifier(slug.to_string()))
                }
                _ => {}
            }
        }

        let tree = self.version_tree(&loaded).await?;
        let target = tree.get(&loaded.external_id).cloned().unwrap_or(loaded);
        let plan = plan_release(&tree, &target)?;
        let rewrites = plan.rewrites.into_changed(&tree);
        let healed = self
            .persist_healing("release", &target.external_id, &rewrites)
            .await?;

        let mut released = target;
        let release = &mut released.meta.release;
        release.released_at = timestamp();
        release.releases.previous = plan.predecessor.clone();
        release.releases.replaces = plan.predecessor;
        if let Some(slug) = slug {
            released.meta.slug = slug.to_string();
        }
        self.persist(&released).await?;

        obs::emit_document_released(&released.external_id, plan.mode.as_str(), healed);
        self.render(&released)
    }
}
