use lineage_state::DocumentCollection;
use serde_json::Value;
use tracing::instrument;

use super::{into_object, require_agent, DocumentStore, Overwritten};
use crate::domain::{timestamp, ImmutableReason, LineageError, Result};
use crate::obs;

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Replace the content of an unreleased version in place.
    ///
    /// When `expected_version` is given it must equal the document's current
    /// version token, otherwise nothing is written and the current document
    /// comes back inside `LineageError::VersionConflict`.
    #[instrument(skip(self, body), fields(agent = %agent))]
    pub async fn overwrite(
        &self,
        body: Value,
        agent: &str,
        expected_version: Option<&str>,
    ) -> Result<Overwritten> {
        require_agent(agent)?;
        let body = into_object(body)?;
        let identifier = self.target_identifier(&body)?;
        let mut doc = self.load_live(&identifier).await?;

        self.authorize_edit(agent, &doc)?;
        if doc.is_released() {
            return Err(LineageError::Immutable {
                id: doc.external_id,
                reason: ImmutableReason::Released,
            });
        }
        if let Some(expected) = expected_version {
            if expected != doc.version_token() {
                return Err(LineageError::VersionConflict {
                    current_version: Box::new(self.render(&doc)?),
                });
            }
        }

        doc.content = self.negotiator.sanitize(body);
        doc.meta.provenance.overwritten_at = timestamp();
        self.persist(&doc).await?;

        let version = doc.version_token().to_string();
        obs::emit_document_overwritten(&doc.external_id, &version);
        Ok(Overwritten {
            document: self.render(&doc)?,
            version,
        })
    }
}
