use lineage_state::DocumentCollection;
use serde_json::Value;
use tracing::instrument;

use super::{into_object, require_agent, DocumentStore};
use crate::domain::{validate_slug, IdScheme, LineageError, Result};
use crate::obs;

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Store `body` as the root of a new version tree.
    ///
    /// With a `slug`, the slug becomes the record id and therefore the tail of
    /// the external id.
    #[instrument(skip(self, body), fields(agent = %agent))]
    pub async fn create(&self, body: Value, agent: &str, slug: Option<&str>) -> Result<Value> {
        require_agent(agent)?;
        let body = into_object(body)?;
        if self.negotiator.declared_identifier(&body).is_some() {
            return Err(LineageError::Validation(
                "create does not accept a declared identifier; use update to fork".to_string(),
            ));
        }

        let record_id = match slug {
            Some(slug) => {
                validate_slug(slug)?;
                if self.slug_owner(slug).await?.is_some() {
                    return Err(LineageError::DuplicateIdentifier(slug.to_string()));
                }
                slug.to_string()
            }
            None => IdScheme::generate_record_id(),
        };

        let doc = self.new_root(record_id, self.negotiator.sanitize(body), agent);
        self.insert(&doc).await?;
        obs::emit_document_created(&doc.external_id, agent);
        self.render(&doc)
    }
}
