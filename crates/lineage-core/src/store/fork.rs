//! The fork family: update, set, unset and patch.
//!
//! All four share one skeleton and differ only in how the new content is
//! computed from the original and the submitted body.

use lineage_state::DocumentCollection;
use serde_json::{Map, Value};
use tracing::instrument;

use super::{into_object, require_agent, DocumentStore, MutationOutcome};
use crate::domain::{IdScheme, Result, VersionMeta, VersionedDocument};
use crate::obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkKind {
    /// Replace all content.
    Update,
    /// Add keys the original lacks.
    Set,
    /// Remove keys submitted with a `null` value.
    Unset,
    /// Change values of keys the original already has.
    Patch,
}

impl ForkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ForkKind::Update => "update",
            ForkKind::Set => "set",
            ForkKind::Unset => "unset",
            ForkKind::Patch => "patch",
        }
    }

    /// Content of the new version, or `None` when it would equal the original.
    pub fn apply(
        self,
        original: &Map<String, Value>,
        submitted: Map<String, Value>,
    ) -> Option<Map<String, Value>> {
        let mut content = original.clone();
        let changed = match self {
            ForkKind::Update => return Some(submitted),
            ForkKind::Set => submitted.into_iter().fold(false, |changed, (key, value)| {
                if content.contains_key(&key) {
                    return changed;
                }
                content.insert(key, value);
                true
            }),
            ForkKind::Unset => submitted
                .into_iter()
                .filter(|(_, value)| value.is_null())
                .fold(false, |changed, (key, _)| {
                    content.shift_remove(&key).is_some() || changed
                }),
            ForkKind::Patch => submitted.into_iter().fold(false, |changed, (key, value)| {
                match content.get_mut(&key) {
                    Some(existing) if *existing != value => {
                        *existing = value;
                        true
                    }
                    _ => changed,
                }
            }),
        };
        changed.then_some(content)
    }
}

impl<C> DocumentStore<C>
where
    C: DocumentCollection,
{
    /// Fork a new version whose content is the submitted body.
    ///
    /// An identifier minted outside this store imports the body as a new
    /// root that records the foreign identifier as its `previous`.
    pub async fn update(&self, body: Value, agent: &str) -> Result<MutationOutcome> {
        self.fork(ForkKind::Update, body, agent).await
    }

    /// Fork with keys absent from the original added. Existing keys are
    /// never overwritten.
    pub async fn set_keys(&self, body: Value, agent: &str) -> Result<MutationOutcome> {
        self.fork(ForkKind::Set, body, agent).await
    }

    /// Fork without the keys submitted as `null`. Other keys are ignored.
    pub async fn unset_keys(&self, body: Value, agent: &str) -> Result<MutationOutcome> {
        self.fork(ForkKind::Unset, body, agent).await
    }

    /// Fork with new values for keys the original already has.
    pub async fn patch_keys(&self, body: Value, agent: &str) -> Result<MutationOutcome> {
        self.fork(ForkKind::Patch, body, agent).await
    }

    /// Shared body of the fork family.
    ///
    /// Deleted targets are refused. Released targets are not: a release is
    /// frozen against overwrite, and a fork is the only way to continue
    /// from it. The fork starts with an empty release block and leaves the
    /// released original untouched apart from its `next` link.
    #[instrument(skip(self, body), fields(kind = kind.as_str()))]
    async fn fork(&self, kind: ForkKind, body: Value, agent: &str) -> Result<MutationOutcome> {
        require_agent(agent)?;
        let body = into_object(body)?;
        let identifier = self.target_identifier(&body)?;

        if kind == ForkKind::Update && !self.ids.is_local(&identifier) {
            return self.import(identifier, body, agent).await;
        }

        let original = self.load_live(&identifier).await?;
        self.authorize_edit(agent, &original)?;

        let submitted = self.negotiator.sanitize(body);
        let Some(content) = kind.apply(&original.content, submitted) else {
            obs::emit_version_unchanged(&original.external_id, kind.as_str());
            return Ok(MutationOutcome::Unchanged(self.render(&original)?));
        };

        let child = self.new_fork(&original, content, agent);
        self.insert(&child).await?;
        self.link_child(&original, &child).await?;

        obs::emit_version_forked(&original.external_id, &child.external_id, kind.as_str());
        Ok(MutationOutcome::Forked(self.render(&child)?))
    }

    async fn import(
        &self,
        foreign_id: String,
        body: Map<String, Value>,
        agent: &str,
    ) -> Result<MutationOutcome> {
        let record_id = IdScheme::generate_record_id();
        let mut meta = VersionMeta::origin(agent, &self.config.api_version);
        meta.history.previous = foreign_id.clone();
        let doc = VersionedDocument {
            external_id: self.ids.external_id(&record_id),
            record_id,
            content: self.negotiator.sanitize(body),
            meta,
        };
        self.insert(&doc).await?;
        obs::emit_version_forked(&foreign_id, &doc.external_id, "import");
        Ok(MutationOutcome::Forked(self.render(&doc)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_set_only_adds_missing_keys() {
        let original = object(json!({"a": 1}));
        let next = ForkKind::Set
            .apply(&original, object(json!({"a": 9, "b": 2})))
            .unwrap();
        assert_eq!(Value::Object(next), json!({"a": 1, "b": 2}));
        assert!(ForkKind::Set
            .apply(&original, object(json!({"a": 2})))
            .is_none());
    }

    #[test]
    fn test_unset_removes_only_null_marked_existing_keys() {
        let original = object(json!({"a": 1, "b": 2}));
        let next = ForkKind::Unset
            .apply(&original, object(json!({"a": null, "b": 5, "z": null})))
            .unwrap();
        assert_eq!(Value::Object(next), json!({"b": 2}));
        assert!(ForkKind::Unset
            .apply(&original, object(json!({"z": null})))
            .is_none());
    }

    #[test]
    fn test_patch_only_changes_existing_keys() {
        let original = object(json!({"a": 1, "b": 2}));
        let next = ForkKind::Patch
            .apply(&original, object(json!({"a": 3, "c": 4})))
            .unwrap();
        assert_eq!(Value::Object(next), json!({"a": 3, "b": 2}));
        assert!(ForkKind::Patch
            .apply(&original, object(json!({"a": 1, "c": 4})))
            .is_none());
    }

    #[test]
    fn test_update_always_forks() {
        let original = object(json!({"a": 1}));
        let next = ForkKind::Update
            .apply(&original, object(json!({"a": 1})))
            .unwrap();
        assert_eq!(Value::Object(next), json!({"a": 1}));
    }
}
