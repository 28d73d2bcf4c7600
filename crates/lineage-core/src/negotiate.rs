//! Identifier negotiation and output shaping.
//!
//! Two surface conventions exist for a document's identifier: the JSON-LD
//! reserved key `@id`, and the plain `id` key used by contexts such as IIIF
//! Presentation 3. The convention is resolved once per document from its
//! `@context` and threaded through explicitly; storage always uses `@id`.

use serde_json::{Map, Value};

use crate::domain::{
    DeletedDocument, Result, StoredDocument, VersionedDocument, CONTEXT_KEY, JSONLD_ID_KEY,
    LOCAL_ID_KEY, META_KEY, RECORD_ID_KEY, TOMBSTONE_KEY,
};

/// Which key carries a document's external identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdConvention {
    /// `@id`
    JsonLd,
    /// `id`
    LocalId,
}

impl IdConvention {
    pub fn key(self) -> &'static str {
        match self {
            IdConvention::JsonLd => JSONLD_ID_KEY,
            IdConvention::LocalId => LOCAL_ID_KEY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Negotiator {
    local_id_contexts: Vec<String>,
}

impl Negotiator {
    pub fn new(local_id_contexts: Vec<String>) -> Self {
        Self { local_id_contexts }
    }

    /// Resolve the convention from a document's `@context` (string or array).
    pub fn convention_for(&self, content: &Map<String, Value>) -> IdConvention {
        let known = |v: &Value| {
            v.as_str()
                .map(|c| self.local_id_contexts.iter().any(|k| k == c))
                .unwrap_or(false)
        };
        let local = match content.get(CONTEXT_KEY) {
            Some(Value::Array(items)) => items.iter().any(known),
            Some(other) => known(other),
            None => false,
        };
        if local {
            IdConvention::LocalId
        } else {
            IdConvention::JsonLd
        }
    }

    /// The identifier a caller body declares, if any, under either convention
    /// its context allows. `@id` is always honoured.
    pub fn declared_identifier<'a>(&self, body: &'a Map<String, Value>) -> Option<&'a Value> {
        if let Some(id) = body.get(JSONLD_ID_KEY) {
            return Some(id);
        }
        match self.convention_for(body) {
            IdConvention::LocalId => body.get(LOCAL_ID_KEY),
            IdConvention::JsonLd => None,
        }
    }

    /// Strip every identifier-like and engine-owned key from a caller body.
    pub fn sanitize(&self, mut body: Map<String, Value>) -> Map<String, Value> {
        let convention = self.convention_for(&body);
        for key in [RECORD_ID_KEY, JSONLD_ID_KEY, META_KEY, TOMBSTONE_KEY] {
            body.shift_remove(key);
        }
        if convention == IdConvention::LocalId {
            body.shift_remove(LOCAL_ID_KEY);
        }
        body
    }

    /// Caller-facing form of a live version: `@context`, identifier,
    /// content, then `__lineage`. The record id never leaves the engine.
    pub fn render_live(&self, doc: &VersionedDocument) -> Result<Value> {
        let convention = self.convention_for(&doc.content);
        let mut out = Map::new();
        if let Some(context) = doc.content.get(CONTEXT_KEY) {
            out.insert(CONTEXT_KEY.to_string(), context.clone());
        }
        out.insert(
            convention.key().to_string(),
            Value::String(doc.external_id.clone()),
        );
        for (k, v) in doc.content.iter().filter(|(k, _)| k.as_str() != CONTEXT_KEY) {
            out.insert(k.clone(), v.clone());
        }
        out.insert(META_KEY.to_string(), serde_json::to_value(&doc.meta)?);
        Ok(Value::Object(out))
    }

    pub fn render_deleted(&self, doc: &DeletedDocument) -> Result<Value> {
        let convention = doc
            .tombstone
            .original_content
            .as_object()
            .map(|original| self.convention_for(original))
            .unwrap_or(IdConvention::JsonLd);
        let mut out = Map::new();
        out.insert(
            convention.key().to_string(),
            Value::String(doc.external_id.clone()),
        );
        out.insert(TOMBSTONE_KEY.to_string(), serde_json::to_value(&doc.tombstone)?);
        Ok(Value::Object(out))
    }

    pub fn render(&self, doc: &StoredDocument) -> Result<Value> {
        match doc {
            StoredDocument::Live(live) => self.render_live(live),
            StoredDocument::Deleted(deleted) => self.render_deleted(deleted),
        }
    }
}
