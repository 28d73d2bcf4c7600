//! The versioned document and its stored representation.
//!
//! Stored layout of a live version:
//! `{ "_id", "@id", ...content, "__lineage": VersionMeta }`.
//! A tombstone keeps `_id` and `@id` and replaces everything else with
//! `"__deleted": Tombstone`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{LineageError, Result};

pub use lineage_state::RECORD_ID_KEY;

/// `history.prime` of a tree's origin document.
pub const ROOT: &str = "root";
pub const JSONLD_ID_KEY: &str = "@id";
pub const LOCAL_ID_KEY: &str = "id";
pub const CONTEXT_KEY: &str = "@context";
pub const META_KEY: &str = "__lineage";
pub const TOMBSTONE_KEY: &str = "__deleted";

/// Dotted path of `history.prime` inside a stored document.
pub const PRIME_PATH: &str = "__lineage.history.prime";
/// Dotted path of the slug alias inside a stored document.
pub const SLUG_PATH: &str = "__lineage.slug";

/// Current time as an RFC 3339 UTC string.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Append `id` unless already present. Returns whether it was added.
pub(crate) fn push_unique(ids: &mut Vec<String>, id: &str) -> bool {
    if ids.iter().any(|existing| existing == id) {
        return false;
    }
    ids.push(id.to_string());
    true
}

/// Edit-history links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    /// `"root"` on the tree origin, otherwise the origin's external id.
    pub prime: String,
    /// External id of the version this one was forked from, or `""`.
    pub previous: String,
    pub next: Vec<String>,
}

impl History {
    pub fn root() -> Self {
        Self {
            prime: ROOT.to_string(),
            previous: String::new(),
            next: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.prime == ROOT
    }

    /// Idempotent append to `next`.
    pub fn link_next(&mut self, id: &str) -> bool {
        push_unique(&mut self.next, id)
    }
}

/// Release-chain links, populated only by explicit releases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLinks {
    pub previous: String,
    pub next: Vec<String>,
    pub replaces: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    /// Release timestamp, or `""` while unreleased.
    #[serde(rename = "isReleased")]
    pub released_at: String,
    pub releases: ReleaseLinks,
}

impl ReleaseState {
    pub fn is_released(&self) -> bool {
        !self.released_at.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub generated_by: String,
    pub created_at: String,
    /// Last overwrite timestamp; doubles as the optimistic concurrency token.
    #[serde(rename = "isOverwritten")]
    pub overwritten_at: String,
}

/// Engine-owned metadata stored under `__lineage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMeta {
    pub history: History,
    pub release: ReleaseState,
    pub provenance: Provenance,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub api_version: String,
}

impl VersionMeta {
    /// Metadata of a brand-new tree origin.
    pub fn origin(agent: &str, api_version: &str) -> Self {
        Self {
            history: History::root(),
            release: ReleaseState::default(),
            provenance: Provenance {
                generated_by: agent.to_string(),
                created_at: timestamp(),
                overwritten_at: String::new(),
            },
            slug: String::new(),
            api_version: api_version.to_string(),
        }
    }
}

/// A live version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedDocument {
    pub record_id: String,
    pub external_id: String,
    /// Caller-owned properties, opaque to the engine.
    pub content: Map<String, Value>,
    pub meta: VersionMeta,
}

impl VersionedDocument {
    pub fn is_root(&self) -> bool {
        self.meta.history.is_root()
    }

    pub fn is_released(&self) -> bool {
        self.meta.release.is_released()
    }

    /// External id of the root of this document's version tree.
    pub fn tree_root_id(&self) -> &str {
        if self.is_root() {
            &self.external_id
        } else {
            &self.meta.history.prime
        }
    }

    /// Current optimistic concurrency token.
    pub fn version_token(&self) -> &str {
        &self.meta.provenance.overwritten_at
    }

    pub fn to_stored(&self) -> Result<Value> {
        let mut map = Map::new();
        map.insert(RECORD_ID_KEY.to_string(), Value::String(self.record_id.clone()));
        map.insert(
            JSONLD_ID_KEY.to_string(),
            Value::String(self.external_id.clone()),
        );
        for (k, v) in &self.content {
            map.insert(k.clone(), v.clone());
        }
        map.insert(META_KEY.to_string(), serde_json::to_value(&self.meta)?);
        Ok(Value::Object(map))
    }

    /// Replace this version by its tombstone. The full pre-deletion
    /// document is kept inside the tombstone.
    pub fn into_tombstone(self, deleting_agent: &str) -> Result<DeletedDocument> {
        let mut original = self.to_stored()?;
        if let Some(map) = original.as_object_mut() {
            map.shift_remove(RECORD_ID_KEY);
        }
        Ok(DeletedDocument {
            record_id: self.record_id,
            external_id: self.external_id,
            tombstone: Tombstone {
                original_content: original,
                deleting_agent: deleting_agent.to_string(),
                deletion_time: timestamp(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub original_content: Value,
    pub deleting_agent: String,
    pub deletion_time: String,
}

/// A soft-deleted version. It keeps its identifiers and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedDocument {
    pub record_id: String,
    pub external_id: String,
    pub tombstone: Tombstone,
}

impl DeletedDocument {
    pub fn to_stored(&self) -> Result<Value> {
        let mut map = Map::new();
        map.insert(RECORD_ID_KEY.to_string(), Value::String(self.record_id.clone()));
        map.insert(
            JSONLD_ID_KEY.to_string(),
            Value::String(self.external_id.clone()),
        );
        map.insert(TOMBSTONE_KEY.to_string(), serde_json::to_value(&self.tombstone)?);
        Ok(Value::Object(map))
    }
}

/// Anything the backing collection can hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredDocument {
    Live(VersionedDocument),
    Deleted(DeletedDocument),
}

impl StoredDocument {
    pub fn from_stored(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(LineageError::Integrity(
                "stored document is not a JSON object".to_string(),
            ));
        };
        let record_id = take_string(&mut map, RECORD_ID_KEY)?;
        let external_id = take_string(&mut map, JSONLD_ID_KEY)?;

        if let Some(tombstone) = map.shift_remove(TOMBSTONE_KEY) {
            return Ok(StoredDocument::Deleted(DeletedDocument {
                record_id,
                external_id,
                tombstone: serde_json::from_value(tombstone)?,
            }));
        }

        let meta = map.shift_remove(META_KEY).ok_or_else(|| {
            LineageError::Integrity(format!("{} carries no version metadata", external_id))
        })?;
        Ok(StoredDocument::Live(VersionedDocument {
            record_id,
            external_id,
            content: map,
            meta: serde_json::from_value(meta)?,
        }))
    }

    pub fn to_stored(&self) -> Result<Value> {
        match self {
            StoredDocument::Live(doc) => doc.to_stored(),
            StoredDocument::Deleted(doc) => doc.to_stored(),
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            StoredDocument::Live(doc) => &doc.external_id,
            StoredDocument::Deleted(doc) => &doc.external_id,
        }
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Result<String> {
    match map.shift_remove(key) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(LineageError::Integrity(format!(
            "stored document has no string `{}`",
            key
        ))),
    }
}
