//! Domain models for Lineage.
//!
//! Canonical definitions for the core entities:
//! - `VersionedDocument`: a live version with its history/release/provenance
//! - `DeletedDocument` / `Tombstone`: what a soft delete leaves behind
//! - `IdScheme`: record id <-> external id mapping and slug rules

pub mod document;
pub mod error;
pub mod ids;

// Re-export main types and errors
pub use document::{
    timestamp, DeletedDocument, History, Provenance, ReleaseLinks, ReleaseState, StoredDocument,
    Tombstone, VersionMeta, VersionedDocument, CONTEXT_KEY, JSONLD_ID_KEY, LOCAL_ID_KEY,
    META_KEY, PRIME_PATH, RECORD_ID_KEY, ROOT, SLUG_PATH, TOMBSTONE_KEY,
};
pub use error::{ImmutableReason, LineageError, Result};
pub use ids::{validate_slug, IdScheme};
