//! Lineage Core Library
//!
//! A linked-document store that never loses an edit: every mutation forks a
//! new version, versions form an edit-history tree, and explicit releases
//! form a second, sparser tree over the same identifiers.

pub mod config;
pub mod domain;
pub mod graph;
pub mod negotiate;
pub mod obs;
pub mod release_tree;
pub mod store;
pub mod telemetry;

/// Crate version, stamped into the metadata of new versions.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::StoreConfig;

pub use domain::{
    DeletedDocument, History, IdScheme, ImmutableReason, LineageError, Provenance, ReleaseLinks,
    ReleaseState, Result, StoredDocument, Tombstone, VersionMeta, VersionedDocument,
};

pub use graph::{plan_delete_healing, GraphError, Rewrites, VersionTree};
pub use negotiate::{IdConvention, Negotiator};
pub use release_tree::{plan_release, ReleaseMode, ReleasePlan};
pub use store::{DocumentStore, ForkKind, MutationOutcome, Overwritten};
pub use telemetry::init_tracing;

pub use lineage_state::{DocumentCollection, Filter, Page};
