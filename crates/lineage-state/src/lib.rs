//! Lineage-State: Backing Collection for the Lineage document store
//!
//! This crate provides the persistence layer of the version-preserving
//! document store. The engine above it sees only a narrow capability
//! interface over one flat collection of JSON documents.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: per-document atomicity and nothing more. Multi-document
//! consistency is the engine's problem.
//!
//! ## Key Components
//!
//! - `DocumentCollection`: find-one, find-many, insert-one, replace-one, bulk-write
//! - `MemoryCollection`: in-memory fake with write-fault injection
//! - `SurrealCollection`: SurrealDB-backed collection over a `SurrealHandle`

mod error;
pub mod fakes;
mod handle;
pub mod storage_traits;
pub mod surreal_collection;

pub use error::StorageError;
pub use handle::{ConnectionConfig, Credentials, SurrealHandle};
pub use storage_traits::{
    record_id_of, BulkWriteResult, DocumentCollection, Filter, Page, StorageResult, WriteOp,
    WriteOutcome, RECORD_ID_KEY,
};
pub use surreal_collection::SurrealCollection;
