//! Error types for lineage-state

use thiserror::Error;

/// Errors that can occur in the backing collection layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Insert collided with an existing surrogate id
    #[error("duplicate record id: {record_id}")]
    DuplicateKey { record_id: String },

    /// A document handed to the collection carries no string `_id`
    #[error("document has no string `_id` field")]
    MissingRecordId,

    /// A document is not a JSON object or could not be (de)serialized
    #[error("malformed document: {0}")]
    Malformed(String),

    /// Database connection error
    #[error("database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("schema setup failed: {0}")]
    SchemaSetup(String),

    /// Write refused by a fault armed on an in-memory fake
    #[error("injected write fault for record {record_id}")]
    InjectedFault { record_id: String },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Malformed(err.to_string())
    }
}
