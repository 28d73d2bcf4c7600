//! SurrealDB Handle - Connection and Schema
//!
//! Supports local (in-memory), URL and authenticated (WebSocket) connections.
//! Documents live in a single `documents` table; each row holds the surrogate
//! id and the serialized JSON body so that arbitrary caller keys (`@id`,
//! `@context`, nested `null`s) survive storage untouched.

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::storage_traits::StorageResult;

const DEFAULT_NAMESPACE: &str = "lineage";
const DEFAULT_DATABASE: &str = "main";

/// Credentials for an authenticated SurrealDB endpoint
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Root user (true) or database user (false)
    pub is_root: bool,
}

/// Where and how to connect
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Endpoint URL (e.g. "mem://", "ws://localhost:8000", "wss://xxx.surrealdb.cloud")
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    pub credentials: Option<Credentials>,
}

impl ConnectionConfig {
    /// Unauthenticated connection to the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            credentials: None,
        }
    }

    /// Ephemeral in-process engine
    pub fn memory() -> Self {
        Self::new("mem://")
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        is_root: bool,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
            is_root,
        });
        self
    }

    /// Resolve from environment variables
    ///
    /// Reads, in order of precedence:
    /// - SURREALDB_ENDPOINT + SURREALDB_USERNAME + SURREALDB_PASSWORD
    ///   (+ SURREALDB_ROOT, default "false") for an authenticated endpoint
    /// - SURREALDB_URL for an unauthenticated endpoint
    /// - otherwise the in-memory engine
    ///
    /// SURREALDB_NAMESPACE / SURREALDB_DATABASE override the defaults
    /// ("lineage" / "main") in every case.
    pub fn from_env() -> Self {
        let base = match (
            std::env::var("SURREALDB_ENDPOINT"),
            std::env::var("SURREALDB_USERNAME"),
            std::env::var("SURREALDB_PASSWORD"),
        ) {
            (Ok(endpoint), Ok(username), Ok(password)) => {
                let is_root = std::env::var("SURREALDB_ROOT")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false);
                Self::new(endpoint).with_credentials(username, password, is_root)
            }
            _ => match std::env::var("SURREALDB_URL") {
                Ok(url) => Self::new(url),
                Err(_) => Self::memory(),
            },
        };

        let base = match std::env::var("SURREALDB_NAMESPACE") {
            Ok(ns) => base.with_namespace(ns),
            Err(_) => base,
        };
        match std::env::var("SURREALDB_DATABASE") {
            Ok(db) => base.with_database(db),
            Err(_) => base,
        }
    }
}

/// SurrealDB connection handle for Lineage
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    pub async fn setup_db() -> StorageResult<Self> {
        Self::connect(ConnectionConfig::memory()).await
    }

    /// Connect using environment variables (see [`ConnectionConfig::from_env`])
    pub async fn setup_from_env() -> StorageResult<Self> {
        Self::connect(ConnectionConfig::from_env()).await
    }

    /// Connect, authenticate if credentials are present, select
    /// namespace/database and initialise the schema.
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: ConnectionConfig) -> StorageResult<Self> {
        info!("Connecting to SurrealDB");

        let db = surrealdb::engine::any::connect(config.endpoint.as_str())
            .await
            .map_err(|e| {
                StorageError::Connection(format!("failed to connect to {}: {}", config.endpoint, e))
            })?;

        if let Some(creds) = &config.credentials {
            if creds.is_root {
                db.signin(Root {
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map_err(|e| StorageError::Connection(format!("root authentication failed: {}", e)))?;
            } else {
                db.signin(Database {
                    namespace: &config.namespace,
                    database: &config.database,
                    username: &creds.username,
                    password: &creds.password,
                })
                .await
                .map_err(|e| {
                    StorageError::Connection(format!("database authentication failed: {}", e))
                })?;
            }
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| {
                StorageError::Connection(format!("failed to select namespace/database: {}", e))
            })?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        debug!("Initializing document schema");

        let schema = r#"
            DEFINE TABLE IF NOT EXISTS documents SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS record_id ON documents TYPE string;
            DEFINE FIELD IF NOT EXISTS body ON documents TYPE string;
            DEFINE FIELD IF NOT EXISTS external_id ON documents TYPE option<string>;
            DEFINE FIELD IF NOT EXISTS prime ON documents TYPE option<string>;
            DEFINE FIELD IF NOT EXISTS slug ON documents TYPE option<string>;
            DEFINE FIELD IF NOT EXISTS inserted_at ON documents TYPE datetime;
            DEFINE INDEX IF NOT EXISTS idx_document_record_id ON documents FIELDS record_id UNIQUE;
            DEFINE INDEX IF NOT EXISTS idx_document_external_id ON documents FIELDS external_id;
            DEFINE INDEX IF NOT EXISTS idx_document_prime ON documents FIELDS prime;
            DEFINE INDEX IF NOT EXISTS idx_document_slug ON documents FIELDS slug;
        "#;

        self.db
            .query(schema)
            .await
            .and_then(|response| response.check())
            .map_err(|e| StorageError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    pub(crate) fn db(&self) -> &Surreal<Any> {
        &self.db
    }
}
