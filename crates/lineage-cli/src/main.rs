//! Lineage - version-preserving linked document store CLI
//!
//! The `lineage` command drives a store backed by SurrealDB (see
//! `SURREALDB_URL` / `SURREALDB_ENDPOINT`; in-memory when unset).
//!
//! ## Commands
//!
//! - `create`, `overwrite`: store a new document or replace one in place
//! - `update`, `set`, `unset`, `patch`: fork a new version
//! - `delete`, `release`: tombstone or freeze a version
//! - `bulk-create`, `bulk-update`: batch variants
//! - `get`, `query`, `history`, `since`: read access

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lineage_core::obs::OperationSpan;
use lineage_core::{DocumentStore, LineageError, Page, StoreConfig};
use lineage_state::{SurrealCollection, SurrealHandle};
use serde_json::{json, Value};
use tracing::{debug, Level};

type Store = DocumentStore<SurrealCollection>;

#[derive(Parser)]
#[command(name = "lineage")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Version-preserving linked document store", long_about = None)]
struct Cli {
    /// Agent URI the mutation is attributed to
    #[arg(long, global = true, env = "LINEAGE_AGENT")]
    agent: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a JSON document as the root of a new version tree
    Create {
        /// JSON body file, or `-` for stdin
        body: PathBuf,

        /// Use this slug as the record id
        #[arg(long)]
        slug: Option<String>,
    },

    /// Show a document or tombstone
    Get {
        /// External id, record id or slug
        id: String,
    },

    /// Replace a document's content in place
    Overwrite {
        /// JSON body naming its target via `@id` (or `id`)
        body: PathBuf,

        /// Version token from the last read; refuses the write if stale
        #[arg(long)]
        expect: Option<String>,
    },

    /// Fork a new version with the body as its content
    Update { body: PathBuf },

    /// Fork a new version with keys the original lacks added
    Set { body: PathBuf },

    /// Fork a new version without the keys given as null
    Unset { body: PathBuf },

    /// Fork a new version with existing keys changed
    Patch { body: PathBuf },

    /// Tombstone a version, healing its neighbors first
    Delete { id: String },

    /// Freeze a version as a citable release
    Release {
        id: String,

        /// Alias the release can be fetched by
        #[arg(long)]
        slug: Option<String>,
    },

    /// Create every document of a JSON array
    BulkCreate { body: PathBuf },

    /// Fork every document of a JSON array
    BulkUpdate { body: PathBuf },

    /// Find documents matching a JSON object of `path: value` pairs
    Query {
        filter: PathBuf,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, default_value_t = 0)]
        skip: usize,
    },

    /// Show the versions a document descends from, nearest first
    History { id: String },

    /// Show every version derived from a document
    Since { id: String },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Create { .. } => "create",
            Commands::Get { .. } => "get",
            Commands::Overwrite { .. } => "overwrite",
            Commands::Update { .. } => "update",
            Commands::Set { .. } => "set",
            Commands::Unset { .. } => "unset",
            Commands::Patch { .. } => "patch",
            Commands::Delete { .. } => "delete",
            Commands::Release { .. } => "release",
            Commands::BulkCreate { .. } => "bulk-create",
            Commands::BulkUpdate { .. } => "bulk-update",
            Commands::Query { .. } => "query",
            Commands::History { .. } => "history",
            Commands::Since { .. } => "since",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    lineage_core::init_tracing(cli.json, level);

    let config = StoreConfig::from_env().context("Invalid Lineage configuration")?;
    let handle = SurrealHandle::setup_from_env()
        .await
        .context("Failed to connect to the Lineage database")?;
    let store = DocumentStore::new(SurrealCollection::new(Arc::new(handle)), config)?;

    let agent = cli.agent.unwrap_or_default();
    let _span = OperationSpan::enter(cli.command.name(), &agent);
    let output = run(&store, &agent, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(store: &Store, agent: &str, command: Commands) -> Result<Value> {
    let needs_agent = !matches!(
        command,
        Commands::Get { .. } | Commands::Query { .. } | Commands::History { .. } | Commands::Since { .. }
    );
    if needs_agent && agent.trim().is_empty() {
        bail!("`{}` needs an agent: pass --agent or set LINEAGE_AGENT", command.name());
    }

    let output = match command {
        Commands::Create { body, slug } => {
            store
                .create(read_body(&body)?, agent, slug.as_deref())
                .await?
        }
        Commands::Get { id } => store.get(&id).await?,
        Commands::Overwrite { body, expect } => cmd_overwrite(store, agent, &body, expect).await?,
        Commands::Update { body } => store.update(read_body(&body)?, agent).await?.into_document(),
        Commands::Set { body } => store.set_keys(read_body(&body)?, agent).await?.into_document(),
        Commands::Unset { body } => store
            .unset_keys(read_body(&body)?, agent)
            .await?
            .into_document(),
        Commands::Patch { body } => store
            .patch_keys(read_body(&body)?, agent)
            .await?
            .into_document(),
        Commands::Delete { id } => {
            store.delete(&id, agent).await?;
            json!({ "deleted": id })
        }
        Commands::Release { id, slug } => store.release(&id, agent, slug.as_deref()).await?,
        Commands::BulkCreate { body } => {
            Value::Array(store.bulk_create(read_body(&body)?, agent).await?)
        }
        Commands::BulkUpdate { body } => {
            Value::Array(store.bulk_update(read_body(&body)?, agent).await?)
        }
        Commands::Query {
            filter,
            limit,
            skip,
        } => {
            let page = limit.map(|limit| Page::new(limit, skip)).or_else(|| {
                (skip > 0).then(|| Page::new(store.config().default_query_limit, skip))
            });
            Value::Array(store.query(read_body(&filter)?, page).await?)
        }
        Commands::History { id } => Value::Array(store.history(&id).await?),
        Commands::Since { id } => Value::Array(store.since(&id).await?),
    };
    Ok(output)
}

/// Overwrite, printing the current version on a token conflict.
async fn cmd_overwrite(
    store: &Store,
    agent: &str,
    body: &Path,
    expect: Option<String>,
) -> Result<Value> {
    match store
        .overwrite(read_body(body)?, agent, expect.as_deref())
        .await
    {
        Ok(done) => {
            debug!(version = %done.version, "overwrite applied");
            Ok(done.document)
        }
        Err(LineageError::VersionConflict { current_version }) => {
            println!("{}", serde_json::to_string_pretty(&current_version)?);
            bail!("version conflict: the document changed since the supplied token (409)")
        }
        Err(err) => Err(err.into()),
    }
}

/// Read a JSON body from a file, or from stdin for `-`.
fn read_body(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read body from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read body file {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}
