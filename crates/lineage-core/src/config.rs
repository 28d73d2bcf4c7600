//! Store configuration.

use crate::domain::{LineageError, Result};

/// Default prefix under which record ids are published.
pub const DEFAULT_ID_PREFIX: &str = "http://localhost:3001/v1/id/";

/// Contexts whose documents publish their identifier under `id` instead of `@id`.
pub const DEFAULT_LOCAL_ID_CONTEXTS: &[&str] = &[
    "http://iiif.io/api/presentation/3/context.json",
    "https://linked.art/ns/v1/linked-art.json",
];

pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Configuration for a `DocumentStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prepended to record ids to form external ids
    pub id_prefix: String,
    /// Agent exempt from generator checks (system/bot writes)
    pub bot_agent: Option<String>,
    /// `@context` values selecting the `id` key convention
    pub local_id_contexts: Vec<String>,
    /// Stamped into the metadata of every new version
    pub api_version: String,
    /// Limit applied to queries that do not name one
    pub default_query_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            bot_agent: None,
            local_id_contexts: DEFAULT_LOCAL_ID_CONTEXTS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            api_version: crate::VERSION.to_string(),
            default_query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl StoreConfig {
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn with_bot_agent(mut self, agent: impl Into<String>) -> Self {
        self.bot_agent = Some(agent.into());
        self
    }

    pub fn with_local_id_contexts(mut self, contexts: Vec<String>) -> Self {
        self.local_id_contexts = contexts;
        self
    }

    pub fn with_default_query_limit(mut self, limit: usize) -> Self {
        self.default_query_limit = limit;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - LINEAGE_ID_PREFIX (optional, default: "http://localhost:3001/v1/id/")
    /// - LINEAGE_BOT_AGENT (optional)
    /// - LINEAGE_LOCAL_ID_CONTEXTS (optional, comma separated)
    /// - LINEAGE_QUERY_LIMIT (optional, default: 100)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(prefix) = std::env::var("LINEAGE_ID_PREFIX") {
            config.id_prefix = prefix;
        }
        if let Ok(agent) = std::env::var("LINEAGE_BOT_AGENT") {
            if !agent.trim().is_empty() {
                config.bot_agent = Some(agent.trim().to_string());
            }
        }
        if let Ok(contexts) = std::env::var("LINEAGE_LOCAL_ID_CONTEXTS") {
            config.local_id_contexts = contexts
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(limit) = std::env::var("LINEAGE_QUERY_LIMIT") {
            config.default_query_limit = limit.parse().map_err(|_| {
                LineageError::Config(format!("LINEAGE_QUERY_LIMIT is not a number: {}", limit))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot mint identifiers under.
    pub fn validate(&self) -> Result<()> {
        if !self.id_prefix.contains("://") || !self.id_prefix.ends_with('/') {
            return Err(LineageError::Config(format!(
                "id prefix must be an absolute URI ending in '/': {}",
                self.id_prefix
            )));
        }
        if self.default_query_limit == 0 {
            return Err(LineageError::Config(
                "default query limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `agent` may mutate documents generated by `generator`.
    pub fn may_act_for(&self, agent: &str, generator: &str) -> bool {
        agent == generator || self.bot_agent.as_deref() == Some(agent)
    }
}
