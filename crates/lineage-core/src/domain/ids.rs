//! Record ids, external ids and slug aliases.

use std::sync::OnceLock;

use regex::Regex;

use super::error::{LineageError, Result};

const SLUG_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$";

/// Maps surrogate record ids to caller-visible external ids and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdScheme {
    prefix: String,
}

impl IdScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fresh surrogate id.
    pub fn generate_record_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn external_id(&self, record_id: &str) -> String {
        format!("{}{}", self.prefix, record_id)
    }

    /// Local key (record id or slug) named by a caller identifier.
    ///
    /// Accepts a full external id under this scheme's prefix or a bare key.
    /// Returns `None` for URIs minted elsewhere.
    pub fn resolve<'a>(&self, identifier: &'a str) -> Option<&'a str> {
        if let Some(local) = identifier.strip_prefix(self.prefix.as_str()) {
            return (!local.is_empty()).then_some(local);
        }
        if identifier.is_empty() || identifier.contains("://") || identifier.contains('/') {
            return None;
        }
        Some(identifier)
    }

    pub fn is_local(&self, identifier: &str) -> bool {
        self.resolve(identifier).is_some()
    }
}

fn slug_regex() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(SLUG_PATTERN).expect("slug pattern compiles"))
}

/// Reject slugs that cannot serve as record ids.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug_regex().is_match(slug) {
        Ok(())
    } else {
        Err(LineageError::Validation(format!(
            "slug {:?} must match {}",
            slug, SLUG_PATTERN
        )))
    }
}
