//! Domain-level error taxonomy for Lineage.

use lineage_state::StorageError;

/// Why a document refuses mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmutableReason {
    Deleted,
    Released,
}

impl std::fmt::Display for ImmutableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmutableReason::Deleted => write!(f, "deleted"),
            ImmutableReason::Released => write!(f, "released"),
        }
    }
}

/// Lineage domain errors.
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("agent {agent} is not the generator of {id}")]
    Unauthorized { agent: String, id: String },

    #[error("agent {agent} may not {action} {id}: not its generator")]
    Forbidden {
        agent: String,
        action: &'static str,
        id: String,
    },

    #[error("document {id} is {reason} and cannot be changed")]
    Immutable { id: String, reason: ImmutableReason },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("identifier already in use: {0}")]
    DuplicateIdentifier(String),

    /// Optimistic-lock mismatch; carries the document as it currently is.
    #[error("version conflict: document changed since the supplied version token")]
    VersionConflict { current_version: Box<serde_json::Value> },

    #[error("tree integrity error: {0}")]
    Integrity(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LineageError {
    /// HTTP-class status code of the error.
    pub fn status_code(&self) -> u16 {
        match self {
            LineageError::Validation(_) => 400,
            LineageError::Unauthorized { .. } => 401,
            LineageError::Forbidden { .. } | LineageError::Immutable { .. } => 403,
            LineageError::NotFound(_) => 404,
            LineageError::DuplicateIdentifier(_) | LineageError::VersionConflict { .. } => 409,
            LineageError::Integrity(_)
            | LineageError::Storage(_)
            | LineageError::Serialization(_)
            | LineageError::Config(_) => 500,
        }
    }
}

/// Result type for Lineage domain operations.
pub type Result<T> = std::result::Result<T, LineageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(LineageError::Validation("x".into()).status_code(), 400);
        assert_eq!(
            LineageError::Unauthorized {
                agent: "a".into(),
                id: "b".into()
            }
            .status_code(),
            401
        );
        assert_eq!(
            LineageError::Immutable {
                id: "b".into(),
                reason: ImmutableReason::Released
            }
            .status_code(),
            403
        );
        assert_eq!(LineageError::NotFound("b".into()).status_code(), 404);
        assert_eq!(
            LineageError::VersionConflict {
                current_version: Box::new(serde_json::json!({}))
            }
            .status_code(),
            409
        );
        assert_eq!(LineageError::Integrity("x".into()).status_code(), 500);
    }

    #[test]
    fn test_immutable_error_names_reason() {
        let err = LineageError::Immutable {
            id: "http://x/1".to_string(),
            reason: ImmutableReason::Deleted,
        };
        let msg = err.to_string();
        assert!(msg.contains("http://x/1"));
        assert!(msg.contains("deleted"));
    }

    #[test]
    fn test_storage_error_converts() {
        let err: LineageError = StorageError::Connection("refused".to_string()).into();
        assert!(err.to_string().contains("refused"));
        assert_eq!(err.status_code(), 500);
    }
}
