use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A convenience `Result` alias using [`GateflowError`].
pub type GateflowResult<T> = Result<T, GateflowError>;

/// A single field-level problem inside an [`GateflowError::InvalidInput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// Name of the offending input field.
    pub field: String,
    /// Human-readable description of what is wrong with it.
    pub issue: String,
}

impl FieldIssue {
    /// Creates a field issue.
    pub fn new(field: impl Into<String>, issue: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            issue: issue.into(),
        }
    }
}

/// Top-level error type for the Gateflow platform.
///
/// Each variant is a fixed error kind from the platform taxonomy. Operations
/// are transactional: they either succeed fully or leave state unchanged and
/// return one of these. Only [`GateflowError::Transient`] is retryable.
#[derive(Error, Debug)]
pub enum GateflowError {
    /// An unknown project, gate, task, worker, or artifact was referenced.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up (e.g. `"project"`, `"task"`).
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// The actor is not allowed to perform an owner-only operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A transition guard failed (predecessor gate not approved, proof
    /// missing, deliverables incomplete, spec locked at review time).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Malformed input: a bad approval phrase or schema-invalid tool
    /// arguments, surfaced with a per-field issue list.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Summary of the validation failure.
        message: String,
        /// Per-field problems, empty when the failure is not field-scoped.
        issues: Vec<FieldIssue>,
    },

    /// A conflicting state change: circular dependency at enqueue, spec
    /// already locked, spawn already completed, or optimistic-lock loss.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A proof artifact's recomputed hash no longer matches the hash
    /// recorded at submission.
    #[error("integrity failure for artifact {artifact_id}: stored {stored_hash}, current {current_hash}")]
    IntegrityFailure {
        /// The artifact whose content changed after submission.
        artifact_id: String,
        /// Hash recorded when the proof was submitted.
        stored_hash: String,
        /// Hash recomputed from the file's current bytes.
        current_hash: String,
    },

    /// Gate work was attempted without a completed required-agent spawn.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A non-retryable failure from the agent runtime or persistence layer.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// A retryable upstream failure; callers may retry with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateflowError {
    /// Creates a [`GateflowError::NotFound`] for the given entity kind and id.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an [`GateflowError::InvalidInput`] without field issues.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    /// Creates an [`GateflowError::InvalidInput`] carrying field issues.
    pub fn invalid_fields(message: impl Into<String>, issues: Vec<FieldIssue>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            issues,
        }
    }

    /// Whether this error may be retried (self-healing honors only these).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Short machine-readable kind tag, used in event payloads and tool
    /// results so the audit trail explains every rejection.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::IntegrityFailure { .. } => "integrity_failure",
            Self::ProtocolViolation(_) => "protocol_violation",
            Self::Upstream(_) => "upstream_failure",
            Self::Transient(_) => "transient",
            Self::Json(_) => "json",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = GateflowError::not_found("task", "t-42");
        assert_eq!(err.to_string(), "task not found: t-42");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(GateflowError::Transient("429".into()).is_retryable());
        assert!(!GateflowError::Upstream("bad gateway".into()).is_retryable());
        assert!(!GateflowError::PreconditionFailed("no proof".into()).is_retryable());
        assert!(!GateflowError::ProtocolViolation("no spawn".into()).is_retryable());
    }

    #[test]
    fn test_invalid_input_with_issues() {
        let err = GateflowError::invalid_fields(
            "2 invalid fields",
            vec![
                FieldIssue::new("priority", "must be one of critical/high/medium/low"),
                FieldIssue::new("max_attempts", "must be >= 1"),
            ],
        );
        match err {
            GateflowError::InvalidInput { issues, .. } => assert_eq!(issues.len(), 2),
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn test_integrity_failure_names_both_hashes() {
        let err = GateflowError::IntegrityFailure {
            artifact_id: "a1".into(),
            stored_hash: "aaa".into(),
            current_hash: "bbb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aaa"));
        assert!(msg.contains("bbb"));
    }
}
