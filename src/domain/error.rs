//! The TaskWing error taxonomy.
//!
//! One enum, one variant per error *kind* (not per call site).
//! Every public operation returns `TaskWingResult<T>` so callers can match on
//! `kind()` without downcasting.

use thiserror::Error;

/// The stable error taxonomy. Variant names double as the `kind` surfaced to
/// MCP and CLI callers.
#[derive(Debug, Error)]
pub enum TaskWingError {
    /// Referenced id absent. Idempotent delete still returns success at the
    /// call site; this variant is for reads.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-id violation, concurrent clarify on the same session, or an
    /// embedding dimension mismatch on write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A planning-pipeline state-machine precondition failed.
    #[error("gate violation: {0}")]
    GateViolation(String),

    /// Cancellation propagated verbatim; never wrapped as a generic failure.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Network / rate-limit failure. Retried with backoff before reaching
    /// the caller; this variant is the post-retry surface.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Missing or rejected credentials.
    #[error("auth error: {0}")]
    Auth(String),

    /// LLM output failed structural validation after the repair loop.
    #[error("schema violation: {0}")]
    Schema(String),

    /// Storage inconsistency detected by `Check()`.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Policy-level refusal: circuit breaker, implementation gate,
    /// protected-file, dry-run confirmation required.
    #[error("refused: {0}")]
    Refusal(String),

    /// Corrupted database or unwritable disk. Aborts the process.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl TaskWingError {
    /// The stable kind string used in `{ok:false, kind, message}` payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::GateViolation(_) => "GateViolation",
            Self::Cancelled(_) => "Cancelled",
            Self::Transient(_) => "Transient",
            Self::Auth(_) => "Auth",
            Self::Schema(_) => "Schema",
            Self::Integrity(_) => "Integrity",
            Self::Refusal(_) => "Refusal",
            Self::Fatal(_) => "Fatal",
        }
    }

    /// Whether a caller may retry this error without changing its input.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// An optional user-actionable hint, derived from the kind. Handlers may
    /// still attach a more specific hint when they construct the error.
    pub fn default_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound(_) => Some("No project memory found. Run bootstrap."),
            Self::Auth(_) => Some("Set the provider API key and retry."),
            Self::Refusal(_) => Some("circuit breaker engaged"),
            _ => None,
        }
    }
}

pub type TaskWingResult<T> = Result<T, TaskWingError>;

impl From<sqlx::Error> for TaskWingError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::Fatal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TaskWingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}

impl From<std::io::Error> for TaskWingError {
    fn from(err: std::io::Error) -> Self {
        Self::Integrity(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(TaskWingError::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(TaskWingError::GateViolation("x".into()).kind(), "GateViolation");
        assert_eq!(TaskWingError::Refusal("x".into()).kind(), "Refusal");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: TaskWingError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, TaskWingError::NotFound(_)));
    }

    #[test]
    fn refusal_hint_mentions_circuit_breaker() {
        let err = TaskWingError::Refusal("too many starts".into());
        assert_eq!(err.default_hint(), Some("circuit breaker engaged"));
    }
}
