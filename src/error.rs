//! Error taxonomy for pipeline runs.
//!
//! Callers branch on these variants. Rate limits and timeouts are worth a
//! later retry; quota exhaustion and parse failures are not. A persistence
//! failure means the previous insight version is still the authoritative
//! one. Messages carry ids, counts and versions, never transcript or
//! insight text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    // Input errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    // Access control
    #[error("No caller identity; provide --actor, TIP_ACTOR, or `actor` in config")]
    Unauthorized,

    #[error("Access denied for session {session_id}")]
    Forbidden { session_id: String },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    // Synthesis call failures
    #[error("Synthesis backend rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Synthesis quota exhausted: {message}")]
    QuotaExhausted { message: String },

    #[error("Synthesis timed out after {timeout_secs}s")]
    SynthesisTimeout { timeout_secs: u64 },

    #[error("Synthesis returned an unusable payload: {message}")]
    SynthesisParse { message: String },

    #[error("Synthesis request failed: {message}")]
    Synthesis { message: String },

    // Versioned write failures
    #[error("Version conflict for session {session_id}: expected {expected}, found {found}")]
    VersionConflict {
        session_id: String,
        expected: i64,
        found: i64,
    },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!("; retry after {s}s"),
        None => String::new(),
    }
}

impl PipelineError {
    /// Stable short name recorded in the run ledger's `error_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation { .. } => "validation",
            PipelineError::Unauthorized => "unauthorized",
            PipelineError::Forbidden { .. } => "forbidden",
            PipelineError::SessionNotFound { .. } => "not_found",
            PipelineError::RateLimited { .. } => "rate_limited",
            PipelineError::QuotaExhausted { .. } => "quota_exhausted",
            PipelineError::SynthesisTimeout { .. } => "synthesis_timeout",
            PipelineError::SynthesisParse { .. } => "synthesis_parse",
            PipelineError::Synthesis { .. } => "synthesis",
            PipelineError::VersionConflict { .. } => "version_conflict",
            PipelineError::Persistence(_) => "persistence",
            PipelineError::Io(_) => "io",
            PipelineError::Config { .. } => "config",
        }
    }

    /// True for failures worth retrying after a pause.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::RateLimited { .. } | PipelineError::SynthesisTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display_includes_retry_hint() {
        let err = PipelineError::RateLimited {
            retry_after_secs: Some(20),
        };
        assert_eq!(err.to_string(), "Synthesis backend rate limited; retry after 20s");

        let bare = PipelineError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(bare.to_string(), "Synthesis backend rate limited");
    }

    #[test]
    fn version_conflict_display_names_the_versions() {
        let err = PipelineError::VersionConflict {
            session_id: "s-1".to_string(),
            expected: 3,
            found: 4,
        };
        assert_eq!(
            err.to_string(),
            "Version conflict for session s-1: expected 3, found 4"
        );
    }

    #[test]
    fn kinds_are_stable_ledger_labels() {
        assert_eq!(
            PipelineError::Validation {
                message: "too short".to_string()
            }
            .kind(),
            "validation"
        );
        assert_eq!(
            PipelineError::SynthesisParse {
                message: "not json".to_string()
            }
            .kind(),
            "synthesis_parse"
        );
        assert_eq!(PipelineError::Unauthorized.kind(), "unauthorized");
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(PipelineError::RateLimited {
            retry_after_secs: None
        }
        .is_retryable());
        assert!(PipelineError::SynthesisTimeout { timeout_secs: 60 }.is_retryable());
        assert!(!PipelineError::QuotaExhausted {
            message: "credits required".to_string()
        }
        .is_retryable());
        assert!(!PipelineError::Validation {
            message: "bad".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PipelineError>();
        assert_sync::<PipelineError>();
    }
}
