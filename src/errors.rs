//! Typed error hierarchy for the zoo auditing core.
//!
//! Two top-level enums cover the two failure surfaces:
//! - `AuditError`: catalog lookups, issue validation and persistence
//! - `ChatError`: delivery failures of a single chat message

use thiserror::Error;

/// Errors from the auditing core and the catalog store.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Repository {id} not found")]
    RepositoryNotFound { id: i64 },

    #[error("Issue {id} not found")]
    IssueNotFound { id: i64 },

    #[error("Repository path does not exist: {path}")]
    MissingPath { path: std::path::PathBuf },

    #[error("Invalid issue field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Unknown route '{route}' with {arity} argument(s)")]
    NoReverseMatch { route: String, arity: usize },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuditError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Errors raised while delivering one chat message.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The chat API answered but refused the message (e.g. `channel_not_found`).
    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Slack request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Slack request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Slack is not configured: {0}")]
    NotConfigured(String),
}
