//! Error types for the Tessera workspace core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// The requested state is already true (e.g. inviting an existing member).
    #[error("Entity already exists: {entity} ({reason})")]
    AlreadyExists { entity: String, reason: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// A plan limit blocks the action. Callers should offer an upgrade
    /// rather than retrying.
    #[error("Plan limit reached for {resource} (limit {limit})")]
    LimitReached { resource: String, limit: u32 },

    #[error("{entity} has expired")]
    Expired { entity: String },

    #[error("Invitation was issued to a different email address")]
    EmailMismatch,

    /// A broken invariant in stored data. Never auto-corrected.
    #[error("Integrity violation: {reason}")]
    IntegrityViolation { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TesseraError {
    /// True for the kinds a caller can recover from without operator
    /// intervention.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TesseraError::IntegrityViolation { .. }
                | TesseraError::Database(_)
                | TesseraError::Configuration(_)
                | TesseraError::Internal(_)
        )
    }
}

pub type TesseraResult<T> = Result<T, TesseraError>;
