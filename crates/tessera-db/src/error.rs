//! Database-specific error types and conversions.

use tessera_core::error::TesseraError;

/// Fragment of SurrealDB's unique index violation message.
const UNIQUE_VIOLATION: &str = "already contains";

/// Fragments of SurrealDB's optimistic commit failure message.
const TX_CONFLICT: [&str; 3] = [
    "can be retried",
    "read or write conflict",
    "transaction conflict",
];

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record conflict on {entity}: {reason}")]
    Conflict { entity: String, reason: String },

    /// A concurrent transaction wrote the same keys first.
    #[error("Transaction conflict on {entity}: {reason}")]
    TransactionConflict { entity: String, reason: String },

    #[error("Seat limit of {limit} reached")]
    SeatLimitReached { limit: u32 },

    #[error("Invalid stored value: {0}")]
    Decode(String),
}

impl DbError {
    /// Classify an error from sending a query or from `Response::check`.
    pub(crate) fn from_statement(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains(UNIQUE_VIOLATION) {
            DbError::Conflict {
                entity: entity.into(),
                reason: message,
            }
        } else if TX_CONFLICT
            .iter()
            .any(|f| message.to_lowercase().contains(f))
        {
            DbError::TransactionConflict {
                entity: entity.into(),
                reason: message,
            }
        } else {
            DbError::Query(message)
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<DbError> for TesseraError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TesseraError::NotFound { entity, id },
            DbError::Conflict { entity, reason } => TesseraError::AlreadyExists { entity, reason },
            DbError::SeatLimitReached { limit } => TesseraError::LimitReached {
                resource: "team_members".into(),
                limit,
            },
            other => TesseraError::Database(other.to_string()),
        }
    }
}
