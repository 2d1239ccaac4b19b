//! SurrealDB repository implementations.
//!
//! Every read selects `meta::id(id) AS record_id, *` so a single row
//! struct per table serves both keyed lookups and searches. Writes that
//! must be check-then-act atomic run as one SurrealQL transaction.

mod invitation;
mod membership;
mod resource;
mod user;
mod workspace;

pub use invitation::SurrealInvitationRepository;
pub use membership::SurrealMembershipRepository;
pub use resource::SurrealResourceCounter;
pub use user::SurrealUserRepository;
pub use workspace::SurrealWorkspaceRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

impl CountRow {
    pub(crate) fn total(rows: Vec<CountRow>) -> u64 {
        rows.first().map(|r| r.total).unwrap_or(0)
    }
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}

pub(crate) fn parse_optional_uuid(
    field: &str,
    value: Option<String>,
) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(field, &v)).transpose()
}
