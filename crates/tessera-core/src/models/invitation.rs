//! Invitation domain model.
//!
//! At most one invitation exists per (workspace, email). Only the
//! SHA-256 hash of the invitation token is stored; the raw token is
//! handed to the notification dispatcher and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::membership::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub id: Uuid,
    pub workspace_id: Uuid,
    /// Invited address, compared exactly at acceptance.
    pub email: String,
    /// Always `Admin` or `Member`.
    pub role: Role,
    pub token_hash: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Fields for creating an invitation, or refreshing the existing one
/// for the same (workspace, email).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertInvitation {
    pub workspace_id: Uuid,
    pub email: String,
    pub role: Role,
    pub token_hash: String,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Payload handed to the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationEmail {
    pub email: String,
    /// Raw invitation token for the acceptance link.
    pub token: String,
    pub workspace_name: String,
    pub inviter_name: String,
    pub role: Role,
}
