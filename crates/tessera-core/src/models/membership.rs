//! Membership domain model.
//!
//! A membership is the (user, workspace, role) edge. A user appears at
//! most once per workspace, and exactly one edge per workspace carries
//! the `Owner` role.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capability::CapabilitySet;

/// Fixed role hierarchy. Variant order gives `Owner > Admin > Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Roles an invitation may grant. Ownership only moves by transfer.
    pub fn is_invitable(&self) -> bool {
        matches!(self, Role::Admin | Role::Member)
    }

    pub fn is_admin_or_owner(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    /// Granular capabilities; only consulted when `role` is `Member`.
    pub permissions: CapabilitySet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new membership edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub permissions: CapabilitySet,
}
