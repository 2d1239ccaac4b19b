//! User domain model.
//!
//! Only the slice of the account this core needs: identity, email,
//! two-factor status and the currently selected workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub two_factor_enabled: bool,
    /// Workspace the user is currently acting in.
    pub current_workspace_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_current_workspace(&self, workspace_id: Uuid) -> bool {
        self.current_workspace_id == Some(workspace_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
}
