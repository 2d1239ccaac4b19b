//! Role and capability decisions for one user in one workspace.
//!
//! [`RoleAuthority`] works on an already-loaded workspace and the
//! user's membership edge (if any). An absent edge means "deny", not an
//! error of this module. [`WorkspaceAccess`] is the owned bundle the
//! services load before asking.

use tessera_core::error::TesseraResult;
use tessera_core::models::capability::{Capability, CapabilitySet};
use tessera_core::models::membership::{Membership, Role};
use tessera_core::models::workspace::Workspace;
use tessera_core::repository::{MembershipRepository, WorkspaceRepository};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::AuthzError;

#[derive(Debug, Clone, Copy)]
pub struct RoleAuthority<'a> {
    workspace: &'a Workspace,
    user_id: Uuid,
    membership: Option<&'a Membership>,
}

impl<'a> RoleAuthority<'a> {
    /// An edge belonging to another workspace or user is ignored.
    pub fn new(workspace: &'a Workspace, user_id: Uuid, membership: Option<&'a Membership>) -> Self {
        let membership =
            membership.filter(|m| m.workspace_id == workspace.id && m.user_id == user_id);
        Self {
            workspace,
            user_id,
            membership,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.membership.map(|m| m.role)
    }

    pub fn is_member(&self) -> bool {
        self.membership.is_some()
    }

    /// Owner role on the edge and `owner_id` on the workspace must agree.
    /// A disagreement is reported and answered with `false`.
    pub fn is_owner(&self) -> bool {
        let holds_role = self.role() == Some(Role::Owner);
        let is_owner_id = self.workspace.is_owned_by(self.user_id);
        if holds_role != is_owner_id {
            error!(
                workspace_id = %self.workspace.id,
                user_id = %self.user_id,
                owner_id = %self.workspace.owner_id,
                role = ?self.role(),
                "Owner role and workspace owner_id disagree"
            );
        }
        holds_role && is_owner_id
    }

    pub fn is_admin_or_owner(&self) -> bool {
        self.role().is_some_and(|r| r.is_admin_or_owner())
    }

    /// Owners and admins hold every capability; members hold exactly
    /// their stored permissions.
    pub fn capabilities(&self) -> CapabilitySet {
        match self.membership {
            Some(m) if m.role.is_admin_or_owner() => CapabilitySet::full(),
            Some(m) => m.permissions.clone(),
            None => CapabilitySet::empty(),
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        match self.membership {
            Some(m) if m.role.is_admin_or_owner() => true,
            Some(m) => m.permissions.contains(capability),
            None => false,
        }
    }

    pub fn require_member(&self) -> Result<(), AuthzError> {
        if self.is_member() {
            Ok(())
        } else {
            Err(self.deny(AuthzError::NotAMember))
        }
    }

    pub fn require(&self, capability: Capability) -> Result<(), AuthzError> {
        self.require_member()?;
        if self.can(capability) {
            Ok(())
        } else {
            Err(self.deny(AuthzError::MissingCapability(capability)))
        }
    }

    pub fn require_admin_or_owner(&self) -> Result<(), AuthzError> {
        self.require_member()?;
        if self.is_admin_or_owner() {
            Ok(())
        } else {
            Err(self.deny(AuthzError::AdminOrOwnerRequired))
        }
    }

    pub fn require_owner(&self) -> Result<(), AuthzError> {
        self.require_member()?;
        if self.is_owner() {
            Ok(())
        } else {
            Err(self.deny(AuthzError::OwnerRequired))
        }
    }

    fn deny(&self, err: AuthzError) -> AuthzError {
        warn!(
            workspace_id = %self.workspace.id,
            user_id = %self.user_id,
            reason = %err,
            "Authorization denied"
        );
        err
    }
}

/// Check that exactly one owner edge exists and that it points at the
/// workspace's `owner_id`. Never repairs anything.
pub fn verify_single_owner(
    workspace: &Workspace,
    memberships: &[Membership],
) -> Result<(), AuthzError> {
    let owners: Vec<&Membership> = memberships
        .iter()
        .filter(|m| m.workspace_id == workspace.id && m.role == Role::Owner)
        .collect();

    let problem = match owners.as_slice() {
        [] => Some("workspace has no owner membership".to_string()),
        [only] if only.user_id != workspace.owner_id => Some(format!(
            "owner membership belongs to {} but owner_id is {}",
            only.user_id, workspace.owner_id
        )),
        [_] => None,
        many => Some(format!("workspace has {} owner memberships", many.len())),
    };

    match problem {
        None => Ok(()),
        Some(reason) => {
            error!(workspace_id = %workspace.id, %reason, "Ownership integrity violation");
            Err(AuthzError::Integrity(reason))
        }
    }
}

/// A workspace together with one user's edge in it.
#[derive(Debug, Clone)]
pub struct WorkspaceAccess {
    pub workspace: Workspace,
    pub user_id: Uuid,
    pub membership: Option<Membership>,
}

impl WorkspaceAccess {
    pub async fn load<W, M>(
        workspaces: &W,
        memberships: &M,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> TesseraResult<Self>
    where
        W: WorkspaceRepository,
        M: MembershipRepository,
    {
        let workspace = workspaces.get_by_id(workspace_id).await?;
        let membership = memberships.find(workspace_id, user_id).await?;
        Ok(Self {
            workspace,
            user_id,
            membership,
        })
    }

    pub fn authority(&self) -> RoleAuthority<'_> {
        RoleAuthority::new(&self.workspace, self.user_id, self.membership.as_ref())
    }
}
