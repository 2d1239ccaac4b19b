//! Workspace lifecycle, membership management and per-request checks.

use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::capability::{Capability, CapabilitySet};
use tessera_core::models::membership::{Membership, Role};
use tessera_core::models::plan::{CountedResource, Limit, ResourceKind};
use tessera_core::models::user::User;
use tessera_core::models::workspace::{
    CreateWorkspace, UpdateWorkspace, Workspace, slug_candidate, slugify,
};
use tessera_core::repository::{
    InvitationRepository, MembershipRepository, PlanResolver, ResourceCounter, TwoFactorStatus,
    UserRepository, WorkspaceRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthzConfig;
use crate::error::AuthzError;
use crate::limits::{PlanLimitGuard, ResourceUsage, check_limit};
use crate::roles::{WorkspaceAccess, verify_single_owner};
use crate::two_factor::{GateDecision, GateSubject, TwoFactorGate};

/// Upper bound on numeric slug suffixes tried before giving up.
const MAX_SLUG_ATTEMPTS: u32 = 1_000;

/// Storage and collaborator handles used by [`WorkspaceService`].
pub struct WorkspaceStores<W, M, I, U, P, R, T> {
    pub workspaces: W,
    pub memberships: M,
    pub invitations: I,
    pub users: U,
    pub plans: P,
    pub resources: R,
    pub two_factor: T,
}

/// Workspace service.
///
/// Every operation takes the acting user explicitly; nothing reads an
/// ambient "current workspace".
pub struct WorkspaceService<W, M, I, U, P, R, T> {
    stores: WorkspaceStores<W, M, I, U, P, R, T>,
    gate: TwoFactorGate,
    config: AuthzConfig,
}

impl<W, M, I, U, P, R, T> WorkspaceService<W, M, I, U, P, R, T>
where
    W: WorkspaceRepository,
    M: MembershipRepository,
    I: InvitationRepository,
    U: UserRepository,
    P: PlanResolver,
    R: ResourceCounter,
    T: TwoFactorStatus,
{
    pub fn new(stores: WorkspaceStores<W, M, I, U, P, R, T>, config: AuthzConfig) -> Self {
        Self {
            stores,
            gate: TwoFactorGate::from_config(&config.two_factor),
            config,
        }
    }

    fn guard(&self) -> PlanLimitGuard<'_> {
        PlanLimitGuard::new(&self.config.plans)
    }

    pub async fn access(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<WorkspaceAccess> {
        WorkspaceAccess::load(
            &self.stores.workspaces,
            &self.stores.memberships,
            workspace_id,
            user_id,
        )
        .await
    }

    pub async fn role_of(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<Option<Role>> {
        Ok(self.access(workspace_id, user_id).await?.authority().role())
    }

    pub async fn capabilities(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> TesseraResult<CapabilitySet> {
        Ok(self
            .access(workspace_id, user_id)
            .await?
            .authority()
            .capabilities())
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// One plan key per workspace the user owns.
    async fn owned_plan_keys(&self, user_id: Uuid) -> TesseraResult<Vec<String>> {
        let owned = self.stores.workspaces.list_owned_by(user_id).await?;
        let mut keys = Vec::with_capacity(owned.len());
        for workspace in &owned {
            keys.push(self.stores.plans.resolve_plan_key(workspace.id).await?);
        }
        Ok(keys)
    }

    pub async fn max_workspaces_for_user(&self, user_id: Uuid) -> TesseraResult<Limit> {
        let keys = self.owned_plan_keys(user_id).await?;
        Ok(self.guard().max_workspaces_for_user(&keys))
    }

    pub async fn can_create_workspace(&self, user_id: Uuid) -> TesseraResult<bool> {
        let keys = self.owned_plan_keys(user_id).await?;
        Ok(self.guard().can_create_workspace(&keys))
    }

    pub async fn workspace_usage(&self, user_id: Uuid) -> TesseraResult<ResourceUsage> {
        let keys = self.owned_plan_keys(user_id).await?;
        Ok(self.guard().workspace_usage(&keys))
    }

    /// Create the workspace under the first free `slug_candidate` of
    /// `name`. A candidate claimed by a concurrent create between the
    /// lookup and the insert moves on to the next suffix.
    async fn create_with_unique_slug(
        &self,
        name: String,
        personal: bool,
        owner_id: Uuid,
    ) -> TesseraResult<Workspace> {
        let base = slugify(&name);
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = slug_candidate(&base, attempt);
            if self.stores.workspaces.slug_exists(&candidate).await? {
                debug!(slug = %candidate, "Slug taken, trying next suffix");
                continue;
            }
            let input = CreateWorkspace {
                name: name.clone(),
                slug: candidate.clone(),
                personal,
                owner_id,
            };
            match self.stores.workspaces.create(input).await {
                Err(TesseraError::AlreadyExists { .. }) => {
                    debug!(slug = %candidate, "Slug claimed concurrently, trying next suffix");
                }
                result => return result,
            }
        }
        Err(TesseraError::AlreadyExists {
            entity: "workspace".into(),
            reason: format!("no free slug for '{base}'"),
        })
    }

    /// Create a team workspace owned by `owner_id`, subject to the
    /// owned-workspace limit.
    pub async fn create_workspace(&self, owner_id: Uuid, name: &str) -> TesseraResult<Workspace> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthzError::InvalidRequest("workspace name must not be empty".into()).into());
        }

        let keys = self.owned_plan_keys(owner_id).await?;
        let limit = self.guard().max_workspaces_for_user(&keys);
        check_limit(ResourceKind::Workspaces, keys.len() as u64, limit)?;

        self.create_with_unique_slug(name.to_string(), false, owner_id)
            .await
    }

    /// Create the user's personal workspace at registration and make it
    /// current. Not subject to plan limits.
    pub async fn create_personal_workspace(&self, user: &User) -> TesseraResult<Workspace> {
        match self.stores.workspaces.get_personal(user.id).await {
            Ok(_) => {
                return Err(TesseraError::AlreadyExists {
                    entity: "workspace".into(),
                    reason: "user already has a personal workspace".into(),
                });
            }
            Err(TesseraError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let name = format!("{}'s Workspace", user.name.trim());
        let workspace = self.create_with_unique_slug(name, true, user.id).await?;

        self.stores
            .users
            .set_current_workspace(user.id, Some(workspace.id))
            .await?;
        Ok(workspace)
    }

    // -----------------------------------------------------------------------
    // Settings and lifecycle
    // -----------------------------------------------------------------------

    pub async fn update_settings(
        &self,
        workspace_id: Uuid,
        acting_user_id: Uuid,
        input: UpdateWorkspace,
    ) -> TesseraResult<Workspace> {
        let access = self.access(workspace_id, acting_user_id).await?;
        access.authority().require(Capability::ManageWorkspace)?;

        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AuthzError::InvalidRequest("workspace name must not be empty".into()).into());
        }

        let updated = self.stores.workspaces.update(workspace_id, input).await?;
        if updated.require_two_factor != access.workspace.require_two_factor {
            info!(
                workspace_id = %workspace_id,
                require_two_factor = updated.require_two_factor,
                changed_by = %acting_user_id,
                "Two-factor policy changed"
            );
        }
        Ok(updated)
    }

    /// Point `user_id` back at their personal workspace, or at nothing
    /// when they have none.
    async fn reassign_to_personal(&self, user_id: Uuid) -> TesseraResult<()> {
        let target = match self.stores.workspaces.get_personal(user_id).await {
            Ok(personal) => Some(personal.id),
            Err(TesseraError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        self.stores
            .users
            .set_current_workspace(user_id, target)
            .await?;
        Ok(())
    }

    async fn reassign_if_current(&self, user_id: Uuid, workspace_id: Uuid) -> TesseraResult<()> {
        let user = self.stores.users.get_by_id(user_id).await?;
        if user.is_current_workspace(workspace_id) {
            self.reassign_to_personal(user_id).await?;
        }
        Ok(())
    }

    /// Soft-delete a team workspace. Users currently working in it are
    /// moved to their personal workspaces first.
    pub async fn delete_workspace(&self, workspace_id: Uuid, acting_user_id: Uuid) -> TesseraResult<()> {
        let access = self.access(workspace_id, acting_user_id).await?;
        access.authority().require_owner()?;
        if access.workspace.personal {
            return Err(AuthzError::PersonalWorkspace { action: "deleted" }.into());
        }

        let active = self
            .stores
            .users
            .list_by_current_workspace(workspace_id)
            .await?;
        for user in &active {
            self.reassign_to_personal(user.id).await?;
        }

        self.stores.workspaces.soft_delete(workspace_id).await?;
        info!(
            workspace_id = %workspace_id,
            deleted_by = %acting_user_id,
            reassigned_users = active.len(),
            "Workspace deleted"
        );
        Ok(())
    }

    /// Make `workspace_id` the user's current workspace. Requires a
    /// membership.
    pub async fn switch_workspace(&self, user_id: Uuid, workspace_id: Uuid) -> TesseraResult<User> {
        let access = self.access(workspace_id, user_id).await?;
        access.authority().require_member()?;
        self.stores
            .users
            .set_current_workspace(user_id, Some(workspace_id))
            .await
    }

    // -----------------------------------------------------------------------
    // Membership management
    // -----------------------------------------------------------------------

    pub async fn list_members(
        &self,
        workspace_id: Uuid,
        acting_user_id: Uuid,
    ) -> TesseraResult<Vec<Membership>> {
        let access = self.access(workspace_id, acting_user_id).await?;
        access.authority().require_member()?;
        self.stores.memberships.list(workspace_id).await
    }

    async fn target_edge(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<Membership> {
        self.stores
            .memberships
            .find(workspace_id, user_id)
            .await?
            .ok_or_else(|| AuthzError::TargetNotMember.into())
    }

    /// Change a member's role. Granular permissions are kept only for
    /// the member role; admins hold everything anyway.
    pub async fn update_member_role(
        &self,
        workspace_id: Uuid,
        acting_user_id: Uuid,
        target_user_id: Uuid,
        role: Role,
        permissions: CapabilitySet,
    ) -> TesseraResult<Membership> {
        let access = self.access(workspace_id, acting_user_id).await?;
        access.authority().require_admin_or_owner()?;
        if role == Role::Owner {
            return Err(AuthzError::RoleNotAssignable(role).into());
        }

        let target = self.target_edge(workspace_id, target_user_id).await?;
        if target.role == Role::Owner || access.workspace.is_owned_by(target_user_id) {
            return Err(AuthzError::OwnerProtected { action: "modified" }.into());
        }

        let permissions = match role {
            Role::Member => permissions,
            _ => CapabilitySet::empty(),
        };
        let updated = self
            .stores
            .memberships
            .update_role(workspace_id, target_user_id, role, permissions)
            .await?;

        info!(
            workspace_id = %workspace_id,
            user_id = %target_user_id,
            role = %updated.role,
            changed_by = %acting_user_id,
            "Member role updated"
        );
        Ok(updated)
    }

    pub async fn remove_member(
        &self,
        workspace_id: Uuid,
        acting_user_id: Uuid,
        target_user_id: Uuid,
    ) -> TesseraResult<()> {
        let access = self.access(workspace_id, acting_user_id).await?;
        let authority = access.authority();
        authority.require(Capability::ManageTeam)?;
        if target_user_id == acting_user_id {
            return Err(AuthzError::SelfRemoval.into());
        }

        let target = self.target_edge(workspace_id, target_user_id).await?;
        if target.role == Role::Owner || access.workspace.is_owned_by(target_user_id) {
            return Err(AuthzError::OwnerProtected { action: "removed" }.into());
        }
        if target.role == Role::Admin {
            authority.require_admin_or_owner()?;
        }

        self.stores
            .memberships
            .remove(workspace_id, target_user_id)
            .await?;
        self.reassign_if_current(target_user_id, workspace_id).await?;

        info!(
            workspace_id = %workspace_id,
            user_id = %target_user_id,
            removed_by = %acting_user_id,
            "Member removed"
        );
        Ok(())
    }

    /// Self-service exit. The owner has to transfer ownership first.
    pub async fn leave_workspace(&self, workspace_id: Uuid, user_id: Uuid) -> TesseraResult<()> {
        let access = self.access(workspace_id, user_id).await?;
        let authority = access.authority();
        authority.require_member()?;
        if authority.role() == Some(Role::Owner) || access.workspace.is_owned_by(user_id) {
            return Err(AuthzError::OwnerCannotLeave.into());
        }

        self.stores.memberships.remove(workspace_id, user_id).await?;
        self.reassign_if_current(user_id, workspace_id).await?;

        info!(workspace_id = %workspace_id, user_id = %user_id, "Member left workspace");
        Ok(())
    }

    /// Hand the workspace to another existing member. The previous owner
    /// stays on as admin.
    pub async fn transfer_ownership(
        &self,
        workspace_id: Uuid,
        acting_user_id: Uuid,
        new_owner_id: Uuid,
    ) -> TesseraResult<()> {
        let access = self.access(workspace_id, acting_user_id).await?;
        access.authority().require_owner()?;
        if access.workspace.personal {
            return Err(AuthzError::PersonalWorkspace {
                action: "transferred",
            }
            .into());
        }
        if new_owner_id == acting_user_id {
            return Err(AuthzError::InvalidRequest("user already owns this workspace".into()).into());
        }

        self.target_edge(workspace_id, new_owner_id).await?;
        self.stores
            .memberships
            .transfer_ownership(workspace_id, acting_user_id, new_owner_id)
            .await
    }

    /// Check the single-owner invariant against stored data.
    pub async fn audit_ownership(&self, workspace_id: Uuid) -> TesseraResult<()> {
        let workspace = self.stores.workspaces.get_by_id(workspace_id).await?;
        let memberships = self.stores.memberships.list(workspace_id).await?;
        verify_single_owner(&workspace, &memberships)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Plan limits
    // -----------------------------------------------------------------------

    async fn current_count(&self, workspace_id: Uuid, kind: CountedKind) -> TesseraResult<u64> {
        match kind {
            CountedKind::Seats => {
                let members = self.stores.memberships.count(workspace_id).await?;
                let pending = self.stores.invitations.count_pending(workspace_id).await?;
                Ok(members + pending)
            }
            CountedKind::Rows(resource) => self.stores.resources.count(workspace_id, resource).await,
        }
    }

    /// Fails with `LimitReached` when one more API key or webhook would
    /// exceed the workspace's plan.
    pub async fn check_resource_limit(
        &self,
        workspace_id: Uuid,
        resource: CountedResource,
    ) -> TesseraResult<()> {
        let plan_key = self.stores.plans.resolve_plan_key(workspace_id).await?;
        let current = self
            .current_count(workspace_id, CountedKind::Rows(resource))
            .await?;
        self.guard().check(resource.kind(), current, &plan_key)?;
        Ok(())
    }

    pub async fn can_create_resource(
        &self,
        workspace_id: Uuid,
        resource: CountedResource,
    ) -> TesseraResult<bool> {
        match self.check_resource_limit(workspace_id, resource).await {
            Ok(()) => Ok(true),
            Err(TesseraError::LimitReached { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Capacity of every workspace-scoped resource kind.
    pub async fn usage_summary(&self, workspace_id: Uuid) -> TesseraResult<Vec<ResourceUsage>> {
        let plan_key = self.stores.plans.resolve_plan_key(workspace_id).await?;
        let guard = self.guard();

        let mut summary = Vec::with_capacity(3);
        for (kind, counted) in [
            (ResourceKind::TeamMembers, CountedKind::Seats),
            (ResourceKind::ApiKeys, CountedKind::Rows(CountedResource::ApiKeys)),
            (ResourceKind::Webhooks, CountedKind::Rows(CountedResource::Webhooks)),
        ] {
            let current = self.current_count(workspace_id, counted).await?;
            summary.push(guard.usage(kind, current, &plan_key));
        }
        Ok(summary)
    }

    pub async fn has_feature(&self, workspace_id: Uuid, feature: &str) -> TesseraResult<bool> {
        let plan_key = self.stores.plans.resolve_plan_key(workspace_id).await?;
        Ok(self.config.plans.has_feature(&plan_key, feature))
    }

    // -----------------------------------------------------------------------
    // Two-factor enforcement
    // -----------------------------------------------------------------------

    /// Decide one request of `user` (if authenticated) to `route` against
    /// their current workspace.
    pub async fn check_two_factor(
        &self,
        user: Option<&User>,
        route: Option<&str>,
    ) -> TesseraResult<GateDecision> {
        let Some(user) = user else {
            return Ok(self.gate.evaluate(None, None, route));
        };

        let workspace = match user.current_workspace_id {
            Some(id) => match self.stores.workspaces.get_by_id(id).await {
                Ok(workspace) => Some(workspace),
                Err(TesseraError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let subject = GateSubject {
            user_id: user.id,
            two_factor_enabled: self.stores.two_factor.has_two_factor_enabled(user.id).await?,
        };
        Ok(self.gate.evaluate(Some(subject), workspace.as_ref(), route))
    }
}

#[derive(Debug, Clone, Copy)]
enum CountedKind {
    Seats,
    Rows(CountedResource),
}
