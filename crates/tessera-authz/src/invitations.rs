//! Invitation limits and the invitation lifecycle.
//!
//! [`InvitationLimiter`] decides whether a workspace has a free seat:
//! accepted members plus unexpired invitations against the plan's
//! `team_members` limit. [`InvitationService`] runs invite, accept,
//! cancel and listing against the repositories and hands new tokens to
//! the [`InvitationNotifier`].

use chrono::Utc;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::capability::Capability;
use tessera_core::models::invitation::{Invitation, InvitationEmail, UpsertInvitation};
use tessera_core::models::membership::{Membership, Role};
use tessera_core::models::plan::{Limit, ResourceKind};
use tessera_core::models::user::User;
use tessera_core::repository::{
    InvitationNotifier, InvitationRepository, MembershipRepository, PlanResolver, UserRepository,
    WorkspaceRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::PlanCatalog;
use crate::config::AuthzConfig;
use crate::error::AuthzError;
use crate::limits::{PlanLimitGuard, ResourceUsage};
use crate::roles::WorkspaceAccess;
use crate::token;

#[derive(Debug, Clone, Copy)]
pub struct InvitationLimiter<'a> {
    guard: PlanLimitGuard<'a>,
}

impl<'a> InvitationLimiter<'a> {
    pub fn new(catalog: &'a PlanCatalog) -> Self {
        Self {
            guard: PlanLimitGuard::new(catalog),
        }
    }

    pub fn seat_limit(&self, plan_key: &str) -> Limit {
        self.guard.limit(ResourceKind::TeamMembers, plan_key)
    }

    pub fn can_invite(&self, plan_key: &str, members: u64, pending: u64) -> bool {
        self.guard
            .can_create(ResourceKind::TeamMembers, members + pending, plan_key)
    }

    pub fn check(&self, plan_key: &str, members: u64, pending: u64) -> Result<(), AuthzError> {
        self.guard
            .check(ResourceKind::TeamMembers, members + pending, plan_key)
    }

    pub fn usage(&self, plan_key: &str, members: u64, pending: u64) -> ResourceUsage {
        self.guard
            .usage(ResourceKind::TeamMembers, members + pending, plan_key)
    }
}

/// Input for [`InvitationService::invite`].
#[derive(Debug, Clone)]
pub struct InviteInput {
    pub workspace_id: Uuid,
    pub email: String,
    pub role: Role,
    pub acting_user_id: Uuid,
}

/// Invitation lifecycle service.
///
/// Generic over repository and collaborator implementations so that
/// the authorization layer has no dependency on the database crate.
pub struct InvitationService<W, M, I, U, P, N> {
    workspaces: W,
    memberships: M,
    invitations: I,
    users: U,
    plans: P,
    notifier: N,
    config: AuthzConfig,
}

impl<W, M, I, U, P, N> InvitationService<W, M, I, U, P, N>
where
    W: WorkspaceRepository,
    M: MembershipRepository,
    I: InvitationRepository,
    U: UserRepository,
    P: PlanResolver,
    N: InvitationNotifier,
{
    pub fn new(
        workspaces: W,
        memberships: M,
        invitations: I,
        users: U,
        plans: P,
        notifier: N,
        config: AuthzConfig,
    ) -> Self {
        Self {
            workspaces,
            memberships,
            invitations,
            users,
            plans,
            notifier,
            config,
        }
    }

    fn limiter(&self) -> InvitationLimiter<'_> {
        InvitationLimiter::new(&self.config.plans)
    }

    /// Seats taken in the workspace: members plus unexpired invitations.
    async fn seat_counts(&self, workspace_id: Uuid) -> TesseraResult<(u64, u64)> {
        let members = self.memberships.count(workspace_id).await?;
        let pending = self.invitations.count_pending(workspace_id).await?;
        Ok((members, pending))
    }

    /// Whether one more invitation fits under the workspace's plan.
    pub async fn can_invite(&self, workspace_id: Uuid) -> TesseraResult<bool> {
        let plan_key = self.plans.resolve_plan_key(workspace_id).await?;
        let (members, pending) = self.seat_counts(workspace_id).await?;
        Ok(self.limiter().can_invite(&plan_key, members, pending))
    }

    pub async fn seat_usage(&self, workspace_id: Uuid) -> TesseraResult<ResourceUsage> {
        let plan_key = self.plans.resolve_plan_key(workspace_id).await?;
        let (members, pending) = self.seat_counts(workspace_id).await?;
        Ok(self.limiter().usage(&plan_key, members, pending))
    }

    /// Issue an invitation, or refresh the outstanding one for the same
    /// address with a new role, inviter, token and expiry.
    pub async fn invite(&self, input: InviteInput) -> TesseraResult<Invitation> {
        if !input.role.is_invitable() {
            return Err(AuthzError::RoleNotInvitable(input.role).into());
        }

        let access = WorkspaceAccess::load(
            &self.workspaces,
            &self.memberships,
            input.workspace_id,
            input.acting_user_id,
        )
        .await?;
        let authority = access.authority();
        authority.require(Capability::ManageTeam)?;
        // Granular permissions never hand out more than member access.
        if input.role == Role::Admin {
            authority.require_admin_or_owner()?;
        }

        if let Some(existing) = self.users.get_by_email(&input.email).await? {
            let edge = self.memberships.find(input.workspace_id, existing.id).await?;
            if edge.is_some() {
                return Err(AuthzError::AlreadyMember { email: input.email }.into());
            }
        }

        let plan_key = self.plans.resolve_plan_key(input.workspace_id).await?;
        let (members, mut pending) = self.seat_counts(input.workspace_id).await?;

        // A live invitation for this address already holds its seat.
        let now = Utc::now();
        if self
            .invitations
            .find_pending(input.workspace_id, &input.email)
            .await?
            .is_some_and(|inv| !inv.is_expired_at(now))
        {
            pending = pending.saturating_sub(1);
        }
        let limiter = self.limiter();
        limiter.check(&plan_key, members, pending)?;

        let inviter = self.users.get_by_id(input.acting_user_id).await?;

        let raw_token = token::generate_invitation_token();
        let invitation = self
            .invitations
            .upsert_pending(
                UpsertInvitation {
                    workspace_id: input.workspace_id,
                    email: input.email.clone(),
                    role: input.role,
                    token_hash: token::hash_invitation_token(&raw_token),
                    invited_by: input.acting_user_id,
                    expires_at: now + self.config.invitation_lifetime(),
                },
                limiter.seat_limit(&plan_key),
            )
            .await
            .inspect_err(|e| {
                if let TesseraError::LimitReached { limit, .. } = e {
                    warn!(
                        workspace_id = %input.workspace_id,
                        limit,
                        "Seat limit reached while writing invitation"
                    );
                }
            })?;

        self.notifier
            .send_invitation_email(InvitationEmail {
                email: invitation.email.clone(),
                token: raw_token,
                workspace_name: access.workspace.name.clone(),
                inviter_name: inviter.name,
                role: invitation.role,
            })
            .await;

        info!(
            workspace_id = %invitation.workspace_id,
            invitation_id = %invitation.id,
            role = %invitation.role,
            invited_by = %invitation.invited_by,
            "Invitation issued"
        );
        Ok(invitation)
    }

    /// Redeem a raw invitation token for `user`.
    ///
    /// On success the membership exists (created with the invitation's
    /// role unless the user already had one), the invitation is gone and
    /// the user's current workspace is the invited one.
    pub async fn accept(&self, raw_token: &str, user: &User) -> TesseraResult<Membership> {
        let invitation = self
            .invitations
            .get_by_token_hash(&token::hash_invitation_token(raw_token))
            .await?;

        if invitation.is_expired() {
            warn!(invitation_id = %invitation.id, "Expired invitation presented");
            return Err(AuthzError::InvitationExpired.into());
        }
        if invitation.email != user.email {
            warn!(
                invitation_id = %invitation.id,
                user_id = %user.id,
                "Invitation presented by a different account"
            );
            return Err(AuthzError::EmailMismatch.into());
        }

        // The workspace may have been deleted since the invitation went out.
        self.workspaces.get_by_id(invitation.workspace_id).await?;

        let membership = self.invitations.consume(&invitation, user.id).await?;
        self.users
            .set_current_workspace(user.id, Some(invitation.workspace_id))
            .await?;

        info!(
            workspace_id = %invitation.workspace_id,
            invitation_id = %invitation.id,
            user_id = %user.id,
            role = %membership.role,
            "Invitation accepted"
        );
        Ok(membership)
    }

    pub async fn cancel(
        &self,
        workspace_id: Uuid,
        invitation_id: Uuid,
        acting_user_id: Uuid,
    ) -> TesseraResult<()> {
        let access =
            WorkspaceAccess::load(&self.workspaces, &self.memberships, workspace_id, acting_user_id)
                .await?;
        access.authority().require(Capability::ManageTeam)?;

        let invitation = self.invitations.get_by_id(workspace_id, invitation_id).await?;
        self.invitations.delete(workspace_id, invitation.id).await?;

        info!(
            workspace_id = %workspace_id,
            invitation_id = %invitation.id,
            cancelled_by = %acting_user_id,
            "Invitation cancelled"
        );
        Ok(())
    }

    /// Unexpired invitations of the workspace, oldest first.
    pub async fn list_pending(&self, workspace_id: Uuid) -> TesseraResult<Vec<Invitation>> {
        let now = Utc::now();
        let invitations = self.invitations.list(workspace_id).await?;
        Ok(invitations
            .into_iter()
            .filter(|inv| !inv.is_expired_at(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_seat_scenario() {
        let catalog = PlanCatalog::default();
        let limiter = InvitationLimiter::new(&catalog);

        // Owner alone: one seat left.
        assert!(limiter.can_invite("free", 1, 0));
        // Owner plus one pending invitation: full.
        assert!(!limiter.can_invite("free", 1, 1));
        // Owner plus one accepted member: full.
        assert!(!limiter.can_invite("free", 2, 0));
        assert_eq!(
            limiter.usage("free", 2, 0).message,
            "0 more team members available (2/2 used), limit reached, upgrade to create more"
        );
    }

    #[test]
    fn unlimited_seats_always_invitable() {
        let catalog = PlanCatalog::default();
        let limiter = InvitationLimiter::new(&catalog);
        assert_eq!(limiter.seat_limit("business"), Limit::Unlimited);
        assert!(limiter.can_invite("business", 5_000, 5_000));
        assert!(limiter.check("business", u64::MAX / 2, 0).is_ok());
    }
}
