//! Repository and collaborator trait definitions.
//!
//! All operations are async. Storage backends implement the repository
//! traits; the billing, two-factor and notification collaborators are
//! consumed through the narrow traits at the bottom of this module.
//! The decision logic built on top never performs I/O itself.

use uuid::Uuid;

use crate::error::TesseraResult;
use crate::models::{
    capability::CapabilitySet,
    invitation::{Invitation, InvitationEmail, UpsertInvitation},
    membership::{CreateMembership, Membership, Role},
    plan::{CountedResource, Limit},
    user::{CreateUser, User},
    workspace::{CreateWorkspace, UpdateWorkspace, Workspace},
};

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

pub trait WorkspaceRepository: Send + Sync {
    /// Create the workspace and its owner membership in one transaction.
    fn create(&self, input: CreateWorkspace)
    -> impl Future<Output = TesseraResult<Workspace>> + Send;
    /// Soft-deleted workspaces are reported as not found.
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<Workspace>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = TesseraResult<Workspace>> + Send;
    /// Includes soft-deleted workspaces: slugs are never reused.
    fn slug_exists(&self, slug: &str) -> impl Future<Output = TesseraResult<bool>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateWorkspace,
    ) -> impl Future<Output = TesseraResult<Workspace>> + Send;
    fn soft_delete(&self, id: Uuid) -> impl Future<Output = TesseraResult<()>> + Send;
    /// Workspaces whose `owner_id` is the user.
    fn list_owned_by(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Vec<Workspace>>> + Send;
    /// Workspaces the user holds any membership in.
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Vec<Workspace>>> + Send;
    fn get_personal(&self, user_id: Uuid) -> impl Future<Output = TesseraResult<Workspace>> + Send;
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

pub trait MembershipRepository: Send + Sync {
    /// The edge for (workspace, user), if any. Absence is not an error.
    fn find(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Option<Membership>>> + Send;
    fn list(
        &self,
        workspace_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Vec<Membership>>> + Send;
    /// Accepted members, owner included.
    fn count(&self, workspace_id: Uuid) -> impl Future<Output = TesseraResult<u64>> + Send;
    /// Fails with `AlreadyExists` when the pair already has an edge.
    fn add(&self, input: CreateMembership)
    -> impl Future<Output = TesseraResult<Membership>> + Send;
    fn update_role(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        role: Role,
        permissions: CapabilitySet,
    ) -> impl Future<Output = TesseraResult<Membership>> + Send;
    fn remove(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
    /// Atomically promote `to_user_id` to owner, demote `from_user_id` to
    /// admin and repoint the workspace's `owner_id`.
    fn transfer_ownership(
        &self,
        workspace_id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Invitations
// ---------------------------------------------------------------------------

pub trait InvitationRepository: Send + Sync {
    /// Create the invitation or refresh the existing one for the same
    /// (workspace, email), in a transaction that first re-counts members
    /// plus pending invitations against `seat_limit`. A violation found
    /// there is reported as `LimitReached`.
    fn upsert_pending(
        &self,
        input: UpsertInvitation,
        seat_limit: Limit,
    ) -> impl Future<Output = TesseraResult<Invitation>> + Send;
    fn get_by_id(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = TesseraResult<Invitation>> + Send;
    fn get_by_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = TesseraResult<Invitation>> + Send;
    fn find_pending(
        &self,
        workspace_id: Uuid,
        email: &str,
    ) -> impl Future<Output = TesseraResult<Option<Invitation>>> + Send;
    /// Unexpired invitations of the workspace.
    fn count_pending(&self, workspace_id: Uuid) -> impl Future<Output = TesseraResult<u64>> + Send;
    fn list(
        &self,
        workspace_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Vec<Invitation>>> + Send;
    /// In one transaction: create the membership with the invitation's
    /// role unless the user already has one, then delete the invitation.
    /// Returns the user's membership.
    fn consume(
        &self,
        invitation: &Invitation,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Membership>> + Send;
    fn delete(&self, workspace_id: Uuid, id: Uuid)
    -> impl Future<Output = TesseraResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = TesseraResult<Option<User>>> + Send;
    fn set_current_workspace(
        &self,
        user_id: Uuid,
        workspace_id: Option<Uuid>,
    ) -> impl Future<Output = TesseraResult<User>> + Send;
    fn set_two_factor_enabled(
        &self,
        user_id: Uuid,
        enabled: bool,
    ) -> impl Future<Output = TesseraResult<User>> + Send;
    /// Users whose current workspace is `workspace_id`.
    fn list_by_current_workspace(
        &self,
        workspace_id: Uuid,
    ) -> impl Future<Output = TesseraResult<Vec<User>>> + Send;
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Billing oracle. Returns `"free"` when no active subscription exists.
pub trait PlanResolver: Send + Sync {
    fn resolve_plan_key(
        &self,
        workspace_id: Uuid,
    ) -> impl Future<Output = TesseraResult<String>> + Send;
}

/// Two-factor enrollment oracle.
pub trait TwoFactorStatus: Send + Sync {
    fn has_two_factor_enabled(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TesseraResult<bool>> + Send;
}

/// Row counts for resources owned by other collaborators.
pub trait ResourceCounter: Send + Sync {
    fn count(
        &self,
        workspace_id: Uuid,
        resource: CountedResource,
    ) -> impl Future<Output = TesseraResult<u64>> + Send;
}

/// Invitation email dispatcher. Fire-and-forget: delivery failures and
/// retries belong to the implementation.
pub trait InvitationNotifier: Send + Sync {
    fn send_invitation_email(&self, email: InvitationEmail) -> impl Future<Output = ()> + Send;
}
