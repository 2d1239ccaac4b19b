//! Tessera authorization: workspace roles, plan limits, two-factor
//! enforcement and invitations.
//!
//! The decision types ([`RoleAuthority`], [`PlanLimitGuard`],
//! [`TwoFactorGate`], [`InvitationLimiter`]) are pure and work on
//! already-loaded data. [`WorkspaceService`] and [`InvitationService`]
//! load that data through the `tessera-core` repository traits.

pub mod catalog;
pub mod config;
pub mod error;
pub mod invitations;
pub mod limits;
pub mod roles;
pub mod token;
pub mod two_factor;
pub mod workspaces;

pub use catalog::{FALLBACK_PLAN, PlanCatalog};
pub use config::{AuthzConfig, TwoFactorConfig};
pub use error::AuthzError;
pub use invitations::{InvitationLimiter, InvitationService, InviteInput};
pub use limits::{PlanLimitGuard, ResourceUsage};
pub use roles::{RoleAuthority, WorkspaceAccess, verify_single_owner};
pub use two_factor::{GateDecision, GateSubject, TwoFactorGate};
pub use workspaces::{WorkspaceService, WorkspaceStores};
