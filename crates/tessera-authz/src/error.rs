//! Authorization error types.

use tessera_core::error::TesseraError;
use tessera_core::models::capability::Capability;
use tessera_core::models::membership::Role;
use tessera_core::models::plan::ResourceKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("not a member of this workspace")]
    NotAMember,

    #[error("missing capability: {0}")]
    MissingCapability(Capability),

    #[error("admin or owner role required")]
    AdminOrOwnerRequired,

    #[error("owner role required")]
    OwnerRequired,

    /// The workspace owner is never the target of role changes or
    /// removal; ownership moves only through a transfer.
    #[error("the workspace owner cannot be {action}")]
    OwnerProtected { action: &'static str },

    #[error("the workspace owner cannot leave; transfer ownership first")]
    OwnerCannotLeave,

    #[error("members cannot remove themselves; leave the workspace instead")]
    SelfRemoval,

    #[error("user is not a member of this workspace")]
    TargetNotMember,

    #[error("role {0} cannot be invited")]
    RoleNotInvitable(Role),

    #[error("role {0} cannot be assigned directly")]
    RoleNotAssignable(Role),

    #[error("{email} is already a member of this workspace")]
    AlreadyMember { email: String },

    #[error("{kind} limit of {limit} reached")]
    LimitReached { kind: ResourceKind, limit: u32 },

    #[error("invitation has expired")]
    InvitationExpired,

    #[error("invitation was issued to a different email address")]
    EmailMismatch,

    #[error("personal workspaces cannot be {action}")]
    PersonalWorkspace { action: &'static str },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Integrity(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<AuthzError> for TesseraError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotAMember
            | AuthzError::MissingCapability(_)
            | AuthzError::AdminOrOwnerRequired
            | AuthzError::OwnerRequired
            | AuthzError::OwnerProtected { .. }
            | AuthzError::OwnerCannotLeave
            | AuthzError::SelfRemoval => TesseraError::AuthorizationDenied {
                reason: err.to_string(),
            },
            AuthzError::TargetNotMember => TesseraError::NotFound {
                entity: "membership".into(),
                id: err.to_string(),
            },
            AuthzError::RoleNotInvitable(_)
            | AuthzError::RoleNotAssignable(_)
            | AuthzError::PersonalWorkspace { .. }
            | AuthzError::InvalidRequest(_) => TesseraError::Validation {
                message: err.to_string(),
            },
            AuthzError::AlreadyMember { .. } => TesseraError::AlreadyExists {
                entity: "membership".into(),
                reason: err.to_string(),
            },
            AuthzError::LimitReached { kind, limit } => TesseraError::LimitReached {
                resource: kind.as_str().into(),
                limit,
            },
            AuthzError::InvitationExpired => TesseraError::Expired {
                entity: "invitation".into(),
            },
            AuthzError::EmailMismatch => TesseraError::EmailMismatch,
            AuthzError::Integrity(reason) => TesseraError::IntegrityViolation { reason },
            AuthzError::Config(msg) => TesseraError::Configuration(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_map_to_authorization_denied() {
        let err: TesseraError = AuthzError::MissingCapability(Capability::ManageTeam).into();
        assert!(matches!(err, TesseraError::AuthorizationDenied { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn integrity_is_not_recoverable() {
        let err: TesseraError = AuthzError::Integrity("two owners".into()).into();
        assert!(matches!(err, TesseraError::IntegrityViolation { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn limit_keeps_resource_name() {
        let err: TesseraError = AuthzError::LimitReached {
            kind: ResourceKind::TeamMembers,
            limit: 2,
        }
        .into();
        match err {
            TesseraError::LimitReached { resource, limit } => {
                assert_eq!(resource, "team_members");
                assert_eq!(limit, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
