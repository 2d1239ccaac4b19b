//! Plan limit decisions.
//!
//! The guard answers whether one more resource of a kind fits under a
//! plan, and phrases the remaining capacity for display. Callers supply
//! the counts; nothing here touches storage.
//!
//! Counting rules the callers follow:
//! - `workspaces`: workspaces the user owns, checked against the best
//!   workspace limit among the plans of those workspaces.
//! - `team_members`: accepted members plus unexpired invitations of the
//!   single workspace.
//! - `api_keys`, `webhooks`: rows of the single workspace.

use serde::Serialize;
use tessera_core::models::plan::{Limit, ResourceKind};
use tracing::warn;

use crate::catalog::PlanCatalog;
use crate::error::AuthzError;

/// Capacity snapshot for one resource kind, as shown on billing pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    pub kind: ResourceKind,
    pub current: u64,
    pub limit: Limit,
    /// `None` when unlimited.
    pub remaining: Option<u64>,
    pub message: String,
}

impl ResourceUsage {
    pub fn can_create(&self) -> bool {
        self.limit.allows(self.current)
    }
}

/// Human-readable remaining capacity for `current` resources under `limit`.
pub fn remaining_message(kind: ResourceKind, current: u64, limit: Limit) -> String {
    let plural = kind.label(2);
    match limit {
        Limit::Unlimited => format!("Unlimited {plural} available"),
        Limit::Max(max) => match limit.remaining(current).unwrap_or(0) {
            0 => format!(
                "0 more {plural} available ({current}/{max} used), \
                 limit reached, upgrade to create more"
            ),
            n => format!(
                "{n} more {} available ({current}/{max} used)",
                kind.label(n)
            ),
        },
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlanLimitGuard<'a> {
    catalog: &'a PlanCatalog,
}

impl<'a> PlanLimitGuard<'a> {
    pub fn new(catalog: &'a PlanCatalog) -> Self {
        Self { catalog }
    }

    pub fn limit(&self, kind: ResourceKind, plan_key: &str) -> Limit {
        self.catalog.limits_for(plan_key).get(kind)
    }

    pub fn can_create(&self, kind: ResourceKind, current: u64, plan_key: &str) -> bool {
        self.limit(kind, plan_key).allows(current)
    }

    /// Like [`can_create`](Self::can_create), but reports a refusal as
    /// [`AuthzError::LimitReached`].
    pub fn check(&self, kind: ResourceKind, current: u64, plan_key: &str) -> Result<(), AuthzError> {
        check_limit(kind, current, self.limit(kind, plan_key))
    }

    pub fn remaining_message(&self, kind: ResourceKind, current: u64, plan_key: &str) -> String {
        remaining_message(kind, current, self.limit(kind, plan_key))
    }

    pub fn usage(&self, kind: ResourceKind, current: u64, plan_key: &str) -> ResourceUsage {
        usage_for(kind, current, self.limit(kind, plan_key))
    }

    /// Highest workspace limit among the plans of the workspaces a user
    /// owns. A user owning nothing gets the fallback plan's limit.
    pub fn max_workspaces_for_user<S: AsRef<str>>(&self, owned_plan_keys: &[S]) -> Limit {
        owned_plan_keys
            .iter()
            .map(|key| self.limit(ResourceKind::Workspaces, key.as_ref()))
            .max()
            .unwrap_or(self.catalog.fallback().limits.workspaces)
    }

    /// Whether the user may own one more workspace. `owned_plan_keys`
    /// holds one entry per owned workspace, so its length is the count.
    pub fn can_create_workspace<S: AsRef<str>>(&self, owned_plan_keys: &[S]) -> bool {
        self.max_workspaces_for_user(owned_plan_keys)
            .allows(owned_plan_keys.len() as u64)
    }

    pub fn workspace_usage<S: AsRef<str>>(&self, owned_plan_keys: &[S]) -> ResourceUsage {
        usage_for(
            ResourceKind::Workspaces,
            owned_plan_keys.len() as u64,
            self.max_workspaces_for_user(owned_plan_keys),
        )
    }
}

pub(crate) fn check_limit(kind: ResourceKind, current: u64, limit: Limit) -> Result<(), AuthzError> {
    match limit {
        Limit::Max(max) if !limit.allows(current) => {
            warn!(resource = %kind, current, limit = max, "Plan limit reached");
            Err(AuthzError::LimitReached { kind, limit: max })
        }
        _ => Ok(()),
    }
}

fn usage_for(kind: ResourceKind, current: u64, limit: Limit) -> ResourceUsage {
    ResourceUsage {
        kind,
        current,
        limit,
        remaining: limit.remaining(current),
        message: remaining_message(kind, current, limit),
    }
}
