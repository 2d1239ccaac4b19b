//! Per-request two-factor enforcement gate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tessera_core::models::workspace::Workspace;
use uuid::Uuid;

use crate::config::TwoFactorConfig;

/// Outcome of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    /// The workspace owner passes without 2FA so they can always reach
    /// the setting that turns enforcement off.
    AllowExemptOwner,
    RedirectToEnforcement,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, GateDecision::RedirectToEnforcement)
    }
}

/// The authenticated user as the gate sees them.
#[derive(Debug, Clone, Copy)]
pub struct GateSubject {
    pub user_id: Uuid,
    pub two_factor_enabled: bool,
}

/// Stateless; every request is decided from scratch.
#[derive(Debug, Clone)]
pub struct TwoFactorGate {
    exempt_routes: BTreeSet<String>,
}

impl TwoFactorGate {
    pub fn new(exempt_routes: impl IntoIterator<Item = String>) -> Self {
        Self {
            exempt_routes: exempt_routes.into_iter().collect(),
        }
    }

    pub fn from_config(config: &TwoFactorConfig) -> Self {
        Self::new(config.exempt_routes.iter().cloned())
    }

    pub fn is_exempt(&self, route: &str) -> bool {
        self.exempt_routes.contains(route)
    }

    /// First matching rule wins:
    /// 1. no user, 2. no workspace or policy off, 3. owner,
    /// 4. exempt route, 5. 2FA enabled, 6. redirect.
    pub fn evaluate(
        &self,
        subject: Option<GateSubject>,
        workspace: Option<&Workspace>,
        route: Option<&str>,
    ) -> GateDecision {
        let Some(subject) = subject else {
            return GateDecision::Allow;
        };
        let Some(workspace) = workspace.filter(|w| w.require_two_factor) else {
            return GateDecision::Allow;
        };

        if workspace.is_owned_by(subject.user_id) {
            return if subject.two_factor_enabled {
                GateDecision::Allow
            } else {
                GateDecision::AllowExemptOwner
            };
        }

        if route.is_some_and(|r| self.is_exempt(r)) || subject.two_factor_enabled {
            return GateDecision::Allow;
        }

        GateDecision::RedirectToEnforcement
    }
}

impl Default for TwoFactorGate {
    fn default() -> Self {
        Self::from_config(&TwoFactorConfig::default())
    }
}
