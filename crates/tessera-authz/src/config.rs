//! Authorization configuration.
//!
//! Every field has a default, so an empty TOML document yields the
//! built-in free/pro/business plans, a seven day invitation lifetime and
//! the standard two-factor exempt routes.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::catalog::PlanCatalog;
use crate::error::AuthzError;

/// Default invitation lifetime (7 days).
pub const DEFAULT_INVITATION_LIFETIME_SECS: u64 = 604_800;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Plan table, written as `[[plans]]` entries.
    pub plans: PlanCatalog,
    /// Seconds an invitation stays acceptable after it was last issued.
    pub invitation_lifetime_secs: u64,
    pub two_factor: TwoFactorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoFactorConfig {
    /// Route names reachable without 2FA in enforcing workspaces.
    pub exempt_routes: Vec<String>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            plans: PlanCatalog::default(),
            invitation_lifetime_secs: DEFAULT_INVITATION_LIFETIME_SECS,
            two_factor: TwoFactorConfig::default(),
        }
    }
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            exempt_routes: [
                "two-factor.setup",
                "two-factor.enable",
                "two-factor.challenge",
                "two-factor.required",
                "logout",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl AuthzConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, AuthzError> {
        let config: AuthzConfig =
            toml::from_str(source).map_err(|e| AuthzError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.invitation_lifetime_secs == 0 {
            return Err(AuthzError::Config(
                "invitation_lifetime_secs must be positive".into(),
            ));
        }
        self.lifetime_checked()?;
        Ok(())
    }

    /// Invitation lifetime as a duration. Out-of-range values (rejected
    /// by [`validate`](Self::validate)) fall back to the default.
    pub fn invitation_lifetime(&self) -> Duration {
        self.lifetime_checked()
            .unwrap_or_else(|_| Duration::days(7))
    }

    fn lifetime_checked(&self) -> Result<Duration, AuthzError> {
        i64::try_from(self.invitation_lifetime_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                AuthzError::Config(format!(
                    "invitation_lifetime_secs {} is out of range",
                    self.invitation_lifetime_secs
                ))
            })
    }
}
