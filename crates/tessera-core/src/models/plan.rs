//! Plan domain model.
//!
//! Plans are immutable at runtime and come from configuration. Each
//! limit is either a non-negative ceiling or unlimited. In
//! configuration files unlimited is written as `-1`; in code it is a
//! distinct variant so it can never be compared as a number.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Raw configuration value meaning "no ceiling".
pub const UNLIMITED: i64 = -1;

/// A resource ceiling.
///
/// Variant order makes `Unlimited` greater than every `Max(_)`, so the
/// most generous of several limits is simply their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Limit {
    Max(u32),
    Unlimited,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid limit {0}: expected a non-negative integer or -1 for unlimited")]
pub struct InvalidLimit(pub i64);

impl Limit {
    pub fn from_raw(raw: i64) -> Result<Self, InvalidLimit> {
        if raw == UNLIMITED {
            return Ok(Limit::Unlimited);
        }
        u32::try_from(raw)
            .map(Limit::Max)
            .map_err(|_| InvalidLimit(raw))
    }

    pub fn as_raw(&self) -> i64 {
        match self {
            Limit::Unlimited => UNLIMITED,
            Limit::Max(n) => i64::from(*n),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// Whether one more resource fits when `current` already exist.
    pub fn allows(&self, current: u64) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Max(max) => current < u64::from(*max),
        }
    }

    /// Remaining capacity, `None` when unlimited. Never negative: a
    /// workspace above its ceiling (e.g. after a downgrade) has zero left.
    pub fn remaining(&self, current: u64) -> Option<u64> {
        match self {
            Limit::Unlimited => None,
            Limit::Max(max) => Some(u64::from(*max).saturating_sub(current)),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Unlimited => f.write_str("unlimited"),
            Limit::Max(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_raw())
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Limit::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

/// Resource kinds constrained by plan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Workspaces,
    TeamMembers,
    ApiKeys,
    Webhooks,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Workspaces,
        ResourceKind::TeamMembers,
        ResourceKind::ApiKeys,
        ResourceKind::Webhooks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Workspaces => "workspaces",
            ResourceKind::TeamMembers => "team_members",
            ResourceKind::ApiKeys => "api_keys",
            ResourceKind::Webhooks => "webhooks",
        }
    }

    /// Human-readable label, pluralised for `count`.
    pub fn label(&self, count: u64) -> &'static str {
        let singular = count == 1;
        match self {
            ResourceKind::Workspaces if singular => "workspace",
            ResourceKind::Workspaces => "workspaces",
            ResourceKind::TeamMembers if singular => "team member",
            ResourceKind::TeamMembers => "team members",
            ResourceKind::ApiKeys if singular => "API key",
            ResourceKind::ApiKeys => "API keys",
            ResourceKind::Webhooks if singular => "webhook",
            ResourceKind::Webhooks => "webhooks",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace-owned rows whose count is read from the owning collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountedResource {
    ApiKeys,
    Webhooks,
}

impl CountedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CountedResource::ApiKeys => ResourceKind::ApiKeys,
            CountedResource::Webhooks => ResourceKind::Webhooks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub workspaces: Limit,
    pub team_members: Limit,
    pub api_keys: Limit,
    pub webhooks: Limit,
}

impl Limits {
    pub fn get(&self, kind: ResourceKind) -> Limit {
        match kind {
            ResourceKind::Workspaces => self.workspaces,
            ResourceKind::TeamMembers => self.team_members,
            ResourceKind::ApiKeys => self.api_keys,
            ResourceKind::Webhooks => self.webhooks,
        }
    }
}

/// A billing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Identifier matched against the subscription state (e.g. `pro`).
    pub key: String,
    /// Display name.
    pub name: String,
    pub limits: Limits,
    /// Feature flags unlocked by the plan.
    #[serde(default)]
    pub features: Vec<String>,
}
