//! Capability domain model.
//!
//! Capabilities are the granular permissions checked by workspace
//! actions. The set is closed: unknown keys are rejected when parsing
//! or deserializing instead of being carried around as opaque strings.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named permission a workspace member may or may not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageTeam,
    ManageBilling,
    ManageWebhooks,
    ViewActivityLogs,
    ManageWorkspace,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ManageTeam,
        Capability::ManageBilling,
        Capability::ManageWebhooks,
        Capability::ViewActivityLogs,
        Capability::ManageWorkspace,
    ];

    /// Stable storage key (e.g. `manage_team`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageTeam => "manage_team",
            Capability::ManageBilling => "manage_billing",
            Capability::ManageWebhooks => "manage_webhooks",
            Capability::ViewActivityLogs => "view_activity_logs",
            Capability::ManageWorkspace => "manage_workspace",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown capability: {0}")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// An ordered, de-duplicated set of capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every capability; what owners and admins hold.
    pub fn full() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Parse storage keys, failing on the first unknown key.
    pub fn from_keys<I, S>(keys: I) -> Result<Self, UnknownCapability>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .map(|key| key.as_ref().parse::<Capability>())
            .collect()
    }

    pub fn to_keys(&self) -> Vec<String> {
        self.0.iter().map(|cap| cap.as_str().to_string()).collect()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn insert(&mut self, capability: Capability) -> bool {
        self.0.insert(capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Capability; N]> for CapabilitySet {
    fn from(caps: [Capability; N]) -> Self {
        caps.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_keys() {
        let set = CapabilitySet::from_keys(["manage_team", "view_activity_logs"]).unwrap();
        assert!(set.contains(Capability::ManageTeam));
        assert!(set.contains(Capability::ViewActivityLogs));
        assert!(!set.contains(Capability::ManageBilling));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = CapabilitySet::from_keys(["manage_team", "launch_rockets"]).unwrap_err();
        assert_eq!(err, UnknownCapability("launch_rockets".into()));
    }

    #[test]
    fn deserialize_rejects_unknown_key() {
        let ok: CapabilitySet = serde_json::from_str(r#"["manage_billing"]"#).unwrap();
        assert!(ok.contains(Capability::ManageBilling));

        let bad: Result<CapabilitySet, _> = serde_json::from_str(r#"["superuser"]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn duplicates_collapse() {
        let set = CapabilitySet::from_keys(["manage_team", "manage_team"]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.to_keys(), vec!["manage_team".to_string()]);
    }

    #[test]
    fn full_set_holds_every_capability() {
        let full = CapabilitySet::full();
        assert_eq!(full.len(), Capability::ALL.len());
        for cap in Capability::ALL {
            assert!(full.contains(cap));
        }
    }
}
