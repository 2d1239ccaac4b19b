//! Configured table of billing plans.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessera_core::models::plan::{Limit, Limits, Plan};

use crate::error::AuthzError;

/// Plan applied to workspaces without a subscription and to any plan
/// key the catalog does not know.
pub const FALLBACK_PLAN: &str = "free";

/// Immutable lookup of plan key to limits and features.
///
/// Construction guarantees the fallback plan is present, so every
/// lookup resolves to some plan. Unknown keys never fail open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Plan>", into = "Vec<Plan>")]
pub struct PlanCatalog {
    plans: BTreeMap<String, Plan>,
    fallback: Plan,
}

impl PlanCatalog {
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Result<Self, AuthzError> {
        let mut table = BTreeMap::new();
        for plan in plans {
            if plan.key.trim().is_empty() {
                return Err(AuthzError::Config("plan key must not be empty".into()));
            }
            if let Some(previous) = table.insert(plan.key.clone(), plan) {
                return Err(AuthzError::Config(format!(
                    "plan '{}' is defined more than once",
                    previous.key
                )));
            }
        }

        let fallback = table.get(FALLBACK_PLAN).cloned().ok_or_else(|| {
            AuthzError::Config(format!("fallback plan '{FALLBACK_PLAN}' is not defined"))
        })?;

        Ok(Self {
            plans: table,
            fallback,
        })
    }

    /// Exact lookup, `None` for unknown keys.
    pub fn get(&self, key: &str) -> Option<&Plan> {
        self.plans.get(key)
    }

    /// The plan for `key`, or the fallback plan when the key is unknown.
    pub fn plan_for(&self, key: &str) -> &Plan {
        self.plans.get(key).unwrap_or(&self.fallback)
    }

    pub fn limits_for(&self, key: &str) -> Limits {
        self.plan_for(key).limits
    }

    pub fn has_feature(&self, key: &str, feature: &str) -> bool {
        self.plan_for(key).features.iter().any(|f| f == feature)
    }

    pub fn fallback(&self) -> &Plan {
        &self.fallback
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }
}

impl TryFrom<Vec<Plan>> for PlanCatalog {
    type Error = AuthzError;

    fn try_from(plans: Vec<Plan>) -> Result<Self, Self::Error> {
        PlanCatalog::new(plans)
    }
}

impl From<PlanCatalog> for Vec<Plan> {
    fn from(catalog: PlanCatalog) -> Self {
        catalog.plans.into_values().collect()
    }
}

fn plan(key: &str, name: &str, limits: [Limit; 4], features: &[&str]) -> Plan {
    let [workspaces, team_members, api_keys, webhooks] = limits;
    Plan {
        key: key.into(),
        name: name.into(),
        limits: Limits {
            workspaces,
            team_members,
            api_keys,
            webhooks,
        },
        features: features.iter().map(|f| (*f).to_string()).collect(),
    }
}

impl Default for PlanCatalog {
    /// Built-in free, pro and business tiers.
    fn default() -> Self {
        let free = plan(
            FALLBACK_PLAN,
            "Free",
            [Limit::Max(1), Limit::Max(2), Limit::Max(2), Limit::Max(1)],
            &[],
        );
        let pro = plan(
            "pro",
            "Pro",
            [Limit::Max(5), Limit::Max(10), Limit::Max(10), Limit::Max(5)],
            &["activity_logs", "priority_support"],
        );
        let business = plan(
            "business",
            "Business",
            [Limit::Unlimited; 4],
            &["activity_logs", "priority_support", "data_export", "sso"],
        );

        let mut plans = BTreeMap::new();
        for p in [free.clone(), pro, business] {
            plans.insert(p.key.clone(), p);
        }
        Self {
            plans,
            fallback: free,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_falls_back_to_free() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.plan_for("enterprise-legacy").key, FALLBACK_PLAN);
        assert_eq!(catalog.limits_for(""), catalog.limits_for(FALLBACK_PLAN));
        assert!(catalog.get("enterprise-legacy").is_none());
    }

    #[test]
    fn default_tiers() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.limits_for("free").team_members, Limit::Max(2));
        assert_eq!(catalog.limits_for("pro").workspaces, Limit::Max(5));
        assert!(catalog.limits_for("business").api_keys.is_unlimited());
        assert_eq!(catalog.plans().count(), 3);
    }

    #[test]
    fn features_are_per_plan() {
        let catalog = PlanCatalog::default();
        assert!(catalog.has_feature("business", "sso"));
        assert!(!catalog.has_feature("pro", "sso"));
        assert!(!catalog.has_feature("unknown", "activity_logs"));
    }

    #[test]
    fn catalog_requires_fallback_plan() {
        let pro = PlanCatalog::default().plan_for("pro").clone();
        let err = PlanCatalog::new([pro]).unwrap_err();
        assert!(err.to_string().contains("fallback plan"));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let free = PlanCatalog::default().fallback().clone();
        assert!(PlanCatalog::new([free.clone(), free]).is_err());
    }
}
