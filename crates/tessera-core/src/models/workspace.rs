//! Workspace (tenant) domain model.
//!
//! Workspaces are the isolation boundary: each owns its members,
//! invitations, billing plan and counted resources. Every user owns
//! exactly one personal workspace, which can be neither deleted nor
//! transferred.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slug used when a name has no ASCII alphanumerics.
pub const FALLBACK_SLUG: &str = "workspace";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique identifier (e.g. `acme-corp`, `acme-corp-2`).
    pub slug: String,
    pub personal: bool,
    /// Exclusive owner; always also a member with the `Owner` role.
    pub owner_id: Uuid,
    /// Members without two-factor authentication are redirected to
    /// enrollment while this is set.
    pub require_two_factor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields required to create a new workspace. The owner membership is
/// created alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
    pub slug: String,
    pub personal: bool,
    pub owner_id: Uuid,
}

/// Fields that can be updated on an existing workspace.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateWorkspace {
    pub name: Option<String>,
    pub require_two_factor: Option<bool>,
}

/// Derive a URL-safe slug from a display name: lowercase ASCII
/// alphanumerics, every other run of characters collapsed to one `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str(FALLBACK_SLUG);
    }
    slug
}

/// The `attempt`-th candidate for `base`: `base`, `base-1`, `base-2`, ...
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Acme -- Corp!! "), "acme-corp");
        assert_eq!(slugify("Team 42"), "team-42");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
    }

    #[test]
    fn slugify_falls_back_when_empty() {
        assert_eq!(slugify("!!!"), FALLBACK_SLUG);
        assert_eq!(slugify(""), FALLBACK_SLUG);
    }

    #[test]
    fn candidates_append_numeric_suffix() {
        assert_eq!(slug_candidate("acme", 0), "acme");
        assert_eq!(slug_candidate("acme", 1), "acme-1");
        assert_eq!(slug_candidate("acme", 12), "acme-12");
    }
}
