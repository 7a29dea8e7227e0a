//! Role policy for the authorization gate.
//!
//! A gate is configured either with the "all roles permitted" sentinel or
//! with a non-empty explicit role set. The check runs against the token's
//! role snapshot, never a live lookup.

use std::collections::HashSet;

use thiserror::Error;

/// Role exempt from all role-based restriction checks.
pub const SUPERUSER_ROLE: &str = "superuser";

/// Invalid policy configuration. Raised at route-registration time; a
/// misconfigured route must fail startup, never an individual request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("allowed role set must not be empty")]
    EmptyRoleSet,
}

/// Which role snapshots a gate lets through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolePolicy {
    /// The sentinel: any authenticated identity passes.
    AllowAll,
    /// Only snapshots intersecting this set pass (superuser always does).
    Restricted(HashSet<String>),
}

impl RolePolicy {
    pub fn allow_all() -> Self {
        RolePolicy::AllowAll
    }

    /// Build an explicit policy from a role-name set.
    ///
    /// An empty set is a configuration error: it would reject every caller,
    /// which is never what a route author means.
    pub fn restricted<I, S>(roles: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = roles.into_iter().map(Into::into).collect();
        if set.is_empty() {
            return Err(PolicyError::EmptyRoleSet);
        }
        Ok(RolePolicy::Restricted(set))
    }

    /// Check a role snapshot against this policy.
    pub fn permits(&self, roles: &[String]) -> bool {
        match self {
            RolePolicy::AllowAll => true,
            RolePolicy::Restricted(allowed) => {
                roles.iter().any(|r| r == SUPERUSER_ROLE)
                    || roles.iter().any(|r| allowed.contains(r))
            }
        }
    }
}
