//! Role-based access policies.
//!
//! # Design Decisions
//! - A policy is either an allow-list or a deny-list of roles
//! - `authorize` is a pure function of (claim, policy)
//! - Missing claims are always denied, whatever the policy

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::auth::identity::{IdentityClaim, Role};

/// Access policy for a single route. Constant for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Only the listed roles are admitted.
    Allow(BTreeSet<Role>),
    /// Every role except the listed ones is admitted.
    Deny(BTreeSet<Role>),
}

impl AccessPolicy {
    pub fn allow(roles: impl IntoIterator<Item = Role>) -> Self {
        AccessPolicy::Allow(roles.into_iter().collect())
    }

    pub fn deny(roles: impl IntoIterator<Item = Role>) -> Self {
        AccessPolicy::Deny(roles.into_iter().collect())
    }

    /// Policy wrapping a handler that must not run for `role`.
    pub fn without_role(role: Role) -> Self {
        Self::deny([role])
    }

    fn admits(&self, role: &Role) -> bool {
        match self {
            AccessPolicy::Allow(roles) => roles.contains(role),
            AccessPolicy::Deny(roles) => !roles.contains(role),
        }
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No identity claim was attached to the request.
    Unauthenticated,
    /// The claim's role is not permitted by the policy.
    RoleNotPermitted(Role),
}

/// Outcome of evaluating a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Decide whether a request carrying `claim` may proceed under `policy`.
pub fn authorize(claim: Option<&IdentityClaim>, policy: &AccessPolicy) -> Decision {
    match claim {
        None => Decision::Deny(DenyReason::Unauthenticated),
        Some(claim) if policy.admits(&claim.role) => Decision::Admit,
        Some(claim) => Decision::Deny(DenyReason::RoleNotPermitted(claim.role.clone())),
    }
}
