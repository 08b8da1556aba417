//! Identity claims attached to inbound requests.
//!
//! The authentication layer in front of the gateway resolves the caller and
//! forwards the result as two trusted headers. `attach_identity` turns those
//! into an [`IdentityClaim`] request extension; a request without them simply
//! carries no claim.

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::config::schema::IdentityConfig;

/// Role carried by an identity claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Admin,
    Banned,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Banned => "banned",
            Role::Other(name) => name,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "admin" => Role::Admin,
            "banned" => Role::Banned,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved caller identity. Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub subject_id: String,
    pub role: Role,
}

impl IdentityClaim {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    /// Read a claim from the configured headers. Both headers must be present
    /// and non-empty.
    pub fn from_headers(headers: &HeaderMap, config: &IdentityConfig) -> Option<Self> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let subject = read(&config.subject_header)?;
        let role = read(&config.role_header)?;
        Some(Self::new(subject, Role::from(role)))
    }
}

/// Resolves the claim once and stores it as a request extension.
pub async fn attach_identity(
    State(config): State<Arc<IdentityConfig>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(claim) = IdentityClaim::from_headers(req.headers(), &config) {
        tracing::debug!(subject = %claim.subject_id, role = %claim.role, "Identity claim attached");
        req.extensions_mut().insert(claim);
    }
    next.run(req).await
}
