//! Authorization interceptors.
//!
//! `guard` is the plain composition: evaluate the policy, run the next step
//! only on `Admit`. `require_access` applies the same decision as an axum
//! middleware for routes that have no request-specific work before it.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::identity::IdentityClaim;
use crate::auth::policy::{authorize, AccessPolicy, Decision, DenyReason};
use crate::error::GatewayError;
use crate::observability::metrics;

fn log_denial(claim: Option<&IdentityClaim>, reason: &DenyReason) {
    let label = match reason {
        DenyReason::Unauthenticated => "unauthenticated",
        DenyReason::RoleNotPermitted(_) => "role",
    };
    tracing::warn!(
        subject = claim.map(|c| c.subject_id.as_str()).unwrap_or("-"),
        reason = ?reason,
        "Request denied"
    );
    metrics::record_denial(label);
}

/// Run `next` only if `claim` satisfies `policy`.
///
/// On denial `next` is never called, so nothing it would acquire (upstream
/// connections included) is ever touched.
pub async fn guard<F, Fut, T>(
    claim: Option<&IdentityClaim>,
    policy: &AccessPolicy,
    next: F,
) -> Result<T, GatewayError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    match authorize(claim, policy) {
        Decision::Admit => next().await,
        Decision::Deny(reason) => {
            log_denial(claim, &reason);
            Err(reason.into())
        }
    }
}

/// Axum middleware enforcing `policy` on the claim attached by the identity layer.
pub async fn require_access(
    State(policy): State<Arc<AccessPolicy>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let claim = req.extensions().get::<IdentityClaim>().cloned();
    match authorize(claim.as_ref(), &policy) {
        Decision::Admit => next.run(req).await,
        Decision::Deny(reason) => {
            log_denial(claim.as_ref(), &reason);
            GatewayError::from(reason).into_response()
        }
    }
}
