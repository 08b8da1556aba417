//! Caller-facing error taxonomy.
//!
//! Every failure the gateway reports before a response head has been sent is
//! a [`GatewayError`]. Failures after streaming began cannot change the status
//! code; they surface as an aborted body (see `relay::body`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::DenyReason;
use crate::relay::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("authentication required")]
    Unauthorized,

    #[error("role '{0}' may not access this resource")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl GatewayError {
    /// Stable machine-readable kind, used in response bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::Forbidden(_) => "forbidden",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::PayloadTooLarge(_) => "payload_too_large",
            GatewayError::Relay(e) => e.kind(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Relay(e) => e.status_code(),
        }
    }
}

impl From<DenyReason> for GatewayError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => GatewayError::Unauthorized,
            DenyReason::RoleNotPermitted(role) => GatewayError::Forbidden(role.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
