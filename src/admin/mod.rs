//! Admin status dashboard routes.
//!
//! Both routes sit behind the dashboard access policy (admins only by
//! default) and build a fresh [`DashboardView`](crate::status::DashboardView)
//! per request.

pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::handlers::{get_status, stream_status};
use crate::auth::{require_access, AccessPolicy};
use crate::http::server::AppState;

pub fn router(policy: Arc<AccessPolicy>) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/status/stream", get(stream_status))
        .route_layer(middleware::from_fn_with_state(policy, require_access))
}
