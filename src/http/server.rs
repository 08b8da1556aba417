//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, identity, body limit)
//! - Bind server to listener
//! - Graceful shutdown on signal or coordinator trigger

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::auth::identity::attach_identity;
use crate::auth::AccessPolicy;
use crate::config::{GatewayConfig, StatusConfig};
use crate::http::chat::send_message;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::signals::shutdown_signal;
use crate::relay::{Relay, RelayError};
use crate::status::{DashboardView, StatusSourceClient};

/// Failures while assembling the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("relay setup failed: {0}")]
    Relay(#[from] RelayError),

    #[error("status client setup failed: {0}")]
    StatusClient(#[from] reqwest::Error),
}

/// Application state injected into handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub chat_policy: Arc<AccessPolicy>,
    pub max_body_bytes: usize,
    pub status: Arc<StatusConfig>,
    pub status_http: reqwest::Client,
}

impl AppState {
    /// A fresh dashboard view; its fetch cache lives as long as the view.
    pub fn dashboard_view(&self) -> Arc<DashboardView> {
        let client = StatusSourceClient::new(self.status_http.clone(), self.status.api_key.clone());
        Arc::new(DashboardView::new(self.status.sources.clone(), client))
    }
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        let relay = Arc::new(Relay::new(&config.upstream)?);

        let status_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.status.fetch_timeout_secs))
            .build()?;

        let state = AppState {
            relay,
            chat_policy: Arc::new(config.routes.chat.clone()),
            max_body_bytes: config.upstream.max_body_bytes,
            status: Arc::new(config.status.clone()),
            status_http,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let dashboard_policy = Arc::new(config.routes.dashboard.clone());
        let identity = Arc::new(config.identity.clone());

        Router::new()
            .route(
                "/api/chat/message",
                post(send_message).layer(DefaultBodyLimit::max(config.upstream.max_body_bytes)),
            )
            .route("/healthz", get(|| async { "ok" }))
            .merge(admin::router(dashboard_policy))
            .with_state(state)
            .layer(middleware::from_fn_with_state(identity, attach_identity))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The router, for driving the gateway without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until Ctrl+C/SIGTERM or `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            sources = self.config.status.sources.len(),
            "HTTP server starting"
        );

        let graceful = async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown triggered");
                }
            }
        };

        axum::serve(listener, self.router)
            .with_graceful_shutdown(graceful)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
