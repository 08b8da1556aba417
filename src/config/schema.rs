//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::auth::{AccessPolicy, Role};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream inference service settings.
    pub upstream: UpstreamConfig,

    /// Where the identity claim is read from on inbound requests.
    pub identity: IdentityConfig,

    /// Access policies for the protected routes.
    pub routes: RoutePolicies,

    /// Status dashboard sources.
    pub status: StatusConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Upstream inference service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the inference service (e.g., "http://inference:8000").
    pub base_url: String,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Time allowed until the upstream response head arrives, in seconds.
    pub response_timeout_secs: u64,

    /// Total time allowed for a relayed exchange, streaming included, in seconds.
    pub stream_timeout_secs: u64,

    /// Maximum inbound request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout_ms: 2_000,
            response_timeout_secs: 30,
            stream_timeout_secs: 300,
            max_body_bytes: 256 * 1024,
        }
    }
}

/// Header names carrying the claim resolved by the authentication layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header holding the subject identifier.
    pub subject_header: String,

    /// Header holding the role.
    pub role_header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            subject_header: "x-auth-subject".to_string(),
            role_header: "x-auth-role".to_string(),
        }
    }
}

/// Access policy per protected route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutePolicies {
    /// Policy for `POST /api/chat/message`.
    pub chat: AccessPolicy,

    /// Policy for the `/admin/status` dashboard.
    pub dashboard: AccessPolicy,
}

impl Default for RoutePolicies {
    fn default() -> Self {
        Self {
            chat: AccessPolicy::deny([Role::Banned]),
            dashboard: AccessPolicy::allow([Role::Admin]),
        }
    }
}

/// How a status source payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Arbitrary JSON document shown as-is.
    #[default]
    Json,
    /// Tree manager statistics rendered as a keyed table.
    TreeManager,
}

/// One backend endpoint polled by the dashboard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Unique source identifier (dashboard key).
    pub id: String,

    /// Heading shown for the panel. Defaults to the URL path.
    #[serde(default)]
    pub title: Option<String>,

    /// Full URL of the JSON resource.
    pub url: String,

    /// Payload interpretation.
    #[serde(default)]
    pub kind: SourceKind,
}

impl SourceConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            title: None,
            url: url.into(),
            kind,
        }
    }
}

/// Status dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Per-source fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// API key sent as `X-API-Key` to the status endpoints.
    pub api_key: Option<String>,

    /// Sources in display order.
    pub sources: Vec<SourceConfig>,
}

impl Default for StatusConfig {
    fn default() -> Self {
        let backend = "http://localhost:8080/api/v1";
        Self {
            fetch_timeout_secs: 10,
            api_key: None,
            sources: vec![
                SourceConfig::new(
                    "tasks_availability",
                    format!("{backend}/tasks/availability"),
                    SourceKind::Json,
                ),
                SourceConfig::new("stats", format!("{backend}/stats/"), SourceKind::Json),
                SourceConfig::new(
                    "tree_manager",
                    format!("{backend}/stats/tree_manager"),
                    SourceKind::TreeManager,
                ),
            ],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter, overridden by `RUST_LOG`.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "chat_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
