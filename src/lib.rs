//! Role-gated streaming gateway for a conversational-AI platform.
//!
//! Authorizes inbound requests against per-route role policies, relays chat
//! messages to the inference service with the reply streamed straight
//! through, and aggregates backend status endpoints into an admin dashboard.

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod status;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
