//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned and propagated)
//!     → auth::identity (claim attached)
//!     → chat.rs (authorize, then relay) | admin (authorize, then dashboard)
//!     → Send to client (relayed bodies stream through unbuffered)
//! ```

pub mod chat;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
