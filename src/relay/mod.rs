//! Streaming relay to the upstream inference service.
//!
//! # Data Flow
//! ```text
//! Authorized request
//!     → forwarder.rs (build upstream URI, one POST, bounded wait for the head)
//!     → upstream response head (status + headers forwarded as-is)
//!     → body.rs (frame-by-frame pass-through, deadline, failure signalling)
//!     → caller connection
//! ```
//!
//! # Design Decisions
//! - The request body is sent in full; the response body is never buffered
//! - Backpressure comes from the server polling the body only when the caller
//!   connection is writable; each poll pulls at most one upstream frame
//! - No retries: one inbound request is exactly one upstream call
//! - Dropping the body (caller gone) drops the upstream connection

pub mod body;
pub mod error;
pub mod forwarder;

pub use body::{RelayBody, StreamEnd, StreamEndHook};
pub use error::{RelayError, TimeoutPhase};
pub use forwarder::{is_valid_conversation_id, Relay, RelayRequest};
