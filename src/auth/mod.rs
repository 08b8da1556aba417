//! Request authorization subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → identity.rs (resolve claim from trusted headers, once per request)
//!     → policy.rs (pure decision: claim × policy → Admit | Deny)
//!     → middleware.rs (invoke next step only on Admit)
//! ```
//!
//! # Design Decisions
//! - Claims are produced by an external authentication layer; this subsystem
//!   only decides over them
//! - Decisions are pure and never cached
//! - A denial is terminal and happens before any upstream I/O

pub mod identity;
pub mod middleware;
pub mod policy;

pub use identity::{IdentityClaim, Role};
pub use middleware::{guard, require_access};
pub use policy::{authorize, AccessPolicy, Decision, DenyReason};
