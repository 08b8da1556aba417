//! Multi-source status aggregation.
//!
//! # Data Flow
//! ```text
//! DashboardView (one per render)
//!     → N concurrent StatusSourceClient::fetch calls (source.rs)
//!     → each outcome settles only its own key in DashboardState (view.rs)
//!     → panels emitted as each key resolves; unresolved keys stay Pending
//!
//! Tree manager payloads (tree.rs):
//!     { state_counts, message_counts[] } → keyed table, payload order kept
//! ```
//!
//! # Design Decisions
//! - One network call per source per view; later fetches hit the cell cache
//! - No retries; a failed source stays `Error` for the view's lifetime
//! - A source's failure never touches another source's state

pub mod source;
pub mod tree;
pub mod view;

pub use source::{SourceError, SourceOutcome, SourcePayload, StatusSourceClient};
pub use tree::{MessageTreeCount, TreeManagerTable};
pub use view::{DashboardState, DashboardView, Panel, SourceState};
