//! Tree manager statistics.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Column headings of the message-count table, in row field order.
pub const COLUMNS: [&str; 7] = [
    "Message Tree ID",
    "State",
    "Depth",
    "Oldest",
    "Youngest",
    "Count",
    "Goal Tree Size",
];

/// Per-tree message statistics as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageTreeCount {
    pub message_tree_id: String,
    pub state: String,
    pub depth: u64,
    pub oldest: String,
    pub youngest: String,
    pub count: u64,
    pub goal_tree_size: u64,
}

#[derive(Debug, Deserialize)]
struct TreeManagerStats {
    state_counts: serde_json::Value,
    message_counts: Vec<MessageTreeCount>,
}

/// Tree manager payload prepared for display.
///
/// Rows are keyed by `message_tree_id` and keep the payload's order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeManagerTable {
    pub state_counts: serde_json::Value,
    pub columns: [&'static str; 7],
    pub rows: Vec<MessageTreeCount>,
}

impl TreeManagerTable {
    /// Decode a tree manager payload. Duplicate tree ids are rejected since
    /// they cannot key distinct rows.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        let stats: TreeManagerStats = serde_json::from_value(value).map_err(|e| e.to_string())?;

        let mut seen = HashSet::with_capacity(stats.message_counts.len());
        for row in &stats.message_counts {
            if !seen.insert(row.message_tree_id.as_str()) {
                return Err(format!("duplicate message_tree_id '{}'", row.message_tree_id));
            }
        }

        Ok(Self {
            state_counts: stats.state_counts,
            columns: COLUMNS,
            rows: stats.message_counts,
        })
    }

    /// Row keys in display order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.message_tree_id.as_str())
    }
}
