//! Join Evaluator
//!
//! Nested-loop equality join on field 0. Both inputs are fully materialized
//! and small, so every left row is compared against every right row with no
//! index. Output order is left-major, right-minor, each side in scan order.

use crate::parser::Row;
use serde::Serialize;
use tracing::debug;

/// One left row and one right row with equal keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinedRow {
    pub left: Row,
    pub right: Row,
}

impl JoinedRow {
    pub fn key(&self) -> &str {
        self.left.key().unwrap_or_default()
    }

    /// Left fields followed by right fields
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.left
            .fields()
            .iter()
            .chain(self.right.fields())
            .map(String::as_str)
    }
}

/// Keys are compared as raw text: `"007"` and `"7"` do not match.
pub fn nested_loop_join(left: &[Row], right: &[Row]) -> Vec<JoinedRow> {
    let mut joined = Vec::new();

    for l in left {
        // Rows without a key field are ill-formed; skip rather than fail
        let Some(left_key) = l.key() else { continue };
        for r in right {
            if r.key() == Some(left_key) {
                joined.push(JoinedRow {
                    left: l.clone(),
                    right: r.clone(),
                });
            }
        }
    }

    debug!(
        "Nested loop join: {} x {} -> {} rows",
        left.len(),
        right.len(),
        joined.len()
    );
    joined
}
