//! Graph data model shared by blocks and the engine.
//!
//! Nodes are defined by the graph store and are read-only while a run is in
//! progress. Both types round-trip through JSON with camelCase field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Out
// ---------------------------------------------------------------------------

/// Directed edge attached to its source node.
///
/// Fires only when the source instance finishes with `outcome_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Out {
    pub outcome_id: String,
    pub target_node_id: String,
}

impl Out {
    pub fn new(outcome_id: impl Into<String>, target_node_id: impl Into<String>) -> Self {
        Self {
            outcome_id: outcome_id.into(),
            target_node_id: target_node_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single position in a blueprint graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier within its blueprint (referenced by edges).
    pub id: String,
    /// Key into the block registry.
    #[serde(rename = "type")]
    pub block_type: String,
    /// Already-resolved configuration handed to the block.
    #[serde(default)]
    pub content: Value,
    /// Outgoing edges in authoring order.
    #[serde(default)]
    pub outs: Vec<Out>,
}

impl Node {
    /// Convenience constructor for testing.
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            content: Value::Null,
            outs: Vec::new(),
        }
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Append an edge firing on `outcome_id`.
    pub fn out(mut self, outcome_id: impl Into<String>, target: impl Into<String>) -> Self {
        self.outs.push(Out::new(outcome_id, target));
        self
    }

    /// Whether an outgoing edge is labelled `outcome`, i.e. a failure recorded
    /// under that outcome is handled by the graph itself.
    pub fn is_outcome_managed(&self, outcome: &str) -> bool {
        self.outs.iter().any(|out| out.outcome_id == outcome)
    }

    /// Edges that fire for `outcome`.
    pub fn outs_for<'a>(&'a self, outcome: &'a str) -> impl Iterator<Item = &'a Out> + 'a {
        self.outs.iter().filter(move |out| out.outcome_id == outcome)
    }

    /// String field of `content`, if present.
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }
}
