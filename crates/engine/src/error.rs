//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the engine. Any of these aborts the run it occurs in;
/// the caller receives no result.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Graph errors ------

    /// Two or more nodes in a blueprint share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// The graph source knows no blueprint containing this node.
    #[error("no blueprint contains node '{0}'")]
    NodeNotFound(String),

    // ------ Execution errors ------

    /// A node was scheduled whose `type` has no registered block.
    #[error("node '{node_id}' has unknown block type '{block_type}'")]
    UnknownBlockType {
        node_id: String,
        block_type: String,
    },

    /// The depth guard tripped.
    #[error(
        "node '{node_id}' recursed {depth} times in one lineage (limit {limit}); \
         an unintended cycle is suspected"
    )]
    RecursionLimit {
        node_id: String,
        depth: usize,
        limit: usize,
    },

    /// A block failed and its node has no edge for the failure outcome.
    #[error("node '{node_id}' failed with unhandled outcome '{outcome}': {message}")]
    BlockFailed {
        node_id: String,
        outcome: String,
        message: String,
    },

    /// A block raised an error that no edge may handle.
    #[error("node '{node_id}' failed fatally: {message}")]
    Unmanageable { node_id: String, message: String },

    // ------ Runtime errors ------

    /// The shared worker pool was closed.
    #[error("worker pool is closed")]
    WorkerPoolClosed,

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// Node the failure is attributed to, if any.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateNodeId(id) | Self::NodeNotFound(id) => Some(id),
            Self::UnknownBlockType { node_id, .. }
            | Self::RecursionLimit { node_id, .. }
            | Self::BlockFailed { node_id, .. }
            | Self::Unmanageable { node_id, .. } => Some(node_id),
            Self::WorkerPoolClosed | Self::TaskJoin(_) => None,
        }
    }

    /// Whether this failure must stay fatal when it surfaces through a
    /// nested run, i.e. whether the calling block may not route it to an
    /// error edge.
    pub fn is_unmanageable(&self) -> bool {
        matches!(self, Self::RecursionLimit { .. } | Self::Unmanageable { .. })
    }
}
