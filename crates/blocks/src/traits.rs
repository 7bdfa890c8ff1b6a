//! The `Block` trait: the contract every node implementation must fulfil.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{BlockError, ExecutionEnvironment, Node, OUTCOME_SUCCESS};

/// What a block reports once it has run successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutput {
    /// Label selecting which outgoing edges fire.
    pub outcome: String,
    /// Value made available to downstream nodes.
    pub result: Value,
    /// When set, the whole run ends immediately with this value.
    pub return_value: Option<Value>,
    /// Human-readable summary for the audit trail.
    pub message: String,
}

impl BlockOutput {
    /// `success` outcome carrying `result`.
    pub fn success(result: Value) -> Self {
        Self {
            outcome: OUTCOME_SUCCESS.to_owned(),
            result,
            return_value: None,
            message: String::new(),
        }
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// End the run with `value`.
    pub fn returning(mut self, value: Value) -> Self {
        self.return_value = Some(value);
        self
    }
}

/// Starts nested runs on behalf of a block (loops, sub-flows).
///
/// Implemented by the engine. The environment passed in should already carry
/// the calling node on its `call_stack` so recursion stays bounded.
#[async_trait]
pub trait BranchRunner: Send + Sync {
    /// Run the branch starting at `start_node_id`, optionally restricted to
    /// the edges labelled `branch_out_id`.
    async fn run_branch(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        env: ExecutionEnvironment,
    ) -> Result<Option<Value>, BlockError>;

    /// Run the same branch once per environment; results keep input order.
    async fn run_branch_pool(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        envs: Vec<ExecutionEnvironment>,
    ) -> Result<Vec<Option<Value>>, BlockError>;
}

/// Per-invocation context handed to every block alongside its environment.
#[derive(Clone)]
pub struct RunContext {
    /// Identifier of the run this invocation belongs to.
    pub run_id: String,
    /// Title of the blueprint being run.
    pub title: String,
    /// Entry point for nested runs.
    pub runner: Arc<dyn BranchRunner>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// The core block trait.
///
/// A block sets its outcome by returning: `Ok` with one of the node's edge
/// labels, or `Err` for a failure (see [`BlockError::outcome`]). Side effects
/// are entirely the block's business.
#[async_trait]
pub trait Block: Send + Sync {
    async fn run(
        &self,
        node: &Node,
        env: &ExecutionEnvironment,
        ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError>;
}
