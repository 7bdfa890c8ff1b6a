//! Blocks that start nested runs: sub-flows and loops.
//!
//! Both push the calling node onto the environment's call stack before
//! handing it over, which is what lets the engine's depth guard see
//! recursion that spans nested runs.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{Block, BlockError, BlockOutput, ExecutionEnvironment, Node, RunContext};

/// Runs the branch starting at `content.start` (the node itself when
/// absent), optionally restricted to the edges labelled `content.out`. The
/// nested run's return value becomes this block's result.
pub struct RunBranchBlock;

impl RunBranchBlock {
    pub const TYPE: &'static str = "run_branch";
}

#[async_trait]
impl Block for RunBranchBlock {
    async fn run(
        &self,
        node: &Node,
        env: &ExecutionEnvironment,
        ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let start = node.content_str("start").unwrap_or(node.id.as_str());
        let out = node.content_str("out");

        let returned = ctx
            .runner
            .run_branch(start, out, env.entering(&node.id))
            .await?;

        let message = match &returned {
            Some(_) => format!("branch from '{start}' returned a value"),
            None => format!("branch from '{start}' finished without a value"),
        };
        Ok(BlockOutput::success(returned.unwrap_or(Value::Null)).with_message(message))
    }
}

/// Runs the branch behind this node's `content.body_out` edge (default
/// `"each"`) once per item, concurrently, and collects the results in item
/// order.
///
/// Items come from `content.items`, or from the preceding result when that
/// is an array. Each nested environment gains `item` and `index` keys.
pub struct LoopBlock;

impl LoopBlock {
    pub const TYPE: &'static str = "loop";
    pub const DEFAULT_BODY_OUT: &'static str = "each";
}

#[async_trait]
impl Block for LoopBlock {
    async fn run(
        &self,
        node: &Node,
        env: &ExecutionEnvironment,
        ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let items = node
            .content
            .get("items")
            .and_then(Value::as_array)
            .or_else(|| env.result.as_array())
            .ok_or_else(|| {
                BlockError::Validation(format!("'{}' has no items to loop over", node.id))
            })?;
        let body_out = node.content_str("body_out").unwrap_or(Self::DEFAULT_BODY_OUT);

        let base = env.entering(&node.id);
        let envs = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                base.clone()
                    .with_var("item", item.clone())
                    .with_var("index", json!(index))
            })
            .collect();

        let results = ctx
            .runner
            .run_branch_pool(&node.id, Some(body_out), envs)
            .await?;
        let count = results.len();
        let collected: Vec<Value> = results
            .into_iter()
            .map(|result| result.unwrap_or(Value::Null))
            .collect();

        Ok(BlockOutput::success(Value::Array(collected))
            .with_message(format!("{count} iterations")))
    }
}
