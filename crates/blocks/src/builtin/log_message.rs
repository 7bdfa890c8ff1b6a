//! Logging block.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::{Block, BlockError, BlockOutput, ExecutionEnvironment, Node, RunContext};

/// Writes `content.message` to the log and passes it on as its result.
pub struct LogMessageBlock;

impl LogMessageBlock {
    pub const TYPE: &'static str = "log_message";
}

#[async_trait]
impl Block for LogMessageBlock {
    async fn run(
        &self,
        node: &Node,
        _env: &ExecutionEnvironment,
        ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let message = node
            .content_str("message")
            .ok_or_else(|| BlockError::Validation(format!("'{}' has no message", node.id)))?;

        info!(run_id = %ctx.run_id, node_id = %node.id, "{message}");

        Ok(BlockOutput::success(Value::String(message.to_owned())).with_message(message))
    }
}
