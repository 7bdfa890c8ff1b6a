//! Blocks that only shuffle values: constants, sums and return values.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{Block, BlockError, BlockOutput, ExecutionEnvironment, Node, RunContext};

/// Emits `content.value` as its result.
pub struct ConstBlock;

impl ConstBlock {
    pub const TYPE: &'static str = "const";
}

#[async_trait]
impl Block for ConstBlock {
    async fn run(
        &self,
        node: &Node,
        _env: &ExecutionEnvironment,
        _ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let value = node.content.get("value").cloned().unwrap_or(Value::Null);
        Ok(BlockOutput::success(value))
    }
}

/// Sums numeric results of earlier nodes.
///
/// `content.inputs` lists the node ids to add; without it every numeric
/// entry of `results` is summed.
pub struct AddBlock;

impl AddBlock {
    pub const TYPE: &'static str = "add";
}

#[async_trait]
impl Block for AddBlock {
    async fn run(
        &self,
        node: &Node,
        env: &ExecutionEnvironment,
        _ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let operands: Vec<&Value> = match node.content.get("inputs").and_then(Value::as_array) {
            Some(ids) => {
                let mut operands = Vec::with_capacity(ids.len());
                for id in ids {
                    let id = id.as_str().ok_or_else(|| {
                        BlockError::Validation(format!("input ids must be strings, got {id}"))
                    })?;
                    let value = env.results.get(id).ok_or_else(|| {
                        BlockError::Validation(format!("no result available for '{id}'"))
                    })?;
                    if !value.is_number() {
                        return Err(BlockError::Validation(format!(
                            "result of '{id}' is not a number: {value}"
                        )));
                    }
                    operands.push(value);
                }
                operands
            }
            None => env.results.values().filter(|v| v.is_number()).collect(),
        };

        let sum = if operands.iter().all(|v| v.is_i64()) {
            let total = operands
                .iter()
                .filter_map(|v| v.as_i64())
                .try_fold(0i64, i64::checked_add)
                .ok_or_else(|| {
                    BlockError::Validation(format!("'{}': sum overflows", node.id))
                })?;
            json!(total)
        } else {
            json!(operands.iter().filter_map(|v| v.as_f64()).sum::<f64>())
        };

        Ok(BlockOutput::success(sum.clone()).with_message(format!("sum is {sum}")))
    }
}

/// Ends the run with `content.value`, or with the preceding result.
pub struct ReturnBlock;

impl ReturnBlock {
    pub const TYPE: &'static str = "return";
}

#[async_trait]
impl Block for ReturnBlock {
    async fn run(
        &self,
        node: &Node,
        env: &ExecutionEnvironment,
        _ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let value = node
            .content
            .get("value")
            .cloned()
            .unwrap_or_else(|| env.result.clone());
        Ok(BlockOutput::success(value.clone()).returning(value))
    }
}
