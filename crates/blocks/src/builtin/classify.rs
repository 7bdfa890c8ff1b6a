//! Keyword classifier with data-dependent outcomes.

use async_trait::async_trait;
use serde_json::Value;

use crate::{Block, BlockError, BlockOutput, ExecutionEnvironment, Node, RunContext};

/// Prefix of every outcome this block produces.
pub const CATEGORY_PREFIX: &str = "category_";

/// Routes on the preceding result.
///
/// `content.categories` maps a label to a list of keywords; the first label
/// (in key order) with a keyword found in the text, case-insensitively,
/// wins. `content.default` names the label used when nothing matches. The
/// outcome is `category_<label>`.
pub struct ClassifyBlock;

impl ClassifyBlock {
    pub const TYPE: &'static str = "classify";
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}

#[async_trait]
impl Block for ClassifyBlock {
    async fn run(
        &self,
        node: &Node,
        env: &ExecutionEnvironment,
        _ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        let text = text_of(&env.result);

        let matched = node
            .content
            .get("categories")
            .and_then(Value::as_object)
            .and_then(|categories| {
                categories.iter().find_map(|(label, keywords)| {
                    let keywords = keywords.as_array()?;
                    keywords
                        .iter()
                        .filter_map(Value::as_str)
                        .any(|keyword| text.contains(&keyword.to_lowercase()))
                        .then(|| label.clone())
                })
            });

        let label = match matched.or_else(|| node.content_str("default").map(str::to_owned)) {
            Some(label) => label,
            None => {
                return Err(BlockError::Validation(format!(
                    "'{}' matched no category and has no default",
                    node.id
                )))
            }
        };

        Ok(BlockOutput::success(Value::String(label.clone()))
            .with_outcome(format!("{CATEGORY_PREFIX}{label}"))
            .with_message(format!("classified as '{label}'")))
    }
}
