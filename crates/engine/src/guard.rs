//! Recursion guard.
//!
//! Graphs may contain cycles on purpose, so there is no static acyclicity
//! check. Instead every attempt counts how often its node already occurs in
//! the lineage's call stack and is refused once that count reaches the
//! configured bound.

use blocks::{ExecutionEnvironment, Node};

use crate::EngineError;

/// Refuse to run `node` if it already occurs `limit` times in `env`'s call
/// stack. With the default limit of 32 a node runs at most 32 times along
/// one lineage.
pub fn check_call_depth(
    node: &Node,
    env: &ExecutionEnvironment,
    limit: usize,
) -> Result<usize, EngineError> {
    let depth = env.call_depth(&node.id);
    if depth >= limit {
        return Err(EngineError::RecursionLimit {
            node_id: node.id.clone(),
            depth,
            limit,
        });
    }
    Ok(depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with_stack(stack: &[&str]) -> ExecutionEnvironment {
        ExecutionEnvironment {
            call_stack: stack.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn below_limit_passes_with_depth() {
        let node = Node::new("a", "mock");
        let env = env_with_stack(&["a", "b", "a"]);
        assert_eq!(check_call_depth(&node, &env, 3).unwrap(), 2);
    }

    #[test]
    fn reaching_limit_is_refused() {
        let node = Node::new("a", "mock");
        let stack: Vec<&str> = std::iter::repeat("a").take(32).collect();
        let err = check_call_depth(&node, &env_with_stack(&stack), 32).unwrap_err();

        assert!(matches!(err, EngineError::RecursionLimit { depth: 32, limit: 32, .. }));
        assert!(err.to_string().contains("unintended cycle"));
        assert!(err.is_unmanageable());
    }
}
