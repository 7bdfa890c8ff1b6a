//! Maps node `type` strings to block implementations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin;
use crate::Block;

/// Registry consulted by the engine each time a node becomes ready.
#[derive(Clone, Default)]
pub struct BlockRegistry {
    blocks: HashMap<String, Arc<dyn Block>>,
}

impl BlockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in block set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register `block` under `block_type`, replacing any previous entry.
    pub fn register(&mut self, block_type: impl Into<String>, block: Arc<dyn Block>) -> &mut Self {
        self.blocks.insert(block_type.into(), block);
        self
    }

    pub fn get(&self, block_type: &str) -> Option<Arc<dyn Block>> {
        self.blocks.get(block_type).cloned()
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.blocks.contains_key(block_type)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.blocks.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("BlockRegistry").field("types", &types).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBlock;

    #[test]
    fn builtins_are_registered() {
        let registry = BlockRegistry::with_builtins();
        let builtins = ["const", "add", "classify", "log_message", "return", "run_branch", "loop"];
        for block_type in builtins {
            assert!(registry.contains(block_type), "missing builtin '{block_type}'");
        }
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut registry = BlockRegistry::new();
        registry.register("x", Arc::new(MockBlock::succeeding("first", serde_json::json!(1))));
        registry.register("x", Arc::new(MockBlock::succeeding("second", serde_json::json!(2))));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("missing").is_none());
    }
}
