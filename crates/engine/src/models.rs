//! Blueprints and the graph source the engine reads them from.
//!
//! The engine does not own graph storage. A [`GraphSource`] hands it the
//! blueprint containing a given node; [`InMemoryGraphSource`] is the
//! embedded implementation used by callers without a store of their own.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use blocks::Node;

use crate::EngineError;

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// A complete named graph of nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub key: String,
    pub title: String,
    pub nodes: Vec<Node>,
}

impl Blueprint {
    /// Build a blueprint, rejecting duplicate node ids.
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        nodes: Vec<Node>,
    ) -> Result<Self, EngineError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(EngineError::DuplicateNodeId(node.id.clone()));
            }
        }

        Ok(Self {
            key: key.into(),
            title: title.into(),
            nodes,
        })
    }
}

// ---------------------------------------------------------------------------
// GraphSource
// ---------------------------------------------------------------------------

/// Read access to stored blueprints.
pub trait GraphSource: Send + Sync {
    /// The blueprint that contains `node_id`, if any.
    fn blueprint_for(&self, node_id: &str) -> Option<Arc<Blueprint>>;
}

/// Thread-safe, in-process blueprint store indexed by node id.
#[derive(Clone, Default)]
pub struct InMemoryGraphSource {
    inner: Arc<RwLock<Index>>,
}

#[derive(Default)]
struct Index {
    blueprints: HashMap<String, Arc<Blueprint>>,
    by_node: HashMap<String, String>,
}

impl InMemoryGraphSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `blueprint`, replacing any earlier blueprint with the same key.
    pub fn insert(&self, blueprint: Blueprint) {
        let mut index = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = index.blueprints.remove(&blueprint.key) {
            for node in &previous.nodes {
                index.by_node.remove(&node.id);
            }
        }
        for node in &blueprint.nodes {
            index.by_node.insert(node.id.clone(), blueprint.key.clone());
        }
        index
            .blueprints
            .insert(blueprint.key.clone(), Arc::new(blueprint));
    }

    pub fn get(&self, key: &str) -> Option<Arc<Blueprint>> {
        let index = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        index.blueprints.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(guard) => guard.blueprints.len(),
            Err(poisoned) => poisoned.into_inner().blueprints.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GraphSource for InMemoryGraphSource {
    fn blueprint_for(&self, node_id: &str) -> Option<Arc<Blueprint>> {
        let index = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = index.by_node.get(node_id)?;
        index.blueprints.get(key).cloned()
    }
}

impl std::fmt::Debug for InMemoryGraphSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryGraphSource")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_node_id_is_rejected() {
        let nodes = vec![Node::new("a", "const"), Node::new("a", "add")];
        let result = Blueprint::new("bp", "test", nodes);
        assert!(matches!(result, Err(EngineError::DuplicateNodeId(id)) if id == "a"));
    }

    #[test]
    fn lookup_by_any_member_node() {
        let source = InMemoryGraphSource::new();
        let nodes = vec![Node::new("a", "const"), Node::new("b", "const")];
        let bp = Blueprint::new("bp", "Orders", nodes).expect("valid blueprint");
        source.insert(bp);

        assert_eq!(source.blueprint_for("b").map(|bp| bp.title.clone()), Some("Orders".into()));
        assert!(source.blueprint_for("ghost").is_none());
    }

    #[test]
    fn reinserting_a_key_drops_stale_nodes() {
        let source = InMemoryGraphSource::new();
        source.insert(Blueprint::new("bp", "v1", vec![Node::new("old", "const")]).unwrap());
        source.insert(Blueprint::new("bp", "v2", vec![Node::new("new", "const")]).unwrap());

        assert_eq!(source.len(), 1);
        assert!(source.blueprint_for("old").is_none());
        assert_eq!(source.get("bp").unwrap().title, "v2");
    }
}
