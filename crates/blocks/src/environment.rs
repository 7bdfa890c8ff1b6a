//! The execution environment threaded from node to node.
//!
//! An environment is never mutated once a block has received it. Every
//! successor gets its own extended copy via [`ExecutionEnvironment::descend`],
//! so sibling branches cannot observe each other's later writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Context map handed to each block invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEnvironment {
    /// Node ids visited in this lineage, oldest first.
    #[serde(default)]
    pub call_stack: Vec<String>,
    /// Result of the immediately preceding node.
    #[serde(default)]
    pub result: Value,
    /// Result of every node finished so far, keyed by node id.
    #[serde(default)]
    pub results: BTreeMap<String, Value>,
    /// Caller-supplied keys.
    #[serde(flatten)]
    pub vars: Map<String, Value>,
}

impl ExecutionEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment seeded with caller-supplied keys.
    ///
    /// Reserved keys (`call_stack`, `result`, `results`) inside `vars` are
    /// lifted into their typed fields; a malformed reserved key is dropped.
    pub fn from_vars(mut vars: Map<String, Value>) -> Self {
        let mut env = Self::new();
        if let Some(stack) = vars.remove("call_stack") {
            env.call_stack = serde_json::from_value(stack).unwrap_or_default();
        }
        if let Some(result) = vars.remove("result") {
            env.result = result;
        }
        if let Some(results) = vars.remove("results") {
            env.results = serde_json::from_value(results).unwrap_or_default();
        }
        env.vars = vars;
        env
    }

    /// Set a caller key, returning the updated environment.
    pub fn with_var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Copy with `node_id` pushed onto the call stack, everything else kept.
    ///
    /// Used when a block hands its own environment to a nested run.
    pub fn entering(&self, node_id: &str) -> Self {
        let mut next = self.clone();
        next.call_stack.push(node_id.to_owned());
        next
    }

    /// Copy for the successor of `node_id`: the call stack grows by that
    /// node, `result` becomes its result and the `finished` snapshot is
    /// layered over the inherited `results`.
    pub fn descend(
        &self,
        node_id: &str,
        result: Value,
        finished: &BTreeMap<String, Value>,
    ) -> Self {
        let mut next = self.clone();
        next.call_stack.push(node_id.to_owned());
        next.result = result;
        next.results
            .extend(finished.iter().map(|(id, value)| (id.clone(), value.clone())));
        next
    }

    /// Merge `other` on top of `self`: caller keys and results are
    /// overlaid, the call stack and `result` are taken from `other` when it
    /// carries them.
    pub fn merge(&self, other: &ExecutionEnvironment) -> Self {
        let mut merged = self.clone();
        if !other.call_stack.is_empty() {
            merged.call_stack = other.call_stack.clone();
        }
        if !other.result.is_null() {
            merged.result = other.result.clone();
        }
        merged
            .results
            .extend(other.results.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
            .vars
            .extend(other.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Number of times `node_id` appears in this lineage.
    pub fn call_depth(&self, node_id: &str) -> usize {
        self.call_stack.iter().filter(|id| *id == node_id).count()
    }
}
