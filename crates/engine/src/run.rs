//! Per-run bookkeeping.
//!
//! A [`Run`] is owned by the task driving its completion loop and is never
//! shared with workers: workers hand back a [`UnitOutcome`] and the driver
//! folds it in. The [`RunLedger`] is append-only and keeps readiness order,
//! which is the order nodes appear in the audit trail.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use blocks::{Block, BlockError, BlockOutput, BlockRegistry, ExecutionEnvironment, Node};

use crate::audit::{summarize_for_log, NodeSummary};
use crate::graph::{fired_targets, in_degrees};
use crate::EngineError;

/// Outcome of a ledger entry whose node is ready but not yet submitted.
pub const OUTCOME_PENDING: &str = "pending";
/// Outcome of a ledger entry whose block is executing.
pub const OUTCOME_IN_PROGRESS: &str = "in_progress";

// ---------------------------------------------------------------------------
// BlockInstance
// ---------------------------------------------------------------------------

/// One execution of a node.
#[derive(Debug, Clone)]
pub struct BlockInstance {
    pub node: Node,
    pub outcome: String,
    pub message: String,
    pub result: Value,
    pub return_value: Option<Value>,
    pub environment: ExecutionEnvironment,
    pub execution_time_in_seconds: f64,
}

impl BlockInstance {
    fn pending(node: Node, environment: ExecutionEnvironment) -> Self {
        Self {
            node,
            outcome: OUTCOME_PENDING.to_owned(),
            message: String::new(),
            result: Value::Null,
            return_value: None,
            environment,
            execution_time_in_seconds: 0.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != OUTCOME_PENDING && self.outcome != OUTCOME_IN_PROGRESS
    }

    fn summary(&self) -> NodeSummary {
        NodeSummary {
            node_id: self.node.id.clone(),
            block_type: self.node.block_type.clone(),
            outcome: self.outcome.clone(),
            message: self.message.clone(),
            execution_time_in_seconds: self.execution_time_in_seconds,
            result: summarize_for_log(&self.result),
            return_value: self.return_value.as_ref().map(summarize_for_log),
        }
    }
}

// ---------------------------------------------------------------------------
// RunLedger
// ---------------------------------------------------------------------------

/// Insertion-ordered map from node id to its instance.
#[derive(Debug, Default)]
pub struct RunLedger {
    entries: Vec<BlockInstance>,
    index: HashMap<String, usize>,
}

impl RunLedger {
    /// Add `instance`, or replace the entry for the same node in place.
    pub fn admit(&mut self, instance: BlockInstance) {
        match self.index.get(&instance.node.id) {
            Some(&slot) => self.entries[slot] = instance,
            None => {
                self.index.insert(instance.node.id.clone(), self.entries.len());
                self.entries.push(instance);
            }
        }
    }

    pub fn get(&self, node_id: &str) -> Option<&BlockInstance> {
        self.index.get(node_id).map(|&slot| &self.entries[slot])
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut BlockInstance> {
        self.index.get(node_id).map(|&slot| &mut self.entries[slot])
    }

    /// Entries in readiness order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockInstance> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of every finished node's result.
    pub fn finished_results(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter(|instance| instance.is_finished())
            .map(|instance| (instance.node.id.clone(), instance.result.clone()))
            .collect()
    }

    pub fn summaries(&self) -> Vec<NodeSummary> {
        self.entries.iter().map(BlockInstance::summary).collect()
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// A node whose in-degree reached zero, with its resolved block.
pub struct Ready {
    pub node_id: String,
    pub block: Arc<dyn Block>,
}

/// What a worker reports back for one block execution.
#[derive(Debug)]
pub struct UnitOutcome {
    pub node_id: String,
    pub output: Result<BlockOutput, BlockError>,
    pub elapsed: Duration,
}

/// State of one engine run.
pub struct Run {
    pub run_id: String,
    pub title: String,
    nodes: Vec<Node>,
    by_id: HashMap<String, usize>,
    in_degree: HashMap<String, usize>,
    pub ledger: RunLedger,
    /// Node whose return value ended the run, if any.
    pub returned_by: Option<String>,
}

impl Run {
    pub fn new(run_id: String, title: impl Into<String>, nodes: Vec<Node>) -> Self {
        let in_degree = in_degrees(&nodes);
        let by_id = nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id.clone(), slot))
            .collect();

        Self {
            run_id,
            title: title.into(),
            nodes,
            by_id,
            in_degree,
            ledger: RunLedger::default(),
            returned_by: None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Schedule every node without incoming edges, in node order.
    pub fn seed(
        &mut self,
        env: &ExecutionEnvironment,
        registry: &BlockRegistry,
    ) -> Result<Vec<Ready>, EngineError> {
        let roots: Vec<String> = self
            .nodes
            .iter()
            .filter(|node| self.in_degree.get(&node.id).copied().unwrap_or(0) == 0)
            .map(|node| node.id.clone())
            .collect();

        roots
            .into_iter()
            .map(|node_id| self.schedule(&node_id, env.clone(), registry))
            .collect()
    }

    /// Resolve the node's block and admit a pending ledger entry for it.
    fn schedule(
        &mut self,
        node_id: &str,
        env: ExecutionEnvironment,
        registry: &BlockRegistry,
    ) -> Result<Ready, EngineError> {
        let node = self.by_id.get(node_id).map(|&slot| self.nodes[slot].clone());
        let Some(node) = node else {
            return Err(EngineError::NodeNotFound(node_id.to_owned()));
        };

        let block = registry
            .get(&node.block_type)
            .ok_or_else(|| EngineError::UnknownBlockType {
                node_id: node.id.clone(),
                block_type: node.block_type.clone(),
            })?;

        self.ledger.admit(BlockInstance::pending(node, env));
        Ok(Ready {
            node_id: node_id.to_owned(),
            block,
        })
    }

    /// Fold a worker's report into the ledger.
    ///
    /// Returns the return value that ends the run, if the block set one. A
    /// failure is kept as an ordinary completion when the node has an edge
    /// for its outcome and the error is manageable; otherwise it is fatal.
    pub fn complete(&mut self, unit: UnitOutcome) -> Result<Option<Value>, EngineError> {
        let Some(instance) = self.ledger.get_mut(&unit.node_id) else {
            warn!(node_id = %unit.node_id, "completion for a node that was never scheduled");
            return Ok(None);
        };
        instance.execution_time_in_seconds = unit.elapsed.as_secs_f64();

        match unit.output {
            Ok(output) => {
                instance.outcome = output.outcome;
                instance.result = output.result;
                instance.message = output.message;
                instance.return_value = output.return_value.filter(|value| !value.is_null());
                if instance.return_value.is_some() {
                    self.returned_by = Some(unit.node_id.clone());
                }
                Ok(instance.return_value.clone())
            }
            Err(err) => {
                instance.outcome = err.outcome().to_owned();
                instance.message = err.to_string();
                instance.result = Value::Null;

                if !err.is_manageable() {
                    return Err(EngineError::Unmanageable {
                        node_id: unit.node_id,
                        message: instance.message.clone(),
                    });
                }
                if !instance.node.is_outcome_managed(&instance.outcome) {
                    return Err(EngineError::BlockFailed {
                        node_id: unit.node_id,
                        outcome: instance.outcome.clone(),
                        message: instance.message.clone(),
                    });
                }

                warn!(
                    node_id = %unit.node_id,
                    outcome = %instance.outcome,
                    "block failed, routing to its '{}' edge: {}",
                    instance.outcome,
                    instance.message
                );
                Ok(None)
            }
        }
    }

    /// Fire the finished node's edges matching its outcome and schedule
    /// every target whose in-degree drops to zero.
    pub fn advance(
        &mut self,
        node_id: &str,
        registry: &BlockRegistry,
    ) -> Result<Vec<Ready>, EngineError> {
        let Some(source) = self.ledger.get(node_id) else {
            return Ok(Vec::new());
        };
        let node = source.node.clone();
        let outcome = source.outcome.clone();
        let result = source.result.clone();
        let source_env = source.environment.clone();

        let finished = self.ledger.finished_results();
        let mut newly_ready = Vec::new();

        for target in fired_targets(&node, &outcome) {
            let Some(degree) = self.in_degree.get_mut(target) else {
                debug!(node_id, target, "edge points outside this run, skipped");
                continue;
            };
            if *degree == 0 {
                continue;
            }
            *degree -= 1;
            if *degree == 0 {
                let env = source_env.descend(node_id, result.clone(), &finished);
                newly_ready.push(self.schedule(target, env, registry)?);
            }
        }

        Ok(newly_ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks::mock::MockBlock;
    use serde_json::json;

    fn registry() -> BlockRegistry {
        let mut registry = BlockRegistry::new();
        registry.register("mock", Arc::new(MockBlock::succeeding("m", json!(1))));
        registry
    }

    fn unit(node_id: &str, output: Result<BlockOutput, BlockError>) -> UnitOutcome {
        UnitOutcome {
            node_id: node_id.to_owned(),
            output,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn ledger_keeps_insertion_order_on_replace() {
        let mut ledger = RunLedger::default();
        let env = ExecutionEnvironment::new();
        ledger.admit(BlockInstance::pending(Node::new("b", "mock"), env.clone()));
        ledger.admit(BlockInstance::pending(Node::new("a", "mock"), env.clone()));
        let mut replaced = BlockInstance::pending(Node::new("b", "mock"), env);
        replaced.outcome = "success".into();
        ledger.admit(replaced);

        let order: Vec<&str> = ledger.iter().map(|i| i.node.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert_eq!(ledger.finished_results().len(), 1);
    }

    #[test]
    fn join_waits_for_both_predecessors() {
        let nodes = vec![
            Node::new("a", "mock").out("success", "c"),
            Node::new("b", "mock").out("success", "c"),
            Node::new("c", "mock"),
        ];
        let registry = registry();
        let mut run = Run::new("r".into(), "t", nodes);

        let seeds = run.seed(&ExecutionEnvironment::new(), &registry).unwrap();
        assert_eq!(seeds.iter().map(|r| r.node_id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        run.complete(unit("a", Ok(BlockOutput::success(json!(5))))).unwrap();
        assert!(run.advance("a", &registry).unwrap().is_empty());

        run.complete(unit("b", Ok(BlockOutput::success(json!(7))))).unwrap();
        let ready = run.advance("b", &registry).unwrap();
        assert_eq!(ready.len(), 1);

        let c = run.ledger.get("c").unwrap();
        assert_eq!(c.outcome, OUTCOME_PENDING);
        assert_eq!(c.environment.results["a"], json!(5));
        assert_eq!(c.environment.results["b"], json!(7));
        assert_eq!(c.environment.call_stack, vec!["b"]);
    }

    #[test]
    fn unmanaged_failure_is_fatal_and_managed_is_not() {
        let nodes = vec![
            Node::new("handled", "mock").out("error", "x"),
            Node::new("unhandled", "mock").out("success", "x"),
            Node::new("x", "mock"),
        ];
        let registry = registry();
        let mut run = Run::new("r".into(), "t", nodes);
        run.seed(&ExecutionEnvironment::new(), &registry).unwrap();

        assert!(run.complete(unit("handled", Err(BlockError::failed("boom")))).unwrap().is_none());
        assert_eq!(run.ledger.get("handled").unwrap().outcome, "error");

        let err = run
            .complete(unit("unhandled", Err(BlockError::failed("boom"))))
            .unwrap_err();
        assert!(matches!(err, EngineError::BlockFailed { node_id, .. } if node_id == "unhandled"));
    }

    #[test]
    fn fatal_block_error_ignores_error_edge() {
        let nodes = vec![Node::new("a", "mock").out("error", "b"), Node::new("b", "mock")];
        let registry = registry();
        let mut run = Run::new("r".into(), "t", nodes);
        run.seed(&ExecutionEnvironment::new(), &registry).unwrap();

        let err = run.complete(unit("a", Err(BlockError::Fatal("cycle".into())))).unwrap_err();
        assert!(matches!(err, EngineError::Unmanageable { .. }));
    }

    #[test]
    fn unknown_block_type_fails_scheduling() {
        let mut run = Run::new("r".into(), "t", vec![Node::new("a", "nope")]);
        let err = run.seed(&ExecutionEnvironment::new(), &registry()).err().unwrap();
        assert!(matches!(
            err,
            EngineError::UnknownBlockType { block_type, .. } if block_type == "nope"
        ));
    }
}
