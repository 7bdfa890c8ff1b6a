//! Blueprint execution engine.
//!
//! `Engine` is the central orchestrator:
//! 1. Scopes a run to the nodes reachable from its start point.
//! 2. Seeds the ready queue with every node without incoming edges.
//! 3. Submits ready nodes to the shared bounded worker pool and waits for
//!    at least one to finish.
//! 4. Fires the finished node's edges matching its outcome, handing each
//!    target that becomes ready an extended copy of the environment.
//! 5. Stops on the first unmanaged failure (no result) or the first
//!    explicit return value (that value), otherwise drains and returns
//!    nothing.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, Instrument};

use blocks::{BlockError, BlockRegistry, BranchRunner, ExecutionEnvironment, Node, RunContext};

use crate::audit::{generate_run_id, AuditEntry, AuditEntryType, AuditSink, TracingAuditSink};
use crate::config::EngineConfig;
use crate::graph::filter_branch;
use crate::guard::check_call_depth;
use crate::models::{Blueprint, GraphSource};
use crate::run::{Ready, Run, UnitOutcome, OUTCOME_IN_PROGRESS};
use crate::EngineError;

/// What a run produces when it is not aborted: the explicit return value
/// of the node that ended it, or `None` when every reachable node finished.
pub type RunResult = Result<Option<Value>, EngineError>;

type UnitResult = Result<UnitOutcome, EngineError>;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cheaply cloneable handle; clones share the graph source, the registry,
/// the audit sink and the worker pool.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    graph: Arc<dyn GraphSource>,
    registry: BlockRegistry,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
    workers: Arc<Semaphore>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.inner.registry)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Assembles an [`Engine`].
pub struct EngineBuilder {
    graph: Arc<dyn GraphSource>,
    registry: BlockRegistry,
    audit: Arc<dyn AuditSink>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Builder over `graph` with the built-in blocks, a tracing audit sink
    /// and default configuration.
    pub fn new(graph: impl GraphSource + 'static) -> Self {
        Self {
            graph: Arc::new(graph),
            registry: BlockRegistry::with_builtins(),
            audit: Arc::new(TracingAuditSink),
            config: EngineConfig::default(),
        }
    }

    pub fn registry(mut self, registry: BlockRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Engine {
        let workers = Arc::new(Semaphore::new(self.config.worker_slots()));
        Engine {
            inner: Arc::new(EngineInner {
                graph: self.graph,
                registry: self.registry,
                audit: self.audit,
                config: self.config,
                workers,
            }),
        }
    }
}

impl Engine {
    pub fn builder(graph: impl GraphSource + 'static) -> EngineBuilder {
        EngineBuilder::new(graph)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn blueprint_for(&self, node_id: &str) -> Result<Arc<Blueprint>, EngineError> {
        self.inner
            .graph
            .blueprint_for(node_id)
            .ok_or_else(|| EngineError::NodeNotFound(node_id.to_owned()))
    }

    /// Run everything reachable from `root_node_id`, the root included.
    pub async fn run_blueprint(&self, root_node_id: &str, env: ExecutionEnvironment) -> RunResult {
        let blueprint = self.blueprint_for(root_node_id)?;
        let nodes = filter_branch(&blueprint.nodes, root_node_id, None);
        self.execute_dag(nodes, env, &blueprint.title).await
    }

    /// Run the branch starting at `start_node_id`. With `branch_out_id`
    /// the start node is skipped and only its edges with that label seed
    /// the branch.
    pub async fn run_branch(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        env: ExecutionEnvironment,
    ) -> RunResult {
        let blueprint = self.blueprint_for(start_node_id)?;
        let nodes = filter_branch(&blueprint.nodes, start_node_id, branch_out_id);
        self.execute_dag(nodes, env, &blueprint.title).await
    }

    /// Execute `nodes` as one run.
    ///
    /// # Errors
    /// Returns `EngineError` when the run is aborted: an unmanaged or fatal
    /// block failure, an unknown block type, a depth-guard violation, or a
    /// worker task that panicked.
    pub async fn execute_dag(
        &self,
        nodes: Vec<Node>,
        env: ExecutionEnvironment,
        title: &str,
    ) -> RunResult {
        let run_id = generate_run_id(&self.inner.config.session_id);
        let span = info_span!("run", run_id = %run_id, title = %title);
        let run = Run::new(run_id, title, nodes);
        self.execute_run(run, env).instrument(span).await
    }

    async fn execute_run(&self, mut run: Run, env: ExecutionEnvironment) -> RunResult {
        let started = Instant::now();
        let mut join_set: JoinSet<UnitResult> = JoinSet::new();

        let outcome = self.drive(&mut run, env, &mut join_set).await;

        if !join_set.is_empty() {
            debug!(in_flight = join_set.len(), "cancelling remaining units");
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
        }

        match &outcome {
            Ok(Some(_)) => info!(
                node_id = run.returned_by.as_deref().unwrap_or_default(),
                elapsed = ?started.elapsed(),
                "run returned early"
            ),
            Ok(None) => info!(
                executed = run.ledger.len(),
                elapsed = ?started.elapsed(),
                "run completed"
            ),
            Err(err) => error!(
                node_id = err.node_id().unwrap_or_default(),
                elapsed = ?started.elapsed(),
                "run aborted: {err}"
            ),
        }

        self.write_audit(&run, &outcome);
        outcome
    }

    async fn drive(
        &self,
        run: &mut Run,
        env: ExecutionEnvironment,
        join_set: &mut JoinSet<UnitResult>,
    ) -> RunResult {
        let registry = &self.inner.registry;

        let mut ready = run.seed(&env, registry)?;
        info!(nodes = run.node_count(), seeds = ready.len(), "run started");

        loop {
            for unit in ready.drain(..) {
                self.submit(run, unit, join_set)?;
            }

            let Some(first) = join_set.join_next().await else {
                break;
            };
            let mut batch = vec![first??];
            while let Some(next) = join_set.try_join_next() {
                batch.push(next??);
            }

            let batch_len = batch.len();
            for unit in batch {
                let node_id = unit.node_id.clone();
                if let Some(value) = run.complete(unit)? {
                    return Ok(Some(value));
                }
                ready.extend(run.advance(&node_id, registry)?);
            }

            debug!(
                completed = batch_len,
                ready = ready.len(),
                in_flight = join_set.len(),
                "batch processed"
            );
        }

        Ok(None)
    }

    /// Check the depth guard, mark the instance in progress and hand it to
    /// a worker.
    fn submit(
        &self,
        run: &mut Run,
        unit: Ready,
        join_set: &mut JoinSet<UnitResult>,
    ) -> Result<(), EngineError> {
        let Some(instance) = run.ledger.get_mut(&unit.node_id) else {
            return Err(EngineError::NodeNotFound(unit.node_id));
        };

        check_call_depth(&instance.node, &instance.environment, self.inner.config.max_call_depth)?;
        instance.outcome = OUTCOME_IN_PROGRESS.to_owned();

        let node = instance.node.clone();
        let env = instance.environment.clone();
        let run_id = run.run_id.clone();
        let title = run.title.clone();
        let engine = self.clone();
        let block = unit.block;

        debug!(node_id = %node.id, block_type = %node.block_type, "submitting");

        join_set.spawn(async move {
            let permit = engine
                .inner
                .workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::WorkerPoolClosed)?;

            let started = Instant::now();
            let runner = Arc::new(UnitRunner::new(engine, permit));
            let ctx = RunContext {
                run_id,
                title,
                runner,
            };
            let output = block.run(&node, &env, &ctx).await;

            Ok::<_, EngineError>(UnitOutcome {
                node_id: node.id,
                output,
                elapsed: started.elapsed(),
            })
        });

        Ok(())
    }

    fn write_audit(&self, run: &Run, outcome: &RunResult) {
        if !self.inner.config.audit_enabled {
            return;
        }

        let (entry_type, message) = match outcome {
            Ok(Some(_)) => (
                AuditEntryType::Info,
                format!(
                    "'{}' returned a value from node '{}'",
                    run.title,
                    run.returned_by.as_deref().unwrap_or_default()
                ),
            ),
            Ok(None) => (AuditEntryType::Info, format!("'{}' completed", run.title)),
            Err(err) => (AuditEntryType::Error, err.to_string()),
        };

        self.inner.audit.record(AuditEntry {
            title: run.title.clone(),
            entry_type,
            message,
            run_id: run.run_id.clone(),
            nodes: run.ledger.summaries(),
            recorded_at: Utc::now(),
        });
    }
}

// ---------------------------------------------------------------------------
// Nested runs
// ---------------------------------------------------------------------------

/// [`BranchRunner`] handed to one executing block.
///
/// Holds that block's worker permit and gives it back while a nested run is
/// in progress, so nested runs can never starve the pool they draw from.
struct UnitRunner {
    engine: Engine,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl UnitRunner {
    fn new(engine: Engine, permit: OwnedSemaphorePermit) -> Self {
        Self {
            engine,
            permit: Mutex::new(Some(permit)),
        }
    }

    async fn release(&self) {
        self.permit.lock().await.take();
    }

    async fn reacquire(&self) -> Result<(), BlockError> {
        let permit = self
            .engine
            .inner
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BlockError::Fatal(EngineError::WorkerPoolClosed.to_string()))?;
        *self.permit.lock().await = Some(permit);
        Ok(())
    }
}

/// Failures of a nested run surface as failures of the calling block.
/// Depth-guard and fatal failures stay unmanageable all the way up.
fn nested_failure(err: EngineError) -> BlockError {
    if err.is_unmanageable() {
        BlockError::Fatal(err.to_string())
    } else {
        BlockError::failed(err.to_string())
    }
}

#[async_trait]
impl BranchRunner for UnitRunner {
    async fn run_branch(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        env: ExecutionEnvironment,
    ) -> Result<Option<Value>, BlockError> {
        self.release().await;
        let outcome = self.engine.run_branch(start_node_id, branch_out_id, env).await;
        self.reacquire().await?;
        outcome.map_err(nested_failure)
    }

    async fn run_branch_pool(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        envs: Vec<ExecutionEnvironment>,
    ) -> Result<Vec<Option<Value>>, BlockError> {
        self.release().await;
        let outcomes = self
            .engine
            .run_branch_pool(start_node_id, branch_out_id, envs)
            .await;
        self.reacquire().await?;
        outcomes
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(nested_failure)
    }
}
