//! Pooled runs: the same blueprint or branch once per input environment.
//!
//! Every entry is an independent run with its own run id, ledger and
//! in-degree state; one entry failing does not affect the others. All
//! entries are awaited and results come back in input order. Block
//! execution inside the entries draws from the engine's shared worker pool.

use std::collections::HashMap;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use blocks::ExecutionEnvironment;

use crate::executor::{Engine, RunResult};
use crate::EngineError;

impl Engine {
    /// Run the blueprint rooted at `root_node_id` once per environment.
    pub async fn run_blueprint_pool(
        &self,
        root_node_id: &str,
        envs: Vec<ExecutionEnvironment>,
    ) -> Vec<RunResult> {
        self.run_pool(root_node_id, None, true, envs).await
    }

    /// Run the branch behind `start_node_id`'s `branch_out_id` edges (or the
    /// whole branch from it when `None`) once per environment.
    pub async fn run_branch_pool(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        envs: Vec<ExecutionEnvironment>,
    ) -> Vec<RunResult> {
        self.run_pool(start_node_id, branch_out_id, false, envs).await
    }

    async fn run_pool(
        &self,
        start_node_id: &str,
        branch_out_id: Option<&str>,
        whole_blueprint: bool,
        envs: Vec<ExecutionEnvironment>,
    ) -> Vec<RunResult> {
        let total = envs.len();
        debug!(start_node_id, entries = total, "starting pooled runs");

        let mut join_set: JoinSet<RunResult> = JoinSet::new();
        let mut slots: HashMap<tokio::task::Id, usize> = HashMap::with_capacity(total);

        for (index, env) in envs.into_iter().enumerate() {
            let engine = self.clone();
            let start = start_node_id.to_owned();
            let out = branch_out_id.map(str::to_owned);

            let handle = join_set.spawn(async move {
                if whole_blueprint {
                    engine.run_blueprint(&start, env).await
                } else {
                    engine.run_branch(&start, out.as_deref(), env).await
                }
            });
            slots.insert(handle.id(), index);
        }

        // Every spawned entry reports exactly once below.
        let mut results: Vec<RunResult> = (0..total).map(|_| Ok(None)).collect();
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some(&index) = slots.get(&id) {
                        results[index] = result;
                    }
                }
                Err(err) => {
                    warn!("pooled run task failed: {err}");
                    if let Some(&index) = slots.get(&err.id()) {
                        results[index] = Err(EngineError::TaskJoin(err));
                    }
                }
            }
        }

        results
    }
}
