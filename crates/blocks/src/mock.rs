//! `MockBlock`, a test double for `Block`.
//!
//! Useful in unit and integration tests where a real block implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Block, BlockError, BlockOutput, ExecutionEnvironment, Node, RunContext};

/// Behaviour injected into `MockBlock` at construction time.
pub enum MockBehaviour {
    /// Finish with the given outcome and result.
    Succeed { outcome: String, result: Value },
    /// Finish successfully and end the run with a return value.
    Return(Value),
    /// Fail, optionally with a specific failure outcome.
    Fail {
        outcome: Option<String>,
        message: String,
    },
    /// Fail with an unmanageable error.
    FailFatal(String),
}

/// A mock block that records every environment it receives and returns a
/// programmer-specified output.
pub struct MockBlock {
    /// Label used in messages and test assertions.
    pub name: String,
    /// What the block will do when `run` is called.
    pub behaviour: MockBehaviour,
    /// Simulated latency before the block completes.
    pub delay: Option<Duration>,
    /// All environments seen by this block (in call order).
    pub calls: Arc<Mutex<Vec<ExecutionEnvironment>>>,
}

impl MockBlock {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always succeeds with the given result.
    pub fn succeeding(name: impl Into<String>, result: Value) -> Self {
        Self::with_outcome(name, crate::OUTCOME_SUCCESS, result)
    }

    /// Create a mock that always finishes with `outcome`.
    pub fn with_outcome(
        name: impl Into<String>,
        outcome: impl Into<String>,
        result: Value,
    ) -> Self {
        Self::with_behaviour(
            name,
            MockBehaviour::Succeed {
                outcome: outcome.into(),
                result,
            },
        )
    }

    /// Create a mock that ends the run with `value`.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::Return(value))
    }

    /// Create a mock that always fails under the generic `"error"` outcome.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(
            name,
            MockBehaviour::Fail {
                outcome: None,
                message: msg.into(),
            },
        )
    }

    /// Create a mock that always fails under a specific `outcome`.
    pub fn failing_with_outcome(
        name: impl Into<String>,
        outcome: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::with_behaviour(
            name,
            MockBehaviour::Fail {
                outcome: Some(outcome.into()),
                message: msg.into(),
            },
        )
    }

    /// Create a mock that always fails with an unmanageable error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailFatal(msg.into()))
    }

    /// Sleep for `delay` before completing.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times this block has been run.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Environments received so far.
    pub fn seen(&self) -> Vec<ExecutionEnvironment> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Block for MockBlock {
    async fn run(
        &self,
        _node: &Node,
        env: &ExecutionEnvironment,
        _ctx: &RunContext,
    ) -> Result<BlockOutput, BlockError> {
        self.calls.lock().unwrap().push(env.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behaviour {
            MockBehaviour::Succeed { outcome, result } => Ok(BlockOutput::success(result.clone())
                .with_outcome(outcome.clone())
                .with_message(format!("{} finished", self.name))),
            MockBehaviour::Return(value) => Ok(BlockOutput::success(value.clone())
                .returning(value.clone())
                .with_message(format!("{} returned", self.name))),
            MockBehaviour::Fail { outcome, message } => Err(BlockError::Failed {
                outcome: outcome.clone(),
                message: message.clone(),
            }),
            MockBehaviour::FailFatal(msg) => Err(BlockError::Fatal(msg.clone())),
        }
    }
}
