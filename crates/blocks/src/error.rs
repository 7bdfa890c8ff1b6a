//! Block-level error type.

use thiserror::Error;

use crate::OUTCOME_ERROR;

/// Errors returned by a block's `run` method.
///
/// The engine uses the variant to decide routing:
/// - `Validation`, `Failed`, `Other`: the instance is recorded with
///   [`BlockError::outcome`] and is routed to a matching outgoing edge when
///   the node declares one; otherwise the run is aborted.
/// - `Fatal`: never routed; the run is always aborted.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The node's configuration or input was rejected. The message is meant
    /// for humans and is recorded verbatim.
    #[error("{0}")]
    Validation(String),

    /// The block failed, optionally naming a more specific failure outcome
    /// than `"error"`.
    #[error("{message}")]
    Failed {
        outcome: Option<String>,
        message: String,
    },

    /// A failure that must abort the run even if an error edge exists.
    #[error("fatal block error: {0}")]
    Fatal(String),

    /// Anything else raised while the block ran.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlockError {
    /// Failure carrying a block-specific outcome id.
    pub fn with_outcome(outcome: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            outcome: Some(outcome.into()),
            message: message.into(),
        }
    }

    /// Failure recorded under the generic `"error"` outcome.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            outcome: None,
            message: message.into(),
        }
    }

    /// The outcome the failed instance is recorded with.
    pub fn outcome(&self) -> &str {
        match self {
            Self::Failed {
                outcome: Some(outcome),
                ..
            } => outcome,
            _ => OUTCOME_ERROR,
        }
    }

    /// Whether an error edge on the node may absorb this failure.
    pub fn is_manageable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_failures_use_error_outcome() {
        assert_eq!(BlockError::failed("nope").outcome(), "error");
        assert_eq!(BlockError::Validation("bad".into()).outcome(), "error");
        assert_eq!(BlockError::from(anyhow::anyhow!("io")).outcome(), "error");
    }

    #[test]
    fn specific_outcome_is_kept() {
        let err = BlockError::with_outcome("timeout", "took too long");
        assert_eq!(err.outcome(), "timeout");
        assert_eq!(err.to_string(), "took too long");
    }

    #[test]
    fn fatal_is_never_manageable() {
        assert!(!BlockError::Fatal("cycle".into()).is_manageable());
        assert!(BlockError::failed("x").is_manageable());
    }
}
