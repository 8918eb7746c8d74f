use crate::cache::CacheError;
use crate::graph::{GraphError, OptionId, Path, StepId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution layer error type.
///
/// Cloneable and serializable so that a failed path can carry its error in
/// a [`Record`](super::Record) next to the paths that succeeded. Cache and
/// serialization errors are flattened to strings; graph errors keep their
/// structure so callers can match on them.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The request does not fit the graph (unknown step, cycle, ...)
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// A user transform returned an error
    #[error("step '{step}' option '{option}' failed at {prefix}: {message}")]
    Transform {
        step: StepId,
        option: OptionId,
        /// Assignments up to and including the failing step
        prefix: Path,
        message: String,
    },

    /// An input step had no value in the supplied per-step inputs
    #[error("no input supplied for input step '{step}'")]
    MissingInput { step: StepId },

    /// A cache backend failed, including lock wait timeouts
    #[error("cache error: {0}")]
    Cache(String),

    /// A value could not be encoded or decoded
    #[error("core error: {0}")]
    Core(String),

    /// The cache-only strategy found no entry for a target
    #[error("no cached value for {key}")]
    NotCached { key: String },

    /// The session has no input or executor yet
    #[error("session not configured: {0}")]
    NotConfigured(String),

    /// The call exceeded the configured timeout
    #[error("execution timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The caller cancelled the call
    #[error("execution cancelled")]
    Cancelled,

    /// A blocking worker panicked while running a transform
    #[error("task panicked: {0}")]
    TaskPanic(String),
}

impl ExecutionError {
    pub(crate) fn transform(
        step: &StepId,
        option: &OptionId,
        prefix: Path,
        error: impl std::fmt::Display,
    ) -> Self {
        Self::Transform {
            step: step.clone(),
            option: option.clone(),
            prefix,
            message: error.to_string(),
        }
    }

    /// True for errors raised by a transform rather than by the engine
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }
}

// Manual From implementations to flatten nested errors to strings
impl From<CacheError> for ExecutionError {
    fn from(e: CacheError) -> Self {
        ExecutionError::Cache(e.to_string())
    }
}

impl From<crate::core::CoreError> for ExecutionError {
    fn from(e: crate::core::CoreError) -> Self {
        ExecutionError::Core(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ExecutionError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            ExecutionError::Cancelled
        } else {
            ExecutionError::TaskPanic(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
