//! Error types for graph construction and selection
//!
//! Every mutation of a [`Graph`](super::Graph) either succeeds completely or
//! returns one of these errors and leaves the graph untouched.

use super::{OptionId, StepId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while building or querying a graph
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GraphError {
    /// The edit would make a step reachable from itself
    #[error("cycle detected: {path}")]
    CyclicGraph {
        /// Human-readable description of the offending edge
        path: String,
    },

    /// A declared parent does not exist in the graph
    #[error("parent '{parent}' of step '{step}' does not exist")]
    UnknownParent { step: StepId, parent: StepId },

    /// The option already exists and overwriting is disabled
    #[error("option '{option}' already defined for step '{step}' (overwrite disabled)")]
    DuplicateOption { step: StepId, option: OptionId },

    /// The step already exists and overwriting is disabled
    #[error("step '{step}' already defined (overwrite disabled)")]
    DuplicateStep { step: StepId },

    /// A filter, target or mutation named a step that does not exist
    #[error("unknown step '{step}'")]
    UnknownStep { step: StepId },

    /// A filter or mutation named an option the step does not define
    #[error("step '{step}' has no option '{option}'")]
    UnknownOption { step: StepId, option: OptionId },

    /// The reserved root label cannot be used as a user step
    #[error("'{step}' is reserved for the virtual root")]
    ReservedStep { step: StepId },

    /// A step on the requested chain has no options to choose from
    #[error("step '{step}' has no options")]
    NoOptions { step: StepId },

    /// Nothing to execute
    #[error("graph is empty - no steps defined")]
    EmptyGraph,
}

impl GraphError {
    /// Creates a cycle error describing the edge `parent -> step`
    pub fn cycle(parent: &StepId, step: &StepId) -> Self {
        Self::CyclicGraph {
            path: format!("making '{parent}' a parent of '{step}' closes a loop"),
        }
    }

    pub fn unknown_parent(step: StepId, parent: StepId) -> Self {
        Self::UnknownParent { step, parent }
    }

    pub fn duplicate_option(step: StepId, option: OptionId) -> Self {
        Self::DuplicateOption { step, option }
    }

    pub fn duplicate_step(step: StepId) -> Self {
        Self::DuplicateStep { step }
    }

    pub fn unknown_step(step: StepId) -> Self {
        Self::UnknownStep { step }
    }

    pub fn unknown_option(step: StepId, option: OptionId) -> Self {
        Self::UnknownOption { step, option }
    }

    pub fn reserved(step: StepId) -> Self {
        Self::ReservedStep { step }
    }

    pub fn no_options(step: StepId) -> Self {
        Self::NoOptions { step }
    }
}
