//! Step graphs with interchangeable options
//!
//! This module provides the data model that execution runs over:
//!
//! - [`Graph`]: a DAG of [`Step`]s, each carrying one or more options
//! - [`Path`]: one option chosen for every step on a chain
//! - [`CacheKey`]: the structural identity of a step's value on a path
//! - [`GraphReport`]: text and DOT renderings of the structure
//!
//! # Design Principles
//!
//! The module hides how steps and edges are stored. Callers only see
//! abstract operations (add, insert, remove, merge, order, lineage) and
//! every failing mutation leaves the graph untouched.

mod error;
mod ident;
mod path;
mod report;
mod step;
mod step_graph;

pub use error::{GraphError, GraphResult};
pub use ident::{Label, OptionId, StepId, ROOT_LABEL};
pub use path::{CacheKey, Path};
pub use report::{GraphReport, StepReport, StepRole};
pub use step::{Step, StepContext, StepOption};
pub use step_graph::Graph;
