//! Hodos: exhaustive execution of pipelines with interchangeable steps
//!
//! `hodos` (ὁδός, Greek for "path" or "way") runs a DAG of steps where each
//! step offers several interchangeable options. Every combination of
//! options is a path; a call enumerates the paths selected by include and
//! exclude filters and evaluates them, caching each step's value under a
//! key derived from the options on its ancestry so that paths sharing a
//! prefix share its work.
//!
//! # Features
//!
//! - **Option graphs**: steps with multiple options, default and latest tracking
//! - **Filter pushdown**: include/exclude filters prune the path space while enumerating
//! - **Structural caching**: values keyed by their lineage, in memory or on disk
//! - **Strategies**: depth-first, breadth-first, or cache-only evaluation
//! - **Locking**: concurrent workers compute each shared key once
//! - **Sessions**: repeated, incremental calls against an evolving graph
//!
//! # Quick Start
//!
//! ```
//! use hodos::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph: Graph<String> = Graph::new();
//! graph.add_option("clean", "trim", |v: &[String]| Ok::<_, String>(v[0].trim().to_string()))?;
//! graph.add_option("clean", "upper", |v: &[String]| Ok::<_, String>(v[0].to_uppercase()))?;
//! graph.add_noop_option("report", "as_is")?;
//!
//! let mut session = Session::new(graph).process("  hodos ".to_string());
//! let results = session.execute(ExecuteOptions::new().all()).await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`]: serialization, value bounds and backoff primitives
//! - [`graph`]: steps, options, paths and cache keys
//! - [`filter`]: matchers, filters and path enumeration
//! - [`cache`]: the cache contract and its backends
//! - [`executor`]: evaluation strategies and results
//! - [`session`]: incremental execution against a shared graph
//! - [`config`]: TOML-loadable executor and session settings

pub mod cache;
pub mod config;
pub mod core;
pub mod executor;
pub mod filter;
pub mod graph;
pub mod session;

pub use cache::{
    Cache, CacheError, CacheReset, CacheRule, FileCache, InMemoryCache, Result as CacheResult,
    StepCache,
};
pub use config::{ConfigError, ExecutorConfig, FailurePolicy, SessionConfig, Strategy};
pub use core::{BoxError, Codec, CoreError, RetryPolicy, Value};
pub use executor::{
    ExecuteOptions, ExecutionError, ExecutionStats, Executor, Inputs, Outputs, Record,
    Result as ExecutionResult, ResultSet, Squeezed,
};
pub use filter::{Assignment, Filter, Include, Matcher, OptionPin, Target};
pub use graph::{
    CacheKey, Graph, GraphError, GraphReport, GraphResult, Label, OptionId, Path, StepContext,
    StepId,
};
pub use session::{Session, SessionState, SharedGraph};

// Re-export dependencies used in public API
pub use serde;
pub use tokio;

/// Prelude module for convenient glob imports
///
/// ```
/// use hodos::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{Cache, CacheReset, CacheRule, FileCache, InMemoryCache, StepCache};
    pub use crate::config::{ExecutorConfig, FailurePolicy, SessionConfig, Strategy};
    pub use crate::executor::{
        ExecuteOptions, ExecutionError, Executor, Inputs, Record, ResultSet, Squeezed,
    };
    pub use crate::filter::{Assignment, Filter, Include, Matcher, OptionPin, Target};
    pub use crate::graph::{Graph, GraphError, OptionId, Path, StepContext, StepId};
    pub use crate::session::Session;

    pub use serde::{Deserialize, Serialize};
    pub use std::sync::Arc;
}
