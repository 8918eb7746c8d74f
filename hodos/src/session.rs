//! Long-lived execution context for incremental development
//!
//! A [`Session`] binds a graph, an input and an executor. The graph stays
//! shared behind a lock, so options added or redefined between calls are
//! picked up by the next [`execute`](Session::execute) without rebuilding
//! anything, and values cached by earlier calls are reused.
//!
//! # Lifecycle
//!
//! ```text
//! Created --process()--> Configured --execute()--> Active
//! ```
//!
//! Executing before an input is bound fails with
//! [`ExecutionError::NotConfigured`].

use crate::cache::{CacheReset, CacheRule, InMemoryCache};
use crate::config::SessionConfig;
use crate::core::Value;
use crate::executor::{ExecuteOptions, ExecutionError, Executor, Inputs, ResultSet, Result, Squeezed};
use crate::graph::{Graph, OptionId, StepId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A graph shared between a session and the code that keeps editing it
pub type SharedGraph<T> = Arc<RwLock<Graph<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No input bound yet
    Created,
    /// Input and executor bound, nothing executed
    Configured,
    /// At least one call executed
    Active,
}

pub struct Session<T> {
    graph: SharedGraph<T>,
    input: Option<Inputs<T>>,
    executor: Option<Executor>,
    cache_include: Vec<CacheRule>,
    cache_exclude: Vec<CacheRule>,
    default_cache_reset: CacheReset,
    state: SessionState,
}

impl<T: Value> Session<T> {
    pub fn new(graph: Graph<T>) -> Self {
        Self::from_shared(Arc::new(RwLock::new(graph)))
    }

    pub fn from_shared(graph: SharedGraph<T>) -> Self {
        Self {
            graph,
            input: None,
            executor: None,
            cache_include: Vec::new(),
            cache_exclude: Vec::new(),
            default_cache_reset: CacheReset::None,
            state: SessionState::Created,
        }
    }

    /// Builds the executor (in-memory cache) and cache policy from `config`
    pub fn from_config(graph: Graph<T>, config: &SessionConfig) -> Self {
        let executor = Executor::with_cache(Arc::new(InMemoryCache::new()), config.executor.clone());
        let mut session = Self::new(graph).using(executor);
        session.cache_include = config.cache_rules();
        session.cache_exclude = config.cache_exclude_rules();
        session.default_cache_reset = config.default_cache_reset;
        session
    }

    /// Binds the input. Without an executor, a sequential depth-first
    /// executor over an in-memory cache is installed.
    pub fn process(mut self, input: impl Into<Inputs<T>>) -> Self {
        self.input = Some(input.into());
        if self.executor.is_none() {
            self.executor = Some(Executor::in_memory());
        }
        self.state = SessionState::Configured;
        self
    }

    pub fn using(mut self, executor: Executor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Reset used by calls that do not choose one
    pub fn with_cache_reset(mut self, reset: CacheReset) -> Self {
        self.default_cache_reset = reset;
        self
    }

    /// Makes a step cache-eligible in every call of this session
    pub fn with_cache_include(mut self, rule: CacheRule) -> Self {
        self.cache_include.push(rule);
        self
    }

    /// Keeps a step out of the cache in every call of this session
    pub fn with_cache_exclude(mut self, rule: CacheRule) -> Self {
        self.cache_exclude.push(rule);
        self
    }

    pub fn graph(&self) -> SharedGraph<T> {
        Arc::clone(&self.graph)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn executor(&self) -> Option<&Executor> {
        self.executor.as_ref()
    }

    /// Edits the graph in place; the next call sees the change.
    pub async fn edit<R>(&self, edit: impl FnOnce(&mut Graph<T>) -> R) -> R {
        let mut graph = self.graph.write().await;
        edit(&mut graph)
    }

    /// Runs one call against the current graph.
    ///
    /// Session-level cache include and exclude rules are added to the
    /// call's own, and the session's default reset applies when the call
    /// sets none.
    pub async fn execute(&mut self, options: ExecuteOptions) -> Result<ResultSet<T>> {
        let (Some(input), Some(executor)) = (&self.input, &self.executor) else {
            return Err(ExecutionError::NotConfigured(
                "bind an input with process() before executing".to_string(),
            ));
        };

        let mut options = options;
        options.cache_include.extend(self.cache_include.iter().cloned());
        options.cache_exclude.extend(self.cache_exclude.iter().cloned());
        if options.cache_reset.is_none() {
            options.cache_reset = Some(self.default_cache_reset);
        }

        // Execute against a snapshot so the graph lock is not held while
        // transforms run
        let graph = self.graph.read().await.clone();
        debug!(steps = graph.len(), "session snapshot taken");
        let results = executor.execute(&graph, input, &options).await?;

        if self.state != SessionState::Active {
            info!("session active");
            self.state = SessionState::Active;
        }
        Ok(results)
    }

    pub async fn execute_squeezed(&mut self, options: ExecuteOptions) -> Result<Squeezed<T>> {
        self.execute(options).await?.squeeze()
    }

    /// Runs the chain ending at `step` with `option`, squeezed
    pub async fn execute_option(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
    ) -> Result<Squeezed<T>> {
        self.execute_squeezed(ExecuteOptions::for_option(step, option))
            .await
    }
}
