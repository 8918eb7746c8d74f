//! Execution of selected paths
//!
//! An [`Executor`] turns one request ([`ExecuteOptions`]) into a
//! [`ResultSet`]: it resolves the paths, then evaluates them with the
//! configured [`Strategy`], reading and writing the cache along the way.
//!
//! Module organization:
//! - plan / context: what a call needs to know, and what it shares between paths
//! - depth_first / breadth_first / cache_only: the evaluation strategies
//! - lock: per-key compute locks for concurrent workers

mod breadth_first;
mod cache_only;
mod context;
mod depth_first;
mod error;
mod inputs;
mod lock;
mod options;
mod plan;
mod result;

pub use error::{ExecutionError, Result};
pub use inputs::Inputs;
pub use options::ExecuteOptions;
pub use result::{ExecutionStats, Outputs, Record, ResultSet, Squeezed};

use crate::cache::{Cache, Eligibility, InMemoryCache};
use crate::config::{ExecutorConfig, Strategy};
use crate::core::Value;
use crate::filter::select;
use crate::graph::{CacheKey, Graph, OptionId, Path, StepId};
use context::RunContext;
use plan::Plan;
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

/// Evaluates paths of a graph against an optional cache.
///
/// Cloning is cheap; clones share the cache.
///
/// ```
/// use hodos::{ExecuteOptions, Executor, Graph, Inputs};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut graph: Graph<i64> = Graph::new();
/// graph.add_option("double", "x2", |inputs: &[i64]| Ok::<_, String>(inputs[0] * 2))?;
///
/// let executor = Executor::in_memory();
/// let results = executor.execute(&graph, &Inputs::from(21), &ExecuteOptions::new()).await?;
/// assert_eq!(results.squeeze()?.into_value(), Some(42));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Executor {
    cache: Option<Arc<dyn Cache>>,
    config: ExecutorConfig,
}

impl Executor {
    /// An executor without a cache; every value is computed.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            cache: None,
            config,
        }
    }

    pub fn with_cache(cache: Arc<dyn Cache>, config: ExecutorConfig) -> Self {
        Self {
            cache: Some(cache),
            config,
        }
    }

    /// Depth-first, sequential, backed by a fresh [`InMemoryCache`]
    pub fn in_memory() -> Self {
        Self::with_cache(Arc::new(InMemoryCache::new()), ExecutorConfig::default())
    }

    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs every path selected by `options`.
    ///
    /// With [`FailurePolicy::FailFast`](crate::config::FailurePolicy) the
    /// first path error aborts the call. Otherwise failed paths carry their
    /// error in their [`Record`]. A selection matching no path returns an
    /// empty result set.
    pub async fn execute<T: Value>(
        &self,
        graph: &Graph<T>,
        inputs: &Inputs<T>,
        options: &ExecuteOptions,
    ) -> Result<ResultSet<T>> {
        self.config
            .validate()
            .map_err(|e| ExecutionError::NotConfigured(e.to_string()))?;
        if self.config.strategy == Strategy::CacheOnly && self.cache.is_none() {
            return Err(ExecutionError::NotConfigured(
                "the cache-only strategy needs a cache".to_string(),
            ));
        }

        let span = info_span!("execute", strategy = ?self.config.strategy);
        async move {
            let selection = select(
                graph,
                &options.target,
                &options.option,
                &options.include,
                options.exclude.as_ref(),
            )?;
            let plan = Plan::new(graph, inputs, &selection)?;
            let eligibility = Eligibility::new(
                selection.targets.iter().cloned(),
                options.cache_include.clone(),
                options.cache_reset.unwrap_or_default(),
            )
            .excluding(options.cache_exclude.clone());
            let ctx = RunContext::new(self.cache.clone(), &self.config, eligibility);

            info!(paths = selection.paths.len(), targets = ?selection.targets, "executing");
            let outcomes = self.guarded(&plan, &ctx, &selection.paths, options).await?;

            let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
            let stats = ctx.stats(selection.paths.len(), failed);
            info!(
                computed = stats.computed,
                cache_hits = stats.cache_hits,
                cache_stores = stats.cache_stores,
                failed,
                "execution finished"
            );

            let records = selection
                .paths
                .into_iter()
                .zip(outcomes)
                .map(|(path, outcome)| Record::new(path, outcome))
                .collect();
            Ok(ResultSet::new(selection.targets, records, stats))
        }
        .instrument(span)
        .await
    }

    /// Applies the cancellation token and the timeout around a strategy run
    async fn guarded<T: Value>(
        &self,
        plan: &Plan<'_, T>,
        ctx: &RunContext,
        paths: &[Path],
        options: &ExecuteOptions,
    ) -> Result<Vec<Result<Outputs<T>>>> {
        let run = async {
            match &options.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ExecutionError::Cancelled),
                    outcome = self.dispatch(plan, ctx, paths) => outcome,
                },
                None => self.dispatch(plan, ctx, paths).await,
            }
        };
        match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ExecutionError::Timeout {
                    after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })?,
            None => run.await,
        }
    }

    async fn dispatch<T: Value>(
        &self,
        plan: &Plan<'_, T>,
        ctx: &RunContext,
        paths: &[Path],
    ) -> Result<Vec<Result<Outputs<T>>>> {
        match self.config.strategy {
            Strategy::DepthFirst => depth_first::run(plan, ctx, paths, &self.config).await,
            Strategy::BreadthFirst => breadth_first::run(plan, ctx, paths, &self.config).await,
            Strategy::CacheOnly => cache_only::run(plan, ctx, paths, &self.config).await,
        }
    }

    /// Every key in the cache, empty without a cache
    pub async fn cached_keys(&self) -> Result<Vec<CacheKey>> {
        match &self.cache {
            Some(cache) => Ok(cache.keys().await?),
            None => Ok(Vec::new()),
        }
    }

    /// Removes the cached values of `step`, or of one of its options
    pub async fn cache_delete_step(&self, step: &StepId, option: Option<&OptionId>) -> Result<usize> {
        match &self.cache {
            Some(cache) => {
                let removed = cache.delete_step(step, option).await?;
                info!(step = %step, removed, "cache entries deleted");
                Ok(removed)
            }
            None => Ok(0),
        }
    }

    pub async fn cache_clear(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.clear().await?;
        }
        Ok(())
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("cached", &self.cache.is_some())
            .field("config", &self.config)
            .finish()
    }
}
