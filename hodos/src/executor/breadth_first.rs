//! Breadth-first evaluation
//!
//! # Algorithm
//!
//! 1. Demand pass: every path walks back from its targets exactly like the
//!    depth-first strategy, but the walk is memoized by cache key across
//!    paths. The result is the set of keys that must be computed and the
//!    values already available from the cache.
//! 2. Layers: steps are processed one at a time in topological order. The
//!    distinct keys of the current step are computed once each, up to
//!    `max_concurrency` at a time, and shared by every path whose prefix
//!    matches.
//! 3. Eviction: values of a step are dropped after the last layer that
//!    consumes them, unless the step is a target.
//!
//! Under [`FailurePolicy::Continue`] a failed key fails exactly the paths
//! that share it; the other paths run to completion.

use super::context::RunContext;
use super::error::{ExecutionError, Result};
use super::plan::Plan;
use super::result::Outputs;
use crate::config::{ExecutorConfig, FailurePolicy};
use crate::core::Value;
use crate::graph::{CacheKey, Path, StepId};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub(crate) async fn run<T: Value>(
    plan: &Plan<'_, T>,
    ctx: &RunContext,
    paths: &[Path],
    config: &ExecutorConfig,
) -> Result<Vec<Result<Outputs<T>>>> {
    let fail_fast = config.failure_policy == FailurePolicy::FailFast;
    let mut known: HashMap<CacheKey, T> = HashMap::new();
    let mut needed: HashSet<CacheKey> = HashSet::new();
    let mut failed: HashMap<usize, ExecutionError> = HashMap::new();

    for (index, path) in paths.iter().enumerate() {
        if let Err(e) = demand(plan, ctx, path, &mut known, &mut needed).await {
            if fail_fast {
                return Err(e);
            }
            warn!(path = %path, error = %e, "path failed");
            failed.insert(index, e);
        }
    }
    debug!(to_compute = needed.len(), from_cache = known.len(), "demand resolved");

    let last_use = last_use(plan)?;
    for (layer, step) in plan.order().iter().enumerate() {
        // Distinct keys of this layer, each with the paths sharing it
        let mut sharing: HashMap<CacheKey, Vec<usize>> = HashMap::new();
        let mut jobs: Vec<(CacheKey, usize)> = Vec::new();
        for (index, path) in paths.iter().enumerate() {
            if failed.contains_key(&index) {
                continue;
            }
            let key = plan.key(step, path)?;
            if !needed.contains(&key) || known.contains_key(&key) {
                continue;
            }
            let members = sharing.entry(key.clone()).or_default();
            if members.is_empty() {
                jobs.push((key, index));
            }
            members.push(index);
        }

        if !jobs.is_empty() {
            debug!(step = %step, keys = jobs.len(), "computing layer");
        }
        let mut done: Vec<(CacheKey, T)> = Vec::with_capacity(jobs.len());
        {
            let known = &known;
            let mut layer_jobs = stream::iter(jobs)
                .map(|(key, index)| async move {
                    let path = &paths[index];
                    let outcome = match plan.gather(step, |parent| {
                        plan.key(parent, path)
                            .ok()
                            .and_then(|parent_key| known.get(&parent_key).cloned())
                    }) {
                        Ok(inputs) => ctx.evaluate(plan, step, path, &key, inputs).await,
                        Err(e) => Err(e),
                    };
                    (key, outcome)
                })
                .buffered(config.max_concurrency);

            while let Some((key, outcome)) = layer_jobs.next().await {
                match outcome {
                    Ok(value) => done.push((key, value)),
                    Err(e) if fail_fast => return Err(e),
                    Err(e) => {
                        for index in sharing.remove(&key).unwrap_or_default() {
                            warn!(path = %paths[index], error = %e, "path failed");
                            failed.insert(index, e.clone());
                        }
                    }
                }
            }
        }
        known.extend(done);

        let evicted: HashSet<&StepId> = last_use
            .iter()
            .filter(|(step, at)| **at == layer && !plan.is_target(step))
            .map(|(step, _)| step)
            .collect();
        if !evicted.is_empty() {
            known.retain(|key, _| !evicted.contains(key.step()));
        }
    }

    Ok(paths
        .iter()
        .enumerate()
        .map(|(index, path)| match failed.remove(&index) {
            Some(e) => Err(e),
            None => plan.outputs(|target| {
                plan.key(target, path)
                    .ok()
                    .and_then(|key| known.get(&key).cloned())
            }),
        })
        .collect())
}

/// Records which keys of `path` must be computed, memoized across paths
async fn demand<T: Value>(
    plan: &Plan<'_, T>,
    ctx: &RunContext,
    path: &Path,
    known: &mut HashMap<CacheKey, T>,
    needed: &mut HashSet<CacheKey>,
) -> Result<()> {
    let mut stack: Vec<StepId> = plan.targets().to_vec();
    while let Some(step) = stack.pop() {
        let key = plan.key(&step, path)?;
        if known.contains_key(&key) || needed.contains(&key) {
            continue;
        }
        match ctx.lookup::<T>(&key).await? {
            Some(value) => {
                known.insert(key, value);
            }
            None => {
                stack.extend(plan.step_parents(&step)?.cloned());
                needed.insert(key);
            }
        }
    }
    Ok(())
}

/// Layer index after which each step's values are no longer consumed
fn last_use<T: Value>(plan: &Plan<'_, T>) -> Result<HashMap<StepId, usize>> {
    let mut last_use = HashMap::new();
    for (layer, step) in plan.order().iter().enumerate() {
        last_use.insert(step.clone(), layer);
        for parent in plan.step_parents(step)? {
            last_use.insert(parent.clone(), layer);
        }
    }
    Ok(last_use)
}
