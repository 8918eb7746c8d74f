//! Depth-first evaluation
//!
//! Each path is an independent unit of work. A path first walks back from
//! its targets, stopping at every step whose value is already cached; then
//! it computes the missing steps in topological order. Values are dropped
//! as soon as their last consumer on the path has run.
//!
//! Paths are dispatched up to `max_concurrency` at a time, optionally in a
//! shuffled order so that concurrent workers rarely contend for the same
//! prefix. Results are always returned in enumeration order.

use super::context::RunContext;
use super::error::{ExecutionError, Result};
use super::plan::Plan;
use super::result::Outputs;
use crate::config::{ExecutorConfig, FailurePolicy};
use crate::core::Value;
use crate::graph::{Path, StepId};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use tracing::warn;

pub(crate) async fn run<T: Value>(
    plan: &Plan<'_, T>,
    ctx: &RunContext,
    paths: &[Path],
    config: &ExecutorConfig,
) -> Result<Vec<Result<Outputs<T>>>> {
    let mut dispatch: Vec<usize> = (0..paths.len()).collect();
    if config.shuffle && config.max_concurrency > 1 {
        dispatch.shuffle(&mut rand::thread_rng());
    }

    let mut slots: Vec<Option<Result<Outputs<T>>>> = (0..paths.len()).map(|_| None).collect();
    let mut running = stream::iter(dispatch)
        .map(|index| async move { (index, run_path(plan, ctx, &paths[index]).await) })
        .buffer_unordered(config.max_concurrency);

    while let Some((index, outcome)) = running.next().await {
        if let Err(e) = &outcome {
            warn!(path = %paths[index], error = %e, "path failed");
            if config.failure_policy == FailurePolicy::FailFast {
                return Err(e.clone());
            }
        }
        slots[index] = Some(outcome);
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Err(ExecutionError::Cancelled)))
        .collect())
}

async fn run_path<T: Value>(plan: &Plan<'_, T>, ctx: &RunContext, path: &Path) -> Result<Outputs<T>> {
    let mut values: HashMap<StepId, T> = HashMap::new();
    let mut missing: HashSet<StepId> = HashSet::new();

    // Walk back from the targets until cached values cover every branch
    let mut seen: HashSet<StepId> = HashSet::new();
    let mut stack: Vec<StepId> = plan.targets().iter().rev().cloned().collect();
    while let Some(step) = stack.pop() {
        if !seen.insert(step.clone()) {
            continue;
        }
        let key = plan.key(&step, path)?;
        if let Some(value) = ctx.lookup::<T>(&key).await? {
            values.insert(step, value);
            continue;
        }
        stack.extend(plan.step_parents(&step)?.cloned());
        missing.insert(step);
    }

    let mut consumers: HashMap<StepId, usize> = HashMap::new();
    for step in &missing {
        for parent in plan.step_parents(step)? {
            *consumers.entry(parent.clone()).or_default() += 1;
        }
    }

    for step in plan.order().iter().filter(|step| missing.contains(*step)) {
        let key = plan.key(step, path)?;
        let inputs = plan.gather(step, |parent| values.get(parent).cloned())?;
        let value = ctx.evaluate(plan, step, path, &key, inputs).await?;

        for parent in plan.step_parents(step)? {
            if let Some(remaining) = consumers.get_mut(parent) {
                *remaining -= 1;
                if *remaining == 0 && !plan.is_target(parent) {
                    values.remove(parent);
                }
            }
        }
        values.insert(step.clone(), value);
    }

    plan.outputs(|target| values.remove(target))
}
