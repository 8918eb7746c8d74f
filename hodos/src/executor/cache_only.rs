//! Cache-only evaluation: targets are read back, nothing is computed.

use super::context::RunContext;
use super::error::{ExecutionError, Result};
use super::plan::Plan;
use super::result::Outputs;
use crate::config::{ExecutorConfig, FailurePolicy};
use crate::core::Value;
use crate::graph::Path;
use tracing::warn;

pub(crate) async fn run<T: Value>(
    plan: &Plan<'_, T>,
    ctx: &RunContext,
    paths: &[Path],
    config: &ExecutorConfig,
) -> Result<Vec<Result<Outputs<T>>>> {
    let mut outcomes = Vec::with_capacity(paths.len());
    for path in paths {
        let outcome = read_path(plan, ctx, path).await;
        if let Err(e) = &outcome {
            warn!(path = %path, error = %e, "path not available from cache");
            if config.failure_policy == FailurePolicy::FailFast {
                return Err(e.clone());
            }
        }
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

async fn read_path<T: Value>(plan: &Plan<'_, T>, ctx: &RunContext, path: &Path) -> Result<Outputs<T>> {
    let mut values = Vec::with_capacity(plan.targets().len());
    for target in plan.targets() {
        let key = plan.key(target, path)?;
        match ctx.read::<T>(&key).await? {
            Some(value) => values.push((target.clone(), value)),
            None => {
                return Err(ExecutionError::NotCached {
                    key: key.to_string(),
                })
            }
        }
    }
    Ok(Outputs::new(values))
}
