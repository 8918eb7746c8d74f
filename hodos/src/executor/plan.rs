use super::error::{ExecutionError, Result};
use super::inputs::Inputs;
use super::result::Outputs;
use crate::filter::Selection;
use crate::graph::{CacheKey, Graph, GraphError, OptionId, Path, StepId, StepOption};
use std::collections::HashMap;

/// A resolved request: the graph, its inputs, and the lineage of every
/// step involved, computed once per call.
pub(crate) struct Plan<'a, T> {
    graph: &'a Graph<T>,
    inputs: &'a Inputs<T>,
    targets: Vec<StepId>,
    order: Vec<StepId>,
    lineages: HashMap<StepId, Vec<StepId>>,
}

impl<'a, T: Clone + 'static> Plan<'a, T> {
    pub(crate) fn new(graph: &'a Graph<T>, inputs: &'a Inputs<T>, selection: &Selection) -> Result<Self> {
        let lineages = selection
            .order
            .iter()
            .map(|step| Ok((step.clone(), graph.lineage(step)?)))
            .collect::<std::result::Result<HashMap<_, _>, GraphError>>()?;
        Ok(Self {
            graph,
            inputs,
            targets: selection.targets.clone(),
            order: selection.order.clone(),
            lineages,
        })
    }

    pub(crate) fn targets(&self) -> &[StepId] {
        &self.targets
    }

    pub(crate) fn order(&self) -> &[StepId] {
        &self.order
    }

    pub(crate) fn is_target(&self, step: &StepId) -> bool {
        self.targets.contains(step)
    }

    /// Key of `step`'s value on `path`
    pub(crate) fn key(&self, step: &StepId, path: &Path) -> Result<CacheKey> {
        self.lineages
            .get(step)
            .and_then(|lineage| path.key_for(lineage))
            .ok_or_else(|| GraphError::unknown_step(step.clone()).into())
    }

    /// Parents of `step` that are steps, skipping the root
    pub(crate) fn step_parents(&self, step: &StepId) -> Result<impl Iterator<Item = &StepId>> {
        Ok(self
            .graph
            .get_step(step)?
            .parents()
            .iter()
            .filter(|parent| !parent.is_root()))
    }

    /// The option `path` assigns to `step`
    pub(crate) fn option(&self, step: &StepId, path: &Path) -> Result<(OptionId, StepOption<T>)> {
        let option_id = path
            .option(step)
            .ok_or_else(|| GraphError::unknown_step(step.clone()))?;
        let option = self
            .graph
            .get_step(step)?
            .option(option_id)
            .ok_or_else(|| GraphError::unknown_option(step.clone(), option_id.clone()))?;
        Ok((option_id.clone(), option.clone()))
    }

    /// Transform inputs of `step`, one per parent in declared order.
    ///
    /// The root parent contributes the external input; `value_of` supplies
    /// the value of every other parent.
    pub(crate) fn gather(&self, step: &StepId, mut value_of: impl FnMut(&StepId) -> Option<T>) -> Result<Vec<T>> {
        self.graph
            .get_step(step)?
            .parents()
            .iter()
            .map(|parent| {
                if parent.is_root() {
                    self.inputs.for_step(step)
                } else {
                    value_of(parent).ok_or_else(|| missing_value(parent))
                }
            })
            .collect()
    }

    pub(crate) fn outputs(&self, mut value_of: impl FnMut(&StepId) -> Option<T>) -> Result<Outputs<T>> {
        self.targets
            .iter()
            .map(|target| {
                value_of(target)
                    .map(|value| (target.clone(), value))
                    .ok_or_else(|| missing_value(target))
            })
            .collect::<Result<Vec<_>>>()
            .map(Outputs::new)
    }
}

fn missing_value(step: &StepId) -> ExecutionError {
    ExecutionError::Core(format!("value of step '{step}' is not available"))
}
