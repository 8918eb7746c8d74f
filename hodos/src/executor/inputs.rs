use super::error::{ExecutionError, Result};
use crate::graph::StepId;
use std::collections::HashMap;

/// The external value(s) fed to input steps.
#[derive(Debug, Clone, PartialEq)]
pub enum Inputs<T> {
    /// Every input step receives this value
    Shared(T),
    /// Each input step receives its own value
    PerStep(HashMap<StepId, T>),
}

impl<T: Clone> Inputs<T> {
    pub fn shared(value: T) -> Self {
        Inputs::Shared(value)
    }

    pub fn per_step<S: Into<StepId>>(values: impl IntoIterator<Item = (S, T)>) -> Self {
        Inputs::PerStep(
            values
                .into_iter()
                .map(|(step, value)| (step.into(), value))
                .collect(),
        )
    }

    /// The value an input step consumes
    pub fn for_step(&self, step: &StepId) -> Result<T> {
        match self {
            Inputs::Shared(value) => Ok(value.clone()),
            Inputs::PerStep(values) => values
                .get(step)
                .cloned()
                .ok_or_else(|| ExecutionError::MissingInput { step: step.clone() }),
        }
    }
}

impl<T> From<T> for Inputs<T> {
    fn from(value: T) -> Self {
        Inputs::Shared(value)
    }
}
