//! Paths and the structural cache key derived from them
//!
//! A [`Path`] assigns exactly one option to every step on the chain that
//! leads to the requested targets. The [`CacheKey`] of a step on a path is
//! the restriction of that path to the step and its ancestors, listed in
//! topological order with the step itself last. Two paths that agree on a
//! step's ancestry therefore share its key, and so share its cached value.

use super::{OptionId, StepId};
use crate::core::{self, hash_value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One complete assignment of options to steps, in topological order.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    assignments: Vec<(StepId, OptionId)>,
}

impl Path {
    pub fn new(assignments: Vec<(StepId, OptionId)>) -> Self {
        Self { assignments }
    }

    /// Returns the option chosen for `step`, if the path covers it
    pub fn option(&self, step: &StepId) -> Option<&OptionId> {
        self.assignments
            .iter()
            .find(|(id, _)| id == step)
            .map(|(_, option)| option)
    }

    pub fn assignments(&self) -> &[(StepId, OptionId)] {
        &self.assignments
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepId> {
        self.assignments.iter().map(|(step, _)| step)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepId, &OptionId)> {
        self.assignments.iter().map(|(step, option)| (step, option))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Restricts the path to `lineage` (a step's ancestors then the step).
    ///
    /// Returns `None` if the path does not assign every step in the lineage.
    pub fn key_for(&self, lineage: &[StepId]) -> Option<CacheKey> {
        let (step, ancestry) = lineage.split_last()?;
        let ancestry = ancestry
            .iter()
            .map(|id| self.option(id).map(|option| (id.clone(), option.clone())))
            .collect::<Option<Vec<_>>>()?;
        let option = self.option(step)?.clone();
        Some(CacheKey {
            step: step.clone(),
            option,
            ancestry,
        })
    }
}

impl From<Vec<(StepId, OptionId)>> for Path {
    fn from(assignments: Vec<(StepId, OptionId)>) -> Self {
        Self::new(assignments)
    }
}

impl<S: Into<StepId>, O: Into<OptionId>> FromIterator<(S, O)> for Path {
    fn from_iter<I: IntoIterator<Item = (S, O)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(step, option)| (step.into(), option.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (step, option)) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{step}={option}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path{self}")
    }
}

/// Structural identity of one computed value.
///
/// Equal keys denote equal values provided transforms are deterministic and
/// have not been redefined since the value was stored.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    step: StepId,
    option: OptionId,
    ancestry: Vec<(StepId, OptionId)>,
}

impl CacheKey {
    /// Builds a key for `step = option` preceded by the given ancestor
    /// assignments in topological order.
    pub fn new(
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
        ancestry: Vec<(StepId, OptionId)>,
    ) -> Self {
        Self {
            step: step.into(),
            option: option.into(),
            ancestry,
        }
    }

    /// The step whose output this key identifies
    pub fn step(&self) -> &StepId {
        &self.step
    }

    pub fn option(&self) -> &OptionId {
        &self.option
    }

    pub fn ancestry(&self) -> &[(StepId, OptionId)] {
        &self.ancestry
    }

    /// Ancestors followed by the keyed step
    pub fn lineage(&self) -> impl Iterator<Item = (&StepId, &OptionId)> {
        self.ancestry
            .iter()
            .map(|(step, option)| (step, option))
            .chain(std::iter::once((&self.step, &self.option)))
    }

    /// The partial path this key was computed from
    pub fn to_path(&self) -> Path {
        self.lineage()
            .map(|(step, option)| (step.clone(), option.clone()))
            .collect()
    }

    /// Stable 64-bit fingerprint of the whole lineage
    pub fn digest(&self) -> core::Result<u64> {
        hash_value(self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (step, option) in &self.ancestry {
            write!(f, "{step}={option}/")?;
        }
        write!(f, "{}={}", self.step, self.option)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}
