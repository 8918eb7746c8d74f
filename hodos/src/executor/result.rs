//! What an execute call returns

use super::error::{ExecutionError, Result};
use crate::filter::Assignment;
use crate::graph::{Path, StepId};
use serde::{Deserialize, Serialize};

/// Values of the target steps for one path, in target order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outputs<T> {
    values: Vec<(StepId, T)>,
}

impl<T> Outputs<T> {
    pub(crate) fn new(values: Vec<(StepId, T)>) -> Self {
        Self { values }
    }

    pub fn get(&self, step: &StepId) -> Option<&T> {
        self.values
            .iter()
            .find(|(id, _)| id == step)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepId, &T)> {
        self.values.iter().map(|(step, value)| (step, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value if there is exactly one target
    pub fn single(&self) -> Option<&T> {
        match self.values.as_slice() {
            [(_, value)] => Some(value),
            _ => None,
        }
    }

    pub fn into_single(self) -> Option<T> {
        let mut values = self.values;
        match values.len() {
            1 => values.pop().map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn into_vec(self) -> Vec<(StepId, T)> {
        self.values
    }
}

/// One path and how it ended
#[derive(Debug, Clone)]
pub struct Record<T> {
    path: Path,
    outcome: Result<Outputs<T>>,
}

impl<T> Record<T> {
    pub(crate) fn new(path: Path, outcome: Result<Outputs<T>>) -> Self {
        Self { path, outcome }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn outcome(&self) -> &Result<Outputs<T>> {
        &self.outcome
    }

    pub fn outputs(&self) -> Option<&Outputs<T>> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.outcome.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The value of the only target, if the path succeeded
    pub fn value(&self) -> Option<&T> {
        self.outputs().and_then(Outputs::single)
    }

    pub fn into_outcome(self) -> Result<Outputs<T>> {
        self.outcome
    }
}

/// Counters for one execute call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub paths: usize,
    pub failed: usize,
    /// Transform invocations
    pub computed: usize,
    pub cache_hits: usize,
    pub cache_stores: usize,
}

/// Every record of a call, in enumeration order.
#[derive(Debug, Clone)]
pub struct ResultSet<T> {
    targets: Vec<StepId>,
    records: Vec<Record<T>>,
    stats: ExecutionStats,
}

/// A result set reduced to its simplest shape
#[derive(Debug, Clone)]
pub enum Squeezed<T> {
    /// No path matched
    Empty,
    /// One path, one target
    Value(T),
    /// One path, several targets
    Outputs(Outputs<T>),
    /// Several paths
    Collection(ResultSet<T>),
}

impl<T> Squeezed<T> {
    pub fn into_value(self) -> Option<T> {
        match self {
            Squeezed::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> ResultSet<T> {
    pub(crate) fn new(targets: Vec<StepId>, records: Vec<Record<T>>, stats: ExecutionStats) -> Self {
        Self {
            targets,
            records,
            stats,
        }
    }

    pub fn targets(&self) -> &[StepId] {
        &self.targets
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record<T>] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record<T>> {
        self.records.iter()
    }

    pub fn get(&self, path: &Path) -> Option<&Record<T>> {
        self.records.iter().find(|record| &record.path == path)
    }

    /// Records whose path satisfies the partial assignment
    pub fn find<'a>(&'a self, assignment: &'a Assignment) -> impl Iterator<Item = &'a Record<T>> {
        self.records
            .iter()
            .filter(move |record| assignment.matches(&record.path))
    }

    pub fn failures(&self) -> impl Iterator<Item = &Record<T>> {
        self.records.iter().filter(|record| !record.is_ok())
    }

    pub fn into_records(self) -> Vec<Record<T>> {
        self.records
    }

    /// Collapses single-path results
    ///
    /// No records gives [`Squeezed::Empty`]. A single record gives its
    /// value (one target) or its outputs (several), or its error. Anything
    /// larger is returned whole.
    pub fn squeeze(mut self) -> Result<Squeezed<T>> {
        if self.records.len() > 1 {
            return Ok(Squeezed::Collection(self));
        }
        let Some(record) = self.records.pop() else {
            return Ok(Squeezed::Empty);
        };
        let outputs = record.outcome?;
        if outputs.len() == 1 {
            Ok(outputs.into_single().map_or(Squeezed::Empty, Squeezed::Value))
        } else {
            Ok(Squeezed::Outputs(outputs))
        }
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a Record<T>;
    type IntoIter = std::slice::Iter<'a, Record<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(option: &str, outputs: Vec<(&str, i64)>) -> Record<i64> {
        let path: Path = [("s", option)].into_iter().collect();
        let outputs = outputs
            .into_iter()
            .map(|(step, value)| (StepId::from(step), value))
            .collect();
        Record::new(path, Ok(Outputs::new(outputs)))
    }

    fn set(records: Vec<Record<i64>>) -> ResultSet<i64> {
        ResultSet::new(vec!["s".into()], records, ExecutionStats::default())
    }

    #[test]
    fn test_squeeze_shapes() {
        assert!(matches!(set(vec![]).squeeze().unwrap(), Squeezed::Empty));
        assert_eq!(
            set(vec![record("a", vec![("s", 4)])]).squeeze().unwrap().into_value(),
            Some(4)
        );
        assert!(matches!(
            set(vec![record("a", vec![("s", 4), ("t", 5)])]).squeeze().unwrap(),
            Squeezed::Outputs(outputs) if outputs.len() == 2
        ));
        assert!(matches!(
            set(vec![record("a", vec![("s", 1)]), record("b", vec![("s", 2)])])
                .squeeze()
                .unwrap(),
            Squeezed::Collection(all) if all.len() == 2
        ));
    }

    #[test]
    fn test_squeeze_surfaces_single_error() {
        let failed = Record::new(Path::default(), Err(ExecutionError::Cancelled));
        assert_eq!(set(vec![failed]).squeeze().unwrap_err(), ExecutionError::Cancelled);
    }

    #[test]
    fn test_find_by_partial_assignment() {
        let results = set(vec![record("a", vec![("s", 1)]), record("b", vec![("s", 2)])]);
        let wanted = Assignment::new().with("s", "b");
        let found: Vec<_> = results.find(&wanted).filter_map(Record::value).collect();
        assert_eq!(found, vec![&2]);
    }
}
