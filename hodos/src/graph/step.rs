//! Steps and their interchangeable options

use super::{OptionId, Path, StepId};
use crate::core::BoxError;
use std::fmt;
use std::sync::Arc;

pub(crate) type TransformFn<T> =
    Arc<dyn Fn(&[T], &StepContext) -> Result<T, BoxError> + Send + Sync>;

/// What a transform knows about the point at which it is running.
#[derive(Debug, Clone)]
pub struct StepContext {
    step: StepId,
    option: OptionId,
    prefix: Path,
}

impl StepContext {
    pub(crate) fn new(step: StepId, option: OptionId, prefix: Path) -> Self {
        Self {
            step,
            option,
            prefix,
        }
    }

    pub fn step(&self) -> &StepId {
        &self.step
    }

    pub fn option(&self) -> &OptionId {
        &self.option
    }

    /// Assignments of this step's ancestors and of the step itself
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }
}

/// One implementation of a step.
pub struct StepOption<T> {
    transform: TransformFn<T>,
    noop: bool,
}

impl<T> Clone for StepOption<T> {
    fn clone(&self) -> Self {
        Self {
            transform: Arc::clone(&self.transform),
            noop: self.noop,
        }
    }
}

impl<T> fmt::Debug for StepOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepOption")
            .field("noop", &self.noop)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> StepOption<T> {
    pub(crate) fn from_transform(transform: TransformFn<T>) -> Self {
        Self {
            transform,
            noop: false,
        }
    }

    /// Passes the first input through unchanged
    pub(crate) fn noop() -> Self {
        Self {
            transform: Arc::new(|inputs: &[T], ctx: &StepContext| {
                inputs.first().cloned().ok_or_else(|| -> BoxError {
                    format!("no-op option of '{}' received no input", ctx.step()).into()
                })
            }),
            noop: true,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.noop
    }

    pub fn apply(&self, inputs: &[T], ctx: &StepContext) -> Result<T, BoxError> {
        (self.transform)(inputs, ctx)
    }
}

/// A node of the graph: ordered parents plus a set of options.
///
/// Options keep their registration order, which is also the order in which
/// paths enumerate them.
#[derive(Debug)]
pub struct Step<T> {
    id: StepId,
    parents: Vec<StepId>,
    options: Vec<(OptionId, StepOption<T>)>,
    default_option: Option<OptionId>,
    latest_option: Option<OptionId>,
}

impl<T> Clone for Step<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            parents: self.parents.clone(),
            options: self.options.clone(),
            default_option: self.default_option.clone(),
            latest_option: self.latest_option.clone(),
        }
    }
}

impl<T> Step<T> {
    pub(crate) fn new(id: StepId, parents: Vec<StepId>) -> Self {
        Self {
            id,
            parents,
            options: Vec::new(),
            default_option: None,
            latest_option: None,
        }
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    /// Parents in input order; input steps list only the root
    pub fn parents(&self) -> &[StepId] {
        &self.parents
    }

    /// True if the step consumes the execution input
    pub fn is_input(&self) -> bool {
        self.parents.iter().any(StepId::is_root)
    }

    pub fn option_ids(&self) -> impl Iterator<Item = &OptionId> {
        self.options.iter().map(|(id, _)| id)
    }

    pub fn option(&self, id: &OptionId) -> Option<&StepOption<T>> {
        self.options
            .iter()
            .find(|(option, _)| option == id)
            .map(|(_, option)| option)
    }

    pub fn contains_option(&self, id: &OptionId) -> bool {
        self.options.iter().any(|(option, _)| option == id)
    }

    pub(crate) fn options(&self) -> &[(OptionId, StepOption<T>)] {
        &self.options
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn default_option(&self) -> Option<&OptionId> {
        self.default_option.as_ref()
    }

    /// The option most recently added or redefined
    pub fn latest_option(&self) -> Option<&OptionId> {
        self.latest_option.as_ref()
    }

    pub(crate) fn set_parents(&mut self, parents: Vec<StepId>) {
        self.parents = parents;
    }

    pub(crate) fn replace_parent(&mut self, old: &StepId, new: &StepId) {
        for parent in self.parents.iter_mut().filter(|parent| *parent == old) {
            *parent = new.clone();
        }
    }

    /// Inserts or replaces an option in place and marks it latest
    pub(crate) fn put_option(&mut self, id: OptionId, option: StepOption<T>) {
        match self.options.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = option,
            None => self.options.push((id.clone(), option)),
        }
        self.latest_option = Some(id);
    }

    pub(crate) fn remove_option(&mut self, id: &OptionId) -> bool {
        let before = self.options.len();
        self.options.retain(|(option, _)| option != id);
        if self.options.len() == before {
            return false;
        }
        if self.default_option.as_ref() == Some(id) {
            self.default_option = None;
        }
        if self.latest_option.as_ref() == Some(id) {
            self.latest_option = self.options.last().map(|(option, _)| option.clone());
        }
        true
    }

    pub(crate) fn set_default(&mut self, id: OptionId) {
        self.default_option = Some(id);
    }

    pub(crate) fn set_latest(&mut self, id: OptionId) {
        self.latest_option = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> StepContext {
        StepContext::new("s".into(), "o".into(), Path::default())
    }

    #[test]
    fn test_noop_passes_first_input() {
        let option = StepOption::<i64>::noop();
        assert!(option.is_noop());
        assert_eq!(option.apply(&[4, 5], &ctx()).unwrap(), 4);
        assert!(option.apply(&[], &ctx()).is_err());
    }

    #[test]
    fn test_remove_latest_falls_back_to_previous() {
        let mut step = Step::<i64>::new("s".into(), vec![StepId::root()]);
        step.put_option("a".into(), StepOption::noop());
        step.put_option("b".into(), StepOption::noop());
        step.set_default("b".into());

        assert!(step.remove_option(&"b".into()));
        assert_eq!(step.latest_option(), Some(&OptionId::from("a")));
        assert_eq!(step.default_option(), None);
        assert!(!step.remove_option(&"b".into()));
    }

    #[test]
    fn test_redefining_keeps_position() {
        let mut step = Step::<i64>::new("s".into(), vec![StepId::root()]);
        step.put_option("a".into(), StepOption::noop());
        step.put_option("b".into(), StepOption::noop());
        step.put_option("a".into(), StepOption::noop());

        let ids: Vec<_> = step.option_ids().cloned().collect();
        assert_eq!(ids, vec![OptionId::from("a"), OptionId::from("b")]);
        assert_eq!(step.latest_option(), Some(&OptionId::from("a")));
    }
}
