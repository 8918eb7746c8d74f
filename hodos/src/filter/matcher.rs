//! Option matchers and partial assignments

use crate::graph::{GraphError, GraphResult, OptionId, Path, StepId};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Decides whether an option is acceptable for a step.
#[derive(Clone)]
pub enum Matcher {
    /// Any option
    Any,
    /// Exactly this option
    Exact(OptionId),
    /// Any of these options
    OneOf(Vec<OptionId>),
    /// Options whose display form fully matches the expression
    Pattern(Regex),
    /// Options the predicate accepts
    Predicate(Arc<dyn Fn(&OptionId) -> bool + Send + Sync>),
}

impl Matcher {
    pub fn exact(option: impl Into<OptionId>) -> Self {
        Matcher::Exact(option.into())
    }

    pub fn one_of<O: Into<OptionId>>(options: impl IntoIterator<Item = O>) -> Self {
        Matcher::OneOf(options.into_iter().map(Into::into).collect())
    }

    /// Compiles `pattern` anchored at both ends
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{pattern})$")).map(Matcher::Pattern)
    }

    pub fn predicate(f: impl Fn(&OptionId) -> bool + Send + Sync + 'static) -> Self {
        Matcher::Predicate(Arc::new(f))
    }

    pub fn matches(&self, option: &OptionId) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Exact(expected) => expected == option,
            Matcher::OneOf(options) => options.contains(option),
            Matcher::Pattern(regex) => regex.is_match(&option.to_string()),
            Matcher::Predicate(f) => f(option),
        }
    }

    /// Options this matcher names literally
    fn literals(&self) -> &[OptionId] {
        match self {
            Matcher::Exact(option) => std::slice::from_ref(option),
            Matcher::OneOf(options) => options,
            _ => &[],
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("Any"),
            Matcher::Exact(option) => write!(f, "Exact({option})"),
            Matcher::OneOf(options) => f.debug_tuple("OneOf").field(options).finish(),
            Matcher::Pattern(regex) => write!(f, "Pattern({})", regex.as_str()),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<OptionId> for Matcher {
    fn from(option: OptionId) -> Self {
        Matcher::Exact(option)
    }
}

impl From<&str> for Matcher {
    fn from(option: &str) -> Self {
        Matcher::Exact(option.into())
    }
}

impl From<String> for Matcher {
    fn from(option: String) -> Self {
        Matcher::Exact(option.into())
    }
}

impl From<i64> for Matcher {
    fn from(option: i64) -> Self {
        Matcher::Exact(option.into())
    }
}

impl From<Vec<OptionId>> for Matcher {
    fn from(options: Vec<OptionId>) -> Self {
        Matcher::OneOf(options)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Pattern(regex)
    }
}

/// Constraints on some steps; unconstrained steps accept any option.
#[derive(Clone, Debug, Default)]
pub struct Assignment {
    entries: Vec<(StepId, Matcher)>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the constraint for `step`
    pub fn with(mut self, step: impl Into<StepId>, matcher: impl Into<Matcher>) -> Self {
        self.insert(step, matcher);
        self
    }

    pub fn insert(&mut self, step: impl Into<StepId>, matcher: impl Into<Matcher>) {
        let (step, matcher) = (step.into(), matcher.into());
        match self.entries.iter_mut().find(|(id, _)| *id == step) {
            Some(entry) => entry.1 = matcher,
            None => self.entries.push((step, matcher)),
        }
    }

    pub fn get(&self, step: &StepId) -> Option<&Matcher> {
        self.entries
            .iter()
            .find(|(id, _)| id == step)
            .map(|(_, matcher)| matcher)
    }

    pub fn steps(&self) -> impl Iterator<Item = &StepId> {
        self.entries.iter().map(|(step, _)| step)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `option` satisfies the constraint on `step`, if any
    pub fn accepts(&self, step: &StepId, option: &OptionId) -> bool {
        self.get(step).map_or(true, |matcher| matcher.matches(option))
    }

    /// True if every constrained step on the path is satisfied
    pub fn matches(&self, path: &Path) -> bool {
        path.iter().all(|(step, option)| self.accepts(step, option))
    }

    pub(crate) fn validate<T>(&self, graph: &crate::Graph<T>) -> GraphResult<()> {
        for (step, matcher) in &self.entries {
            let node = graph.get_step(step)?;
            for option in matcher.literals() {
                if !node.contains_option(option) {
                    return Err(GraphError::unknown_option(step.clone(), option.clone()));
                }
            }
        }
        Ok(())
    }
}

impl<S: Into<StepId>, M: Into<Matcher>> FromIterator<(S, M)> for Assignment {
    fn from_iter<I: IntoIterator<Item = (S, M)>>(iter: I) -> Self {
        let mut assignment = Assignment::new();
        for (step, matcher) in iter {
            assignment.insert(step, matcher);
        }
        assignment
    }
}

/// A disjunction of partial assignments.
///
/// A path matches when it satisfies at least one entry. A filter with no
/// entries matches nothing.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    entries: Vec<Assignment>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter that matches every path
    pub fn any() -> Self {
        Self {
            entries: vec![Assignment::new()],
        }
    }

    /// Adds an alternative
    pub fn or(mut self, entry: impl Into<Assignment>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn push(&mut self, entry: Assignment) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Assignment] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.entries.iter().any(|entry| entry.matches(path))
    }

    /// Constrains `step` in every entry, overriding existing constraints
    pub fn pin(&mut self, step: &StepId, matcher: &Matcher) {
        for entry in &mut self.entries {
            entry.insert(step.clone(), matcher.clone());
        }
    }

    /// Checks every named step and literal option against the graph
    pub fn validate<T>(&self, graph: &crate::Graph<T>) -> GraphResult<()> {
        self.entries.iter().try_for_each(|entry| entry.validate(graph))
    }
}

impl From<Assignment> for Filter {
    fn from(entry: Assignment) -> Self {
        Self {
            entries: vec![entry],
        }
    }
}

impl From<Vec<Assignment>> for Filter {
    fn from(entries: Vec<Assignment>) -> Self {
        Self { entries }
    }
}

impl<S: Into<StepId>, M: Into<Matcher>> FromIterator<(S, M)> for Filter {
    fn from_iter<I: IntoIterator<Item = (S, M)>>(iter: I) -> Self {
        Filter::from(iter.into_iter().collect::<Assignment>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(name: &str) -> OptionId {
        OptionId::from(name)
    }

    #[test]
    fn test_pattern_is_a_full_match() {
        let matcher = Matcher::pattern("option[0-9]").unwrap();
        assert!(matcher.matches(&opt("option1")));
        assert!(!matcher.matches(&opt("option12")));
        assert!(!matcher.matches(&opt("my_option1")));
    }

    #[test]
    fn test_pattern_sees_display_form() {
        let matcher = Matcher::pattern(r"\(lr, \d+\)").unwrap();
        assert!(matcher.matches(&OptionId::new(("lr", 3))));
    }

    #[test]
    fn test_predicate_and_one_of() {
        let short = Matcher::predicate(|option| option.to_string().len() <= 2);
        assert!(short.matches(&opt("ab")));
        assert!(!short.matches(&opt("abc")));

        let set = Matcher::one_of(["a", "b"]);
        assert!(set.matches(&opt("b")));
        assert!(!set.matches(&opt("c")));
    }

    #[test]
    fn test_filter_is_disjunction_of_conjunctions() {
        let filter = Filter::new()
            .or(Assignment::new().with("s1", "a").with("s2", "x"))
            .or(Assignment::new().with("s1", "b"));

        let path = |a: &str, b: &str| -> Path { [("s1", a), ("s2", b)].into_iter().collect() };
        assert!(filter.matches(&path("a", "x")));
        assert!(!filter.matches(&path("a", "y")));
        assert!(filter.matches(&path("b", "y")));
        assert!(!Filter::new().matches(&path("a", "x")));
        assert!(Filter::any().matches(&path("a", "x")));
    }

    #[test]
    fn test_pin_overrides_every_entry() {
        let mut filter = Filter::new()
            .or(Assignment::new().with("s1", "a"))
            .or(Assignment::new().with("s2", "x"));
        filter.pin(&"s1".into(), &Matcher::exact("b"));

        for entry in filter.entries() {
            assert!(entry.accepts(&"s1".into(), &opt("b")));
            assert!(!entry.accepts(&"s1".into(), &opt("a")));
        }
    }
}
