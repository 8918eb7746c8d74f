//! Selecting which paths to execute
//!
//! A request names its targets ([`Target`]), optionally pins the targets'
//! options ([`OptionPin`]), and narrows the candidate paths with an
//! [`Include`] selection and an optional exclude [`Filter`]. [`select`]
//! turns that request into concrete [`Path`](crate::Path)s, evaluating the
//! filters step by step during enumeration.

mod enumerate;
mod matcher;

pub use enumerate::{select, Selection};
pub use matcher::{Assignment, Filter, Matcher};

use crate::graph::{Graph, GraphError, GraphResult, StepId};

/// Which candidate paths to consider
#[derive(Clone, Debug, Default)]
pub enum Include {
    /// The single path following every step's latest option
    #[default]
    Latest,
    /// Every combination of options
    All,
    /// Paths matching the filter
    Filter(Filter),
}

impl Include {
    fn resolve<T>(&self, graph: &Graph<T>, order: &[StepId]) -> GraphResult<Filter> {
        match self {
            Include::All => Ok(Filter::any()),
            Include::Filter(filter) => {
                filter.validate(graph)?;
                Ok(filter.clone())
            }
            Include::Latest => {
                let mut latest = Assignment::new();
                for id in order {
                    let option = graph
                        .get_step(id)?
                        .latest_option()
                        .ok_or_else(|| GraphError::no_options(id.clone()))?;
                    latest.insert(id.clone(), option.clone());
                }
                Ok(Filter::from(latest))
            }
        }
    }
}

impl From<Filter> for Include {
    fn from(filter: Filter) -> Self {
        Include::Filter(filter)
    }
}

impl From<Assignment> for Include {
    fn from(entry: Assignment) -> Self {
        Include::Filter(entry.into())
    }
}

/// Which steps' values a call returns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Target {
    /// The step most recently added or given an option
    #[default]
    Latest,
    /// Every step nothing depends on
    Outputs,
    Steps(Vec<StepId>),
}

impl Target {
    pub fn step(step: impl Into<StepId>) -> Self {
        Target::Steps(vec![step.into()])
    }

    pub fn steps<S: Into<StepId>>(steps: impl IntoIterator<Item = S>) -> Self {
        Target::Steps(steps.into_iter().map(Into::into).collect())
    }

    /// Resolves to concrete, existing, de-duplicated step IDs
    pub fn resolve<T>(&self, graph: &Graph<T>) -> GraphResult<Vec<StepId>> {
        let targets = match self {
            Target::Latest => graph.latest_step().cloned().into_iter().collect(),
            Target::Outputs => graph.output_steps(),
            Target::Steps(steps) => {
                let mut unique: Vec<StepId> = Vec::with_capacity(steps.len());
                for step in steps {
                    graph.get_step(step)?;
                    if !unique.contains(step) {
                        unique.push(step.clone());
                    }
                }
                unique
            }
        };
        if targets.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        Ok(targets)
    }
}

/// Constraint applied to the target steps' options in every include entry
#[derive(Clone, Debug, Default)]
pub enum OptionPin {
    /// Each target's latest option
    #[default]
    Latest,
    /// No constraint beyond the include selection
    Any,
    Matching(Matcher),
}

impl OptionPin {
    fn apply<T>(&self, graph: &Graph<T>, targets: &[StepId], include: &mut Filter) -> GraphResult<()> {
        for target in targets {
            let matcher = match self {
                OptionPin::Any => return Ok(()),
                OptionPin::Matching(matcher) => matcher.clone(),
                OptionPin::Latest => {
                    let latest = graph
                        .get_step(target)?
                        .latest_option()
                        .ok_or_else(|| GraphError::no_options(target.clone()))?;
                    Matcher::Exact(latest.clone())
                }
            };
            let probe = Filter::from(Assignment::new().with(target.clone(), matcher.clone()));
            probe.validate(graph)?;
            include.pin(target, &matcher);
        }
        Ok(())
    }
}

impl From<Matcher> for OptionPin {
    fn from(matcher: Matcher) -> Self {
        OptionPin::Matching(matcher)
    }
}
