//! Path enumeration with filter pushdown
//!
//! # Algorithm
//!
//! Steps of the target subgraph are visited in topological order. At each
//! step the enumerator tries every option in registration order and keeps
//! two sets alive alongside the partial path:
//!
//! - include entries still satisfiable by the prefix. An option that leaves
//!   the set empty is pruned immediately, with its whole subtree.
//! - exclude entries fully satisfied so far. Once every constrained step of
//!   an exclude entry has been assigned and it still matches, the subtree is
//!   pruned.
//!
//! Neither the Cartesian product nor any filtered-out subtree is ever
//! materialized. Include constraints on steps outside the subgraph are
//! ignored. An exclude entry constraining such a step can never match a
//! path and is dropped.

use super::{Filter, Include, OptionPin, Target};
use crate::graph::{Graph, GraphError, GraphResult, OptionId, Path, StepId};
use std::collections::HashSet;
use tracing::{debug, warn};

/// The outcome of resolving a request against a graph
#[derive(Debug, Clone)]
pub struct Selection {
    /// Steps whose values are returned
    pub targets: Vec<StepId>,
    /// Targets and their ancestors, topologically ordered
    pub order: Vec<StepId>,
    /// Matching paths over `order`, in enumeration order
    pub paths: Vec<Path>,
}

/// Resolves targets, builds the effective filters, and enumerates paths
pub fn select<T>(
    graph: &Graph<T>,
    target: &Target,
    pin: &OptionPin,
    include: &Include,
    exclude: Option<&Filter>,
) -> GraphResult<Selection> {
    let targets = target.resolve(graph)?;

    let mut members: HashSet<StepId> = targets.iter().cloned().collect();
    for step in &targets {
        members.extend(graph.ancestors(step)?);
    }
    let order = graph.order_subgraph(&members)?;

    for id in &order {
        if graph.get_step(id)?.option_count() == 0 {
            return Err(GraphError::no_options(id.clone()));
        }
    }

    let mut include = include.resolve(graph, &order)?;
    pin.apply(graph, &targets, &mut include)?;
    if let Some(exclude) = exclude {
        exclude.validate(graph)?;
    }

    let paths = Enumerator::new(graph, &order, &include, exclude).run();
    if paths.is_empty() {
        warn!(targets = ?targets, "no path matches the requested selection");
    } else {
        debug!(paths = paths.len(), steps = order.len(), "enumerated paths");
    }

    Ok(Selection {
        targets,
        order,
        paths,
    })
}

struct Enumerator<'a, T> {
    graph: &'a Graph<T>,
    order: &'a [StepId],
    include: &'a Filter,
    exclude: Option<&'a Filter>,
    /// Exclude entries that can match, as (entry index, position in `order`
    /// of its last constrained step). `None` means the entry constrains
    /// nothing and matches from the start.
    exclude_live: Vec<(usize, Option<usize>)>,
}

impl<'a, T> Enumerator<'a, T> {
    fn new(
        graph: &'a Graph<T>,
        order: &'a [StepId],
        include: &'a Filter,
        exclude: Option<&'a Filter>,
    ) -> Self {
        let exclude_live = exclude
            .map(|filter| {
                filter
                    .entries()
                    .iter()
                    .enumerate()
                    .filter_map(|(index, entry)| {
                        let mut last = None;
                        for step in entry.steps() {
                            let position = order.iter().position(|id| id == step)?;
                            last = last.max(Some(position));
                        }
                        Some((index, last))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            graph,
            order,
            include,
            exclude,
            exclude_live,
        }
    }

    fn run(&self) -> Vec<Path> {
        let mut out = Vec::new();
        let alive_include: Vec<usize> = (0..self.include.entries().len()).collect();
        let alive_exclude: Vec<usize> = (0..self.exclude_live.len()).collect();
        let mut prefix = Vec::with_capacity(self.order.len());
        self.walk(0, &mut prefix, &alive_include, &alive_exclude, &mut out);
        out
    }

    /// Excluded once a still-matching entry has no constraints left ahead
    fn excluded(&self, depth: usize, alive_exclude: &[usize]) -> bool {
        alive_exclude
            .iter()
            .any(|&live| self.exclude_live[live].1.map_or(true, |last| last < depth))
    }

    fn walk(
        &self,
        depth: usize,
        prefix: &mut Vec<(StepId, OptionId)>,
        alive_include: &[usize],
        alive_exclude: &[usize],
        out: &mut Vec<Path>,
    ) {
        if alive_include.is_empty() || self.excluded(depth, alive_exclude) {
            return;
        }
        let Some(step_id) = self.order.get(depth) else {
            out.push(Path::new(prefix.clone()));
            return;
        };
        let Some(step) = self.graph.step(step_id) else {
            return;
        };

        for option in step.option_ids() {
            let include: Vec<usize> = alive_include
                .iter()
                .copied()
                .filter(|&entry| self.include.entries()[entry].accepts(step_id, option))
                .collect();
            if include.is_empty() {
                continue;
            }
            let exclude: Vec<usize> = match self.exclude {
                Some(filter) => alive_exclude
                    .iter()
                    .copied()
                    .filter(|&live| filter.entries()[self.exclude_live[live].0].accepts(step_id, option))
                    .collect(),
                None => Vec::new(),
            };

            prefix.push((step_id.clone(), option.clone()));
            self.walk(depth + 1, prefix, &include, &exclude, out);
            prefix.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoxError;
    use crate::filter::{Assignment, Matcher};

    fn pass(inputs: &[i64]) -> Result<i64, BoxError> {
        Ok(inputs[0])
    }

    /// a: 3 options, b: 2 options, c: 4 options, chained a -> b -> c
    fn grid() -> Graph<i64> {
        let mut graph = Graph::new();
        for option in ["a1", "a2", "a3"] {
            graph.add_option("a", option, pass).unwrap();
        }
        for option in ["b1", "b2"] {
            graph.add_option("b", option, pass).unwrap();
        }
        for option in ["c1", "c2", "c3", "c4"] {
            graph.add_option("c", option, pass).unwrap();
        }
        graph
    }

    fn run(graph: &Graph<i64>, include: Include, exclude: Option<Filter>) -> Selection {
        select(graph, &Target::Latest, &OptionPin::Any, &include, exclude.as_ref()).unwrap()
    }

    #[test]
    fn test_all_is_the_full_product() {
        let selection = run(&grid(), Include::All, None);
        assert_eq!(selection.paths.len(), 3 * 2 * 4);

        let unique: HashSet<_> = selection.paths.iter().collect();
        assert_eq!(unique.len(), selection.paths.len());
        assert_eq!(selection.paths[0].to_string(), "{a=a1, b=b1, c=c1}");
        assert_eq!(selection.paths[1].to_string(), "{a=a1, b=b1, c=c2}");
    }

    #[test]
    fn test_latest_is_a_single_path() {
        let selection = run(&grid(), Include::Latest, None);
        assert_eq!(selection.paths.len(), 1);
        assert_eq!(selection.paths[0].to_string(), "{a=a3, b=b2, c=c4}");
    }

    #[test]
    fn test_include_wildcards_unconstrained_steps() {
        let include = Filter::from(Assignment::new().with("b", "b1"));
        let selection = run(&grid(), include.into(), None);
        assert_eq!(selection.paths.len(), 3 * 4);
        assert!(selection
            .paths
            .iter()
            .all(|path| path.option(&"b".into()) == Some(&"b1".into())));
    }

    #[test]
    fn test_exclude_removes_matching_paths() {
        let exclude = Filter::from(Assignment::new().with("a", "a1").with("c", "c1"));
        let selection = run(&grid(), Include::All, Some(exclude));
        assert_eq!(selection.paths.len(), 24 - 2);
        assert!(selection.paths.iter().all(|path| {
            !(path.option(&"a".into()) == Some(&"a1".into())
                && path.option(&"c".into()) == Some(&"c1".into()))
        }));
    }

    #[test]
    fn test_matches_post_hoc_filtering() {
        let graph = grid();
        let include = Filter::new()
            .or(Assignment::new().with("a", Matcher::pattern("a[12]").unwrap()))
            .or(Assignment::new().with("c", "c4"));
        let exclude = Filter::from(Assignment::new().with("b", "b2"));

        let pushed = run(&graph, include.clone().into(), Some(exclude.clone()));
        let all = run(&graph, Include::All, None);
        let expected: Vec<_> = all
            .paths
            .into_iter()
            .filter(|path| include.matches(path) && !exclude.matches(path))
            .collect();
        assert_eq!(pushed.paths, expected);
    }

    #[test]
    fn test_pin_latest_restricts_targets_only() {
        let graph = grid();
        let selection =
            select(&graph, &Target::Latest, &OptionPin::Latest, &Include::All, None).unwrap();
        assert_eq!(selection.paths.len(), 3 * 2);
        assert!(selection
            .paths
            .iter()
            .all(|path| path.option(&"c".into()) == Some(&"c4".into())));
    }

    #[test]
    fn test_target_restricts_to_ancestors() {
        let mut graph = grid();
        graph.add_step("side", ["a"]).unwrap();
        graph.add_noop_option("side", "s").unwrap();

        let selection = select(
            &graph,
            &Target::steps(["b"]),
            &OptionPin::Any,
            &Include::All,
            None,
        )
        .unwrap();
        assert_eq!(selection.order, vec![StepId::from("a"), StepId::from("b")]);
        assert_eq!(selection.paths.len(), 6);
    }

    #[test]
    fn test_exclude_on_pruned_step_matches_nothing() {
        let mut graph = grid();
        graph.add_step("side", ["a"]).unwrap();
        graph.add_noop_option("side", "s").unwrap();

        let exclude = Filter::from(Assignment::new().with("side", "s"))
            .or(Assignment::new().with("side", "s").with("a", "a1"))
            .or(Assignment::new().with("b", "b2"));
        let selection = select(
            &graph,
            &Target::steps(["b"]),
            &OptionPin::Any,
            &Include::All,
            Some(&exclude),
        )
        .unwrap();
        // Only the entry on `b` can apply
        assert_eq!(selection.paths.len(), 3);
        assert!(selection
            .paths
            .iter()
            .all(|path| path.option(&"b".into()) == Some(&"b1".into())));
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let graph = grid();
        let unknown_step = Filter::from(Assignment::new().with("zz", "a1"));
        assert!(matches!(
            select(&graph, &Target::Latest, &OptionPin::Any, &unknown_step.into(), None),
            Err(GraphError::UnknownStep { .. })
        ));

        let unknown_option = Filter::from(Assignment::new().with("a", "a9"));
        assert!(matches!(
            select(&graph, &Target::Latest, &OptionPin::Any, &Include::All, Some(&unknown_option)),
            Err(GraphError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_empty_selection_is_not_an_error() {
        let include = Filter::from(Assignment::new().with("a", Matcher::pattern("nothing").unwrap()));
        let selection = run(&grid(), include.into(), None);
        assert!(selection.paths.is_empty());
    }
}
