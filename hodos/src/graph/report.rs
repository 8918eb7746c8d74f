//! Human-readable views of a graph
//!
//! [`GraphReport`] lists each step in topological order with its role,
//! parents and options. It renders as indented text through `Display`, as
//! Graphviz DOT through [`GraphReport::to_dot`], and as JSON through serde.

use super::{Graph, OptionId, StepId};
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Position of a step in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    Input,
    Inner,
    Output,
    /// Reads the input and nothing depends on it
    Standalone,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub id: StepId,
    pub role: StepRole,
    pub parents: Vec<StepId>,
    pub options: Vec<OptionId>,
    pub default_option: Option<OptionId>,
    pub latest_option: Option<OptionId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphReport {
    pub latest_step: Option<StepId>,
    pub steps: Vec<StepReport>,
}

impl<T> Graph<T> {
    /// Summarizes the graph in topological order
    pub fn report(&self) -> GraphReport {
        let outputs = self.output_steps();
        let order = self
            .topological_order()
            .unwrap_or_else(|_| self.step_ids().cloned().collect());

        let steps = order
            .iter()
            .filter_map(|id| self.step(id))
            .map(|step| {
                let is_output = outputs.contains(step.id());
                let role = match (step.is_input(), is_output) {
                    (true, true) => StepRole::Standalone,
                    (true, false) => StepRole::Input,
                    (false, true) => StepRole::Output,
                    (false, false) => StepRole::Inner,
                };
                StepReport {
                    id: step.id().clone(),
                    role,
                    parents: step.parents().to_vec(),
                    options: step.option_ids().cloned().collect(),
                    default_option: step.default_option().cloned(),
                    latest_option: step.latest_option().cloned(),
                }
            })
            .collect();

        GraphReport {
            latest_step: self.latest_step().cloned(),
            steps,
        }
    }
}

impl GraphReport {
    /// Renders the step structure as Graphviz DOT, root included
    ///
    /// Render with `dot -Tpng graph.dot -o graph.png`.
    pub fn to_dot(&self) -> String {
        let mut graph = DiGraph::<String, &str>::new();
        let mut nodes = HashMap::new();

        let root = StepId::root();
        nodes.insert(root.clone(), graph.add_node(root.to_string()));
        for step in &self.steps {
            let label = format!("{} [{}]", step.id, step.options.len());
            nodes.insert(step.id.clone(), graph.add_node(label));
        }

        for step in &self.steps {
            let target = nodes[&step.id];
            for parent in &step.parents {
                if let Some(&source) = nodes.get(parent) {
                    graph.add_edge(source, target, "");
                }
            }
        }

        format!("{}", Dot::with_config(&graph, &[Config::EdgeNoLabel]))
    }
}

impl fmt::Display for GraphReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph ({} steps)", self.steps.len())?;
        for step in &self.steps {
            let marker = if self.latest_step.as_ref() == Some(&step.id) {
                " (latest)"
            } else {
                ""
            };
            writeln!(f, "  {} <{:?}>{marker}", step.id, step.role)?;

            let parents: Vec<String> = step.parents.iter().map(ToString::to_string).collect();
            writeln!(f, "    parents: {}", parents.join(", "))?;

            for option in &step.options {
                let mut flags = Vec::new();
                if step.default_option.as_ref() == Some(option) {
                    flags.push("default");
                }
                if step.latest_option.as_ref() == Some(option) {
                    flags.push("latest");
                }
                if flags.is_empty() {
                    writeln!(f, "    - {option}")?;
                } else {
                    writeln!(f, "    - {option} ({})", flags.join(", "))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BoxError;

    fn graph() -> Graph<i64> {
        let mut graph = Graph::new();
        graph
            .add_default_option("load", "file", |_: &[i64]| -> Result<i64, BoxError> { Ok(1) })
            .unwrap();
        graph.add_noop_option("clean", "none").unwrap();
        graph
            .add_option("clean", "strict", |x: &[i64]| -> Result<i64, BoxError> { Ok(x[0] * 2) })
            .unwrap();
        graph
    }

    #[test]
    fn test_roles_and_flags() {
        let report = graph().report();
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].role, StepRole::Input);
        assert_eq!(report.steps[1].role, StepRole::Output);
        assert_eq!(report.steps[0].default_option, Some("file".into()));
        assert_eq!(report.steps[1].latest_option, Some("strict".into()));

        let text = report.to_string();
        assert!(text.contains("- file (default, latest)"));
        assert!(text.contains("clean <Output> (latest)"));
    }

    #[test]
    fn test_dot_contains_edges_from_root() {
        let dot = graph().report().to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("ROOT"));
        assert!(dot.contains("clean [2]"));
        assert!(dot.contains("0 -> 1"));
        assert!(dot.contains("1 -> 2"));
    }
}
