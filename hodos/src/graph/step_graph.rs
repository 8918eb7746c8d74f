//! Graph - steps, their options, and the dependencies between them
//!
//! # Design
//!
//! Steps live in a map keyed by [`StepId`], with a separate insertion order
//! so that every traversal (topological order, option enumeration, reports)
//! is deterministic. Each step stores only its ordered parents; children are
//! derived on demand. Steps without user parents hang from the virtual
//! [`StepId::root`], which never appears as a stored node.
//!
//! Every mutation validates before it writes: an operation that returns an
//! error leaves the graph exactly as it was. Acyclicity can only be broken
//! by re-parenting an existing step or by merging, so those are the only
//! paths that run a reachability check.
//!
//! # Algorithm Reference
//!
//! Topological order is Kahn's algorithm with insertion order as the
//! tie-break among ready steps.

use super::error::{GraphError, GraphResult};
use super::step::{Step, StepContext, StepOption, TransformFn};
use super::{OptionId, StepId};
use crate::core::{BoxError, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A directed acyclic graph of steps, each with interchangeable options
///
/// # Example
///
/// ```
/// use hodos::{BoxError, Graph, StepId};
///
/// let mut graph = Graph::<String>::new();
/// graph
///     .add_option("step1", "option1", |x: &[String]| -> Result<String, BoxError> {
///         Ok(format!("{} -> step1_option1", x[0]))
///     })
///     .unwrap();
/// graph
///     .add_option("step1", "option2", |x: &[String]| -> Result<String, BoxError> {
///         Ok(format!("{} -> step1_option2", x[0]))
///     })
///     .unwrap();
/// // Unknown steps are created after the latest step.
/// graph.add_noop_option("step2", "default").unwrap();
///
/// assert_eq!(graph.len(), 2);
/// let step2 = graph.get_step(&StepId::from("step2")).unwrap();
/// assert_eq!(step2.parents(), &[StepId::from("step1")]);
/// ```
pub struct Graph<T> {
    steps: HashMap<StepId, Step<T>>,
    insertion_order: Vec<StepId>,
    latest_step: Option<StepId>,
    allow_overwrite: bool,
}

impl<T> Clone for Graph<T> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
            insertion_order: self.insertion_order.clone(),
            latest_step: self.latest_step.clone(),
            allow_overwrite: self.allow_overwrite,
        }
    }
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Graph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("steps", &self.insertion_order)
            .field("latest_step", &self.latest_step)
            .field("allow_overwrite", &self.allow_overwrite)
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Put {
    Add,
    AddDefault,
    Redefine,
}

impl<T> Graph<T> {
    /// Creates an empty graph that rejects redefinitions
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            insertion_order: Vec::new(),
            latest_step: None,
            allow_overwrite: false,
        }
    }

    /// Creates an empty graph with the given overwrite permission
    pub fn with_overwrite(allow_overwrite: bool) -> Self {
        Self {
            allow_overwrite,
            ..Self::new()
        }
    }

    pub fn allow_overwrite(&self) -> bool {
        self.allow_overwrite
    }

    /// Permits (or forbids) redefining existing steps and options
    pub fn set_allow_overwrite(&mut self, allow: bool) {
        self.allow_overwrite = allow;
    }

    /// Returns the number of steps, not counting the virtual root
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains_step(&self, id: &StepId) -> bool {
        self.steps.contains_key(id)
    }

    pub fn step(&self, id: &StepId) -> Option<&Step<T>> {
        self.steps.get(id)
    }

    /// Returns the step or an [`GraphError::UnknownStep`]
    pub fn get_step(&self, id: &StepId) -> GraphResult<&Step<T>> {
        self.steps
            .get(id)
            .ok_or_else(|| GraphError::unknown_step(id.clone()))
    }

    /// Step IDs in insertion order
    pub fn step_ids(&self) -> impl Iterator<Item = &StepId> {
        self.insertion_order.iter()
    }

    /// Steps in insertion order
    pub fn steps(&self) -> impl Iterator<Item = &Step<T>> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.steps.get(id))
    }

    /// The step most recently added or given an option
    pub fn latest_step(&self) -> Option<&StepId> {
        self.latest_step.as_ref()
    }

    /// Steps that read the execution input
    pub fn input_steps(&self) -> Vec<StepId> {
        self.steps()
            .filter(|step| step.is_input())
            .map(|step| step.id().clone())
            .collect()
    }

    /// Steps nothing depends on
    pub fn output_steps(&self) -> Vec<StepId> {
        let with_children: HashSet<&StepId> =
            self.steps.values().flat_map(|step| step.parents()).collect();
        self.insertion_order
            .iter()
            .filter(|id| !with_children.contains(id))
            .cloned()
            .collect()
    }

    /// The latest option of every step, in insertion order
    pub fn latest_options(&self) -> Vec<(StepId, Option<OptionId>)> {
        self.steps()
            .map(|step| (step.id().clone(), step.latest_option().cloned()))
            .collect()
    }

    /// Direct children of `id` in insertion order. Accepts the root.
    pub fn children(&self, id: &StepId) -> Vec<StepId> {
        self.steps()
            .filter(|step| step.parents().contains(id))
            .map(|step| step.id().clone())
            .collect()
    }

    /// All transitive parents of `id`, excluding the root
    pub fn ancestors(&self, id: &StepId) -> GraphResult<HashSet<StepId>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&StepId> = self.get_step(id)?.parents().iter().collect();
        while let Some(parent) = queue.pop_front() {
            if parent.is_root() || !seen.insert(parent.clone()) {
                continue;
            }
            if let Some(step) = self.steps.get(parent) {
                queue.extend(step.parents());
            }
        }
        Ok(seen)
    }

    /// All transitive children of `id`
    pub fn descendants(&self, id: &StepId) -> GraphResult<HashSet<StepId>> {
        if !id.is_root() {
            self.get_step(id)?;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            for child in self.children(&current) {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }
        Ok(seen)
    }

    /// True if `target` is `from` or one of its ancestors
    fn reaches(&self, from: &StepId, target: &StepId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(step) = self.steps.get(current) {
                stack.extend(step.parents());
            }
        }
        false
    }

    /// Returns a valid topological ordering of all steps
    ///
    /// Ties are broken by insertion order, so the result is stable for a
    /// given sequence of edits.
    pub fn topological_order(&self) -> GraphResult<Vec<StepId>> {
        self.kahn(|_| true)
    }

    /// Topological ordering of the given subset of steps
    pub fn order_subgraph(&self, members: &HashSet<StepId>) -> GraphResult<Vec<StepId>> {
        for id in members {
            self.get_step(id)?;
        }
        self.kahn(|id| members.contains(id))
    }

    /// Ancestors of `id` in topological order, followed by `id` itself
    ///
    /// This is the set of steps whose options determine the value of `id`,
    /// and therefore its cache key.
    pub fn lineage(&self, id: &StepId) -> GraphResult<Vec<StepId>> {
        let mut members = self.ancestors(id)?;
        members.insert(id.clone());
        self.order_subgraph(&members)
    }

    fn kahn(&self, member: impl Fn(&StepId) -> bool) -> GraphResult<Vec<StepId>> {
        let selected: Vec<&StepId> = self
            .insertion_order
            .iter()
            .filter(|&id| member(id))
            .collect();

        let mut in_degrees: HashMap<&StepId, usize> = HashMap::with_capacity(selected.len());
        let mut children: HashMap<&StepId, Vec<&StepId>> = HashMap::new();
        for &id in &selected {
            let mut degree = 0;
            if let Some(step) = self.steps.get(id) {
                for parent in step.parents().iter().filter(|&p| member(p)) {
                    degree += 1;
                    children.entry(parent).or_default().push(id);
                }
            }
            in_degrees.insert(id, degree);
        }

        let mut queue: VecDeque<&StepId> = selected
            .iter()
            .copied()
            .filter(|id| in_degrees.get(id) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(selected.len());

        while let Some(node) = queue.pop_front() {
            result.push(node.clone());
            for child in children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degrees.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }

        if result.len() != selected.len() {
            let stuck: Vec<String> = selected
                .iter()
                .filter(|id| !result.contains(id))
                .map(|id| id.to_string())
                .collect();
            return Err(GraphError::CyclicGraph {
                path: format!("steps {} depend on each other", stuck.join(", ")),
            });
        }

        Ok(result)
    }

    /// Checks that every parent exists and that the graph is acyclic
    pub fn validate(&self) -> GraphResult<()> {
        for step in self.steps() {
            for parent in step.parents() {
                if !parent.is_root() && !self.steps.contains_key(parent) {
                    return Err(GraphError::unknown_parent(
                        step.id().clone(),
                        parent.clone(),
                    ));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    fn check_not_reserved(id: &StepId) -> GraphResult<()> {
        if id.is_root() {
            return Err(GraphError::reserved(id.clone()));
        }
        Ok(())
    }

    fn normalize_parents(
        &self,
        id: &StepId,
        parents: impl IntoIterator<Item = StepId>,
    ) -> GraphResult<Vec<StepId>> {
        let mut normalized = Vec::new();
        for parent in parents {
            if &parent == id {
                return Err(GraphError::cycle(&parent, id));
            }
            if !parent.is_root() && !self.steps.contains_key(&parent) {
                return Err(GraphError::unknown_parent(id.clone(), parent));
            }
            if !normalized.contains(&parent) {
                normalized.push(parent);
            }
        }
        if normalized.is_empty() {
            normalized.push(StepId::root());
        }
        Ok(normalized)
    }

    /// Adds a step with the given parents, in input order
    ///
    /// An empty parent list makes the step an input step. Re-declaring an
    /// existing step replaces its parents and requires overwrite permission.
    pub fn add_step<S: Into<StepId>>(
        &mut self,
        id: impl Into<StepId>,
        parents: impl IntoIterator<Item = S>,
    ) -> GraphResult<()> {
        let id = id.into();
        Self::check_not_reserved(&id)?;
        let parents = self.normalize_parents(&id, parents.into_iter().map(Into::into))?;

        if self.steps.contains_key(&id) {
            if !self.allow_overwrite {
                return Err(GraphError::duplicate_step(id));
            }
            if let Some(parent) = parents.iter().find(|p| self.reaches(p, &id)) {
                return Err(GraphError::cycle(parent, &id));
            }
            if let Some(step) = self.steps.get_mut(&id) {
                step.set_parents(parents);
            }
            debug!(step = %id, "redefined step parents");
        } else {
            self.insertion_order.push(id.clone());
            self.steps.insert(id.clone(), Step::new(id.clone(), parents));
            debug!(step = %id, "added step");
        }

        self.latest_step = Some(id);
        Ok(())
    }

    /// Adds a step that reads the execution input
    pub fn add_input_step(&mut self, id: impl Into<StepId>) -> GraphResult<()> {
        self.add_step(id, std::iter::empty::<StepId>())
    }

    /// Inserts a new step directly below `parent`
    ///
    /// Every existing child of `parent` is re-pointed at the new step, so the
    /// new step sits between `parent` and its former children. Passing
    /// [`StepId::root`] inserts a new first stage in front of every input
    /// step.
    pub fn insert_step(
        &mut self,
        id: impl Into<StepId>,
        parent: impl Into<StepId>,
    ) -> GraphResult<()> {
        let id = id.into();
        let parent = parent.into();
        Self::check_not_reserved(&id)?;
        if self.steps.contains_key(&id) {
            return Err(GraphError::duplicate_step(id));
        }
        let parents = self.normalize_parents(&id, [parent.clone()])?;

        let children = self.children(&parent);
        self.insertion_order.push(id.clone());
        self.steps.insert(id.clone(), Step::new(id.clone(), parents));
        for child in &children {
            if let Some(step) = self.steps.get_mut(child) {
                step.replace_parent(&parent, &id);
            }
        }

        debug!(step = %id, parent = %parent, moved = children.len(), "inserted step");
        self.latest_step = Some(id);
        Ok(())
    }

    /// Removes a step together with everything downstream of it
    ///
    /// Returns the removed step IDs in insertion order.
    pub fn remove_step(&mut self, id: &StepId) -> GraphResult<Vec<StepId>> {
        Self::check_not_reserved(id)?;
        let mut doomed = self.descendants(id)?;
        doomed.insert(id.clone());

        let removed: Vec<StepId> = self
            .insertion_order
            .iter()
            .filter(|step| doomed.contains(*step))
            .cloned()
            .collect();
        self.insertion_order.retain(|step| !doomed.contains(step));
        self.steps.retain(|step, _| !doomed.contains(step));

        if self
            .latest_step
            .as_ref()
            .is_some_and(|latest| doomed.contains(latest))
        {
            self.latest_step = self.insertion_order.last().cloned();
        }

        debug!(step = %id, removed = removed.len(), "removed step and descendants");
        Ok(removed)
    }

    /// Removes one option from a step
    pub fn remove_option(&mut self, step: &StepId, option: &OptionId) -> GraphResult<()> {
        let node = self
            .steps
            .get_mut(step)
            .ok_or_else(|| GraphError::unknown_step(step.clone()))?;
        if !node.remove_option(option) {
            return Err(GraphError::unknown_option(step.clone(), option.clone()));
        }
        Ok(())
    }

    pub fn set_default_option(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
    ) -> GraphResult<()> {
        let (step, option) = (step.into(), option.into());
        let node = self.existing_option_mut(&step, &option)?;
        node.set_default(option);
        Ok(())
    }

    pub fn set_latest_option(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
    ) -> GraphResult<()> {
        let (step, option) = (step.into(), option.into());
        let node = self.existing_option_mut(&step, &option)?;
        node.set_latest(option);
        Ok(())
    }

    fn existing_option_mut(
        &mut self,
        step: &StepId,
        option: &OptionId,
    ) -> GraphResult<&mut Step<T>> {
        let node = self
            .steps
            .get_mut(step)
            .ok_or_else(|| GraphError::unknown_step(step.clone()))?;
        if !node.contains_option(option) {
            return Err(GraphError::unknown_option(step.clone(), option.clone()));
        }
        Ok(node)
    }

    fn put_option(
        &mut self,
        step: StepId,
        option: OptionId,
        value: StepOption<T>,
        mode: Put,
    ) -> GraphResult<()> {
        Self::check_not_reserved(&step)?;

        if !self.steps.contains_key(&step) {
            if mode == Put::Redefine {
                return Err(GraphError::unknown_step(step));
            }
            let parents = self.normalize_parents(&step, self.latest_step.clone())?;
            self.insertion_order.push(step.clone());
            self.steps.insert(step.clone(), Step::new(step.clone(), parents));
            debug!(step = %step, "created step after latest step");
        }

        let allow_overwrite = self.allow_overwrite;
        let node = self
            .steps
            .get_mut(&step)
            .ok_or_else(|| GraphError::unknown_step(step.clone()))?;
        let exists = node.contains_option(&option);
        if mode == Put::Redefine && !exists {
            return Err(GraphError::unknown_option(step, option));
        }
        if exists && !allow_overwrite {
            return Err(GraphError::duplicate_option(step, option));
        }

        node.put_option(option.clone(), value);
        if mode == Put::AddDefault {
            node.set_default(option.clone());
        }

        debug!(step = %step, option = %option, replaced = exists, "registered option");
        self.latest_step = Some(step);
        Ok(())
    }

    /// Merges `other` into this graph as a single all-or-nothing edit
    ///
    /// Steps present in both graphs gain the union of their parents and
    /// options. Overlapping options follow this graph's overwrite
    /// permission. On error this graph is unchanged.
    pub fn merge(&mut self, other: Graph<T>) -> GraphResult<()> {
        let mut merged = self.clone();
        let allow_overwrite = merged.allow_overwrite;

        for id in other.topological_order()? {
            let Some(incoming) = other.steps.get(&id) else {
                continue;
            };
            match merged.steps.get_mut(&id) {
                Some(existing) => {
                    let mut parents = existing.parents().to_vec();
                    for parent in incoming.parents() {
                        if !parents.contains(parent) {
                            parents.push(parent.clone());
                        }
                    }
                    existing.set_parents(parents);

                    for (option_id, option) in incoming.options() {
                        if existing.contains_option(option_id) && !allow_overwrite {
                            return Err(GraphError::duplicate_option(
                                id.clone(),
                                option_id.clone(),
                            ));
                        }
                        existing.put_option(option_id.clone(), option.clone());
                    }
                    if let Some(default) = incoming.default_option() {
                        existing.set_default(default.clone());
                    }
                    if let Some(latest) = incoming.latest_option() {
                        existing.set_latest(latest.clone());
                    }
                }
                None => {
                    merged.insertion_order.push(id.clone());
                    merged.steps.insert(id.clone(), incoming.clone());
                }
            }
        }

        merged.validate()?;
        if other.latest_step.is_some() {
            merged.latest_step = other.latest_step;
        }

        debug!(steps = merged.len(), "merged graphs");
        *self = merged;
        Ok(())
    }
}

impl<T: Value> Graph<T> {
    /// Registers an option computed from the step's inputs
    ///
    /// If `step` does not exist it is created as a child of the latest
    /// step, or as an input step when the graph is empty.
    pub fn add_option<F, E>(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
        transform: F,
    ) -> GraphResult<()>
    where
        F: Fn(&[T]) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.put_option(step.into(), option.into(), wrap(transform), Put::Add)
    }

    /// Like [`add_option`](Self::add_option) but the transform also sees
    /// where in the graph it is running
    pub fn add_option_with_context<F, E>(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
        transform: F,
    ) -> GraphResult<()>
    where
        F: Fn(&[T], &StepContext) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let transform: TransformFn<T> = Arc::new(
            move |inputs: &[T], ctx: &StepContext| -> Result<T, BoxError> {
                transform(inputs, ctx).map_err(Into::into)
            },
        );
        self.put_option(
            step.into(),
            option.into(),
            StepOption::from_transform(transform),
            Put::Add,
        )
    }

    /// Registers an option and makes it the step's default
    pub fn add_default_option<F, E>(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
        transform: F,
    ) -> GraphResult<()>
    where
        F: Fn(&[T]) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.put_option(step.into(), option.into(), wrap(transform), Put::AddDefault)
    }

    /// Registers an option that passes its first input through unchanged
    pub fn add_noop_option(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
    ) -> GraphResult<()> {
        self.put_option(step.into(), option.into(), StepOption::noop(), Put::Add)
    }

    /// Replaces the transform of an existing option
    ///
    /// Requires overwrite permission. Values cached under the old
    /// transform stay valid keys and are not invalidated.
    pub fn redefine_option<F, E>(
        &mut self,
        step: impl Into<StepId>,
        option: impl Into<OptionId>,
        transform: F,
    ) -> GraphResult<()>
    where
        F: Fn(&[T]) -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        self.put_option(step.into(), option.into(), wrap(transform), Put::Redefine)
    }
}

fn wrap<T, F, E>(transform: F) -> StepOption<T>
where
    T: Value,
    F: Fn(&[T]) -> Result<T, E> + Send + Sync + 'static,
    E: Into<BoxError>,
{
    StepOption::from_transform(Arc::new(
        move |inputs: &[T], _: &StepContext| -> Result<T, BoxError> {
            transform(inputs).map_err(Into::into)
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &'static str) -> impl Fn(&[String]) -> Result<String, BoxError> + Send + Sync {
        move |inputs: &[String]| Ok(format!("{}>{name}", inputs.join("+")))
    }

    fn id(name: &str) -> StepId {
        StepId::from(name)
    }

    fn chain() -> Graph<String> {
        let mut graph = Graph::new();
        graph.add_option("a", "a1", tag("a1")).unwrap();
        graph.add_option("a", "a2", tag("a2")).unwrap();
        graph.add_option("b", "b1", tag("b1")).unwrap();
        graph.add_option("c", "c1", tag("c1")).unwrap();
        graph
    }

    #[test]
    fn test_add_option_chains_new_steps() {
        let graph = chain();
        assert_eq!(graph.get_step(&id("a")).unwrap().parents(), &[StepId::root()]);
        assert_eq!(graph.get_step(&id("b")).unwrap().parents(), &[id("a")]);
        assert_eq!(graph.get_step(&id("c")).unwrap().parents(), &[id("b")]);
        assert_eq!(graph.latest_step(), Some(&id("c")));
        assert_eq!(graph.input_steps(), vec![id("a")]);
        assert_eq!(graph.output_steps(), vec![id("c")]);
    }

    #[test]
    fn test_duplicate_option_requires_overwrite() {
        let mut graph = chain();
        let err = graph.add_option("a", "a1", tag("again")).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateOption { .. }));

        graph.set_allow_overwrite(true);
        graph.add_option("a", "a1", tag("again")).unwrap();
        assert_eq!(graph.get_step(&id("a")).unwrap().option_count(), 2);
        assert_eq!(
            graph.get_step(&id("a")).unwrap().latest_option(),
            Some(&OptionId::from("a1"))
        );
    }

    #[test]
    fn test_redefine_unknown_option_fails() {
        let mut graph = Graph::<String>::with_overwrite(true);
        graph.add_option("a", "a1", tag("a1")).unwrap();
        assert!(matches!(
            graph.redefine_option("a", "zz", tag("zz")),
            Err(GraphError::UnknownOption { .. })
        ));
        assert!(matches!(
            graph.redefine_option("nope", "a1", tag("a1")),
            Err(GraphError::UnknownStep { .. })
        ));
        graph.redefine_option("a", "a1", tag("new")).unwrap();
    }

    #[test]
    fn test_unknown_parent_and_self_parent() {
        let mut graph = chain();
        assert!(matches!(
            graph.add_step("d", ["missing"]),
            Err(GraphError::UnknownParent { .. })
        ));
        assert!(matches!(
            graph.add_step("d", ["d"]),
            Err(GraphError::CyclicGraph { .. })
        ));
        assert!(!graph.contains_step(&id("d")));
    }

    #[test]
    fn test_reparenting_onto_descendant_is_a_cycle() {
        let mut graph = chain();
        graph.set_allow_overwrite(true);
        let before = graph.get_step(&id("a")).unwrap().parents().to_vec();

        let err = graph.add_step("a", ["c"]).unwrap_err();
        assert!(matches!(err, GraphError::CyclicGraph { .. }));
        assert_eq!(graph.get_step(&id("a")).unwrap().parents(), &before[..]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_root_is_reserved() {
        let mut graph = Graph::<String>::new();
        assert!(matches!(
            graph.add_option("ROOT", "x", tag("x")),
            Err(GraphError::ReservedStep { .. })
        ));
        assert!(matches!(
            graph.add_input_step(StepId::root()),
            Err(GraphError::ReservedStep { .. })
        ));
    }

    #[test]
    fn test_remove_step_takes_descendants() {
        let mut graph = chain();
        graph.add_step("side", ["a"]).unwrap();
        graph.add_noop_option("side", "s").unwrap();

        let removed = graph.remove_step(&id("b")).unwrap();
        assert_eq!(removed, vec![id("b"), id("c")]);
        assert!(graph.contains_step(&id("side")));
        assert_eq!(graph.latest_step(), Some(&id("side")));
        graph.validate().unwrap();
    }

    #[test]
    fn test_insert_step_repoints_children() {
        let mut graph = chain();
        graph.insert_step("between", "a").unwrap();
        assert_eq!(graph.get_step(&id("b")).unwrap().parents(), &[id("between")]);
        assert_eq!(graph.get_step(&id("between")).unwrap().parents(), &[id("a")]);
        assert_eq!(
            graph.topological_order().unwrap(),
            vec![id("a"), id("between"), id("b"), id("c")]
        );

        graph.insert_step("first", StepId::root()).unwrap();
        assert_eq!(graph.get_step(&id("a")).unwrap().parents(), &[id("first")]);
        assert_eq!(graph.input_steps(), vec![id("first")]);
    }

    #[test]
    fn test_topological_order_is_deterministic() {
        let mut graph = Graph::<String>::new();
        graph.add_input_step("x").unwrap();
        graph.add_input_step("y").unwrap();
        graph.add_step("join", ["y", "x"]).unwrap();
        graph.add_step("after_x", ["x"]).unwrap();

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec![id("x"), id("y"), id("after_x"), id("join")]);
        assert_eq!(graph.get_step(&id("join")).unwrap().parents(), &[id("y"), id("x")]);
    }

    #[test]
    fn test_lineage_ends_with_step() {
        let mut graph = chain();
        graph.add_step("side", ["a"]).unwrap();
        assert_eq!(graph.lineage(&id("c")).unwrap(), vec![id("a"), id("b"), id("c")]);
        assert_eq!(graph.lineage(&id("side")).unwrap(), vec![id("a"), id("side")]);
    }

    #[test]
    fn test_merge_unions_options() {
        let mut left = chain();
        let mut right = Graph::<String>::new();
        right.add_option("a", "a3", tag("a3")).unwrap();
        right.add_step("d", ["a"]).unwrap();
        right.add_noop_option("d", "d1").unwrap();

        left.merge(right).unwrap();
        assert_eq!(left.get_step(&id("a")).unwrap().option_count(), 3);
        assert_eq!(left.get_step(&id("d")).unwrap().parents(), &[id("a")]);
        assert_eq!(left.latest_step(), Some(&id("d")));
    }

    #[test]
    fn test_failed_merge_leaves_graph_unchanged() {
        let mut left = chain();
        let mut right = Graph::<String>::new();
        right.add_option("z", "z1", tag("z1")).unwrap();
        right.add_option("a", "a1", tag("dup")).unwrap();

        let err = left.merge(right).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateOption { .. }));
        assert!(!left.contains_step(&id("z")));
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn test_merge_detects_cycles() {
        let mut left = Graph::<String>::new();
        left.add_input_step("p").unwrap();
        left.add_step("q", ["p"]).unwrap();

        let mut right = Graph::<String>::new();
        right.add_input_step("q").unwrap();
        right.add_step("p", ["q"]).unwrap();

        assert!(matches!(
            left.merge(right),
            Err(GraphError::CyclicGraph { .. })
        ));
        assert_eq!(left.get_step(&id("p")).unwrap().parents(), &[StepId::root()]);
    }
}
