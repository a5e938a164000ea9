//! Statically declared task graph.
//!
//! Tasks and their dependency edges are declared once at startup. The graph
//! is validated when it is built: duplicate names, dangling dependencies and
//! cycles are rejected before any task runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::task::Action;

/// A named task with its dependencies and optional action.
///
/// A task without an action only groups its dependencies.
#[derive(Clone)]
pub struct TaskSpec {
    name: String,
    deps: Vec<String>,
    description: String,
    action: Option<Arc<dyn Action>>,
}

impl TaskSpec {
    /// Declare a task with no dependencies and no action.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deps: Vec::new(),
            description: String::new(),
            action: None,
        }
    }

    /// Add tasks that must complete before this one starts.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Set the description shown by `labs tasks`.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the work performed when the task runs.
    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies, in declaration order.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    /// Description, empty if none was set.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn action_handle(&self) -> Option<Arc<dyn Action>> {
        self.action.clone()
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

/// Errors found while validating or planning the graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Task '{0}' is declared more than once")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on '{dependency}', which is not declared")]
    MissingDependency { task: String, dependency: String },

    #[error("Task '{0}' depends on itself")]
    SelfDependency(String),

    /// Tasks on the cycle, each depending on the next.
    #[error("Cyclic dependency: {}", format_cycle(.0))]
    Cycle(Vec<String>),

    #[error("Task '{0}' is not in this project")]
    UnknownTask(String),
}

fn format_cycle(names: &[String]) -> String {
    match names.first() {
        Some(first) => format!("{} → {}", names.join(" → "), first),
        None => String::new(),
    }
}

/// Tasks grouped into dependency levels.
///
/// Every task in a level depends only on tasks from earlier levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    levels: Vec<Vec<String>>,
}

impl Plan {
    /// Levels in execution order.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// All planned tasks in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// A validated set of tasks. Edges point from a dependency to its dependent.
pub struct TaskGraph {
    graph: DiGraph<usize, ()>,
    index: HashMap<String, NodeIndex>,
    tasks: Vec<TaskSpec>,
}

impl TaskGraph {
    /// Build and validate a graph from its task declarations.
    pub fn new(tasks: Vec<TaskSpec>) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for (i, task) in tasks.iter().enumerate() {
            if index.contains_key(&task.name) {
                return Err(GraphError::DuplicateTask(task.name.clone()));
            }
            index.insert(task.name.clone(), graph.add_node(i));
        }

        for task in &tasks {
            let consumer = index[&task.name];
            for dep in &task.deps {
                if dep == &task.name {
                    return Err(GraphError::SelfDependency(task.name.clone()));
                }
                let Some(&producer) = index.get(dep) else {
                    return Err(GraphError::MissingDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                graph.update_edge(producer, consumer, ());
            }
        }

        let engine = Self {
            graph,
            index,
            tasks,
        };
        engine.detect_cycles()?;

        Ok(engine)
    }

    fn detect_cycles(&self) -> Result<(), GraphError> {
        use petgraph::algo::kosaraju_scc;

        for scc in kosaraju_scc(&self.graph) {
            if scc.len() > 1 {
                return Err(GraphError::Cycle(
                    self.cycle_path(&scc)
                        .into_iter()
                        .map(|idx| self.tasks[self.graph[idx]].name.clone())
                        .collect(),
                ));
            }
        }

        Ok(())
    }

    /// Shortest walk along "depends on" edges from the first declared member
    /// of a strongly connected component back to itself.
    fn cycle_path(&self, scc: &[NodeIndex]) -> Vec<NodeIndex> {
        let members: HashSet<NodeIndex> = scc.iter().copied().collect();
        let Some(&start) = scc.iter().min_by_key(|&&idx| self.graph[idx]) else {
            return Vec::new();
        };

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let mut deps: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter(|dep| members.contains(dep))
                .collect();
            deps.sort_by_key(|&idx| self.graph[idx]);

            for dep in deps {
                if dep == start {
                    let mut path = vec![node];
                    while let Some(&prev) = parent.get(path.last().unwrap_or(&start)) {
                        path.push(prev);
                    }
                    path.reverse();
                    return path;
                }
                if !parent.contains_key(&dep) {
                    parent.insert(dep, node);
                    queue.push_back(dep);
                }
            }
        }

        scc.to_vec()
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.index
            .get(name)
            .map(|&idx| &self.tasks[self.graph[idx]])
    }

    /// Whether a task called `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Plan a run of `targets` and everything they transitively depend on.
    pub fn plan<S: AsRef<str>>(&self, targets: &[S]) -> Result<Plan, GraphError> {
        let mut closure = HashSet::new();
        let mut stack = Vec::new();

        for target in targets {
            let target = target.as_ref();
            let &idx = self
                .index
                .get(target)
                .ok_or_else(|| GraphError::UnknownTask(target.to_string()))?;
            stack.push(idx);
        }

        while let Some(idx) = stack.pop() {
            if closure.insert(idx) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Incoming));
            }
        }

        let mut levels = Vec::new();
        let mut completed = HashSet::new();

        while completed.len() < closure.len() {
            let mut ready: Vec<NodeIndex> = closure
                .iter()
                .copied()
                .filter(|idx| !completed.contains(idx))
                .filter(|&idx| {
                    self.graph
                        .neighbors_directed(idx, Direction::Incoming)
                        .all(|dep| completed.contains(&dep))
                })
                .collect();

            // Acyclic by construction, so some task is always ready.
            debug_assert!(!ready.is_empty());
            if ready.is_empty() {
                break;
            }

            ready.sort_by_key(|&idx| self.graph[idx]);
            completed.extend(ready.iter().copied());
            levels.push(
                ready
                    .into_iter()
                    .map(|idx| self.tasks[self.graph[idx]].name.clone())
                    .collect(),
            );
        }

        Ok(Plan { levels })
    }
}

impl fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.tasks)
            .finish()
    }
}
