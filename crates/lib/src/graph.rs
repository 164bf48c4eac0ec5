//! The target graph.
//!
//! Owns every registered [`Target`] in registration order and answers the
//! structural questions the scheduler asks: is the graph well formed, which
//! targets does a goal need, and in what order do they run.
//!
//! Ordering edges come from `depends_on`, `after` and `consumes`. Only
//! `depends_on` pulls targets into a closure; the other two merely order
//! targets that are scheduled anyway.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{debug, trace};

use crate::target::Target;

/// Errors raised while building or querying a graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("target '{0}' is already registered")]
  DuplicateTarget(String),

  #[error("target '{target}' references unknown target '{reference}' in {relation}")]
  UnknownTarget {
    target: String,
    relation: &'static str,
    reference: String,
  },

  #[error("cyclic dependency: {}", .cycle.join(" -> "))]
  CyclicDependency { cycle: Vec<String> },

  #[error("no target named '{0}'")]
  TargetNotFound(String),
}

/// All targets of a pipeline plus their edges.
#[derive(Debug, Default, Clone)]
pub struct TargetGraph {
  targets: Vec<Target>,
  index: HashMap<String, usize>,
}

impl TargetGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a target. Names must be unique.
  pub fn register(&mut self, target: Target) -> Result<(), GraphError> {
    if self.index.contains_key(target.name()) {
      return Err(GraphError::DuplicateTarget(target.name().to_string()));
    }
    trace!(name = %target.name(), "registering target");
    self.index.insert(target.name().to_string(), self.targets.len());
    self.targets.push(target);
    Ok(())
  }

  /// Build a graph from targets in order, failing on the first duplicate.
  pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Result<Self, GraphError> {
    let mut graph = Self::new();
    for target in targets {
      graph.register(target)?;
    }
    Ok(graph)
  }

  pub fn get(&self, name: &str) -> Option<&Target> {
    self.index.get(name).map(|&i| &self.targets[i])
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Targets in registration order.
  pub fn iter(&self) -> impl Iterator<Item = &Target> {
    self.targets.iter()
  }

  /// Target names in registration order.
  pub fn names(&self) -> Vec<String> {
    self.targets.iter().map(|t| t.name().to_string()).collect()
  }

  /// Check that every reference resolves and the ordering edges are acyclic.
  pub fn validate(&self) -> Result<(), GraphError> {
    for target in &self.targets {
      for (relation, reference) in target.references() {
        if !self.contains(reference) {
          return Err(GraphError::UnknownTarget {
            target: target.name().to_string(),
            relation,
            reference: reference.to_string(),
          });
        }
      }
    }

    let graph = self.ordering_graph();
    if let Err(cycle) = toposort(&graph, None) {
      let cycle = self.trace_cycle(&graph, cycle.node_id());
      debug!(cycle = %cycle.join(" -> "), "cycle detected");
      return Err(GraphError::CyclicDependency { cycle });
    }

    debug!(targets = self.targets.len(), "graph validated");
    Ok(())
  }

  /// The goal plus everything reachable from it through `depends_on`.
  pub fn closure_for(&self, goal: &str) -> Result<BTreeSet<String>, GraphError> {
    self.closure_for_all([goal])
  }

  /// Union of the closures of several goals.
  pub fn closure_for_all<'a>(&self, goals: impl IntoIterator<Item = &'a str>) -> Result<BTreeSet<String>, GraphError> {
    let mut closure = BTreeSet::new();
    let mut stack = Vec::new();

    for goal in goals {
      if !self.contains(goal) {
        return Err(GraphError::TargetNotFound(goal.to_string()));
      }
      stack.push(goal.to_string());
    }

    while let Some(name) = stack.pop() {
      if !closure.insert(name.clone()) {
        continue;
      }
      if let Some(target) = self.get(&name) {
        stack.extend(target.depends_on().iter().filter(|d| !closure.contains(*d)).cloned());
      }
    }

    Ok(closure)
  }

  /// Topological order of `members`, ties broken by registration order.
  ///
  /// Only edges between members count, so an `after` edge to a target that is
  /// not in the set imposes nothing.
  pub fn order_for(&self, members: &BTreeSet<String>) -> Result<Vec<String>, GraphError> {
    let mut ids = Vec::with_capacity(members.len());
    for name in members {
      let id = self.index.get(name).ok_or_else(|| GraphError::TargetNotFound(name.clone()))?;
      ids.push(*id);
    }
    let member_ids: HashSet<usize> = ids.iter().copied().collect();

    let mut in_degree: HashMap<usize, usize> = HashMap::new();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

    for &id in &ids {
      let predecessors: HashSet<usize> = self.targets[id]
        .ordering_predecessors()
        .filter_map(|p| self.index.get(p).copied())
        .filter(|p| member_ids.contains(p))
        .collect();
      in_degree.insert(id, predecessors.len());
      for pred in predecessors {
        dependents.entry(pred).or_default().push(id);
      }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = ids
      .iter()
      .filter(|id| in_degree.get(id).copied() == Some(0))
      .map(|&id| Reverse(id))
      .collect();

    let mut order = Vec::with_capacity(ids.len());
    while let Some(Reverse(id)) = ready.pop() {
      order.push(self.targets[id].name().to_string());
      for &next in dependents.get(&id).map(Vec::as_slice).unwrap_or_default() {
        if let Some(degree) = in_degree.get_mut(&next) {
          *degree -= 1;
          if *degree == 0 {
            ready.push(Reverse(next));
          }
        }
      }
    }

    if order.len() < ids.len() {
      // Only reachable on an unvalidated graph.
      self.validate()?;
      return Err(GraphError::CyclicDependency {
        cycle: members.iter().filter(|m| !order.contains(m)).cloned().collect(),
      });
    }

    Ok(order)
  }

  /// Targets whose `triggered_by` names `name`, in registration order.
  pub fn triggered_from(&self, name: &str) -> Vec<&Target> {
    self
      .targets
      .iter()
      .filter(|t| t.triggered_by().iter().any(|s| s == name))
      .collect()
  }

  /// Edges run from predecessor to dependent; node weights are registration indices.
  fn ordering_graph(&self) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(self.targets.len(), 0);
    let nodes: Vec<NodeIndex> = (0..self.targets.len()).map(|i| graph.add_node(i)).collect();

    for (i, target) in self.targets.iter().enumerate() {
      let mut seen = HashSet::new();
      for pred in target.ordering_predecessors() {
        if let Some(&p) = self.index.get(pred)
          && seen.insert(p)
        {
          graph.add_edge(nodes[p], nodes[i], ());
        }
      }
    }

    graph
  }

  /// Walk from `start` back to itself and name the cycle in dependency
  /// direction (`A -> B` reads "A depends on B").
  fn trace_cycle(&self, graph: &DiGraph<usize, ()>, start: NodeIndex) -> Vec<String> {
    let name = |node: NodeIndex| self.targets[graph[node]].name().to_string();

    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
      for next in graph.neighbors(node) {
        if next == start {
          let mut cycle = vec![name(start), name(node)];
          let mut current = node;
          while current != start {
            let Some(&up) = parent.get(&current) else {
              break;
            };
            cycle.push(name(up));
            current = up;
          }
          return cycle;
        }
        if seen.insert(next) {
          parent.insert(next, node);
          queue.push_back(next);
        }
      }
    }

    vec![name(start)]
  }
}
