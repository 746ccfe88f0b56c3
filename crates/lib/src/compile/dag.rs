//! Package dependency graph.
//!
//! Packages live in a petgraph arena with an edge from every dependency to its
//! dependent. The graph is allowed to contain cycles so that they can be
//! reported with their members; ordering operations reject them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::release::Package;
use crate::util::hash::{ContentHash, Fingerprint, Hashable};

use super::types::CompileError;

#[derive(Debug, Clone)]
pub struct PackageGraph {
  graph: DiGraph<Package, ()>,
  nodes: HashMap<String, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  InProgress,
  Done,
}

/// Everything a package fingerprint is derived from.
#[derive(Serialize)]
struct FingerprintInput<'a> {
  name: &'a str,
  source_digest: &'a ContentHash,
  dependencies: Vec<(&'a str, &'a Fingerprint)>,
}

impl Hashable for FingerprintInput<'_> {}

impl PackageGraph {
  /// Build the graph, rejecting duplicate names and dependencies on packages
  /// that are not part of the set.
  pub fn new(packages: Vec<Package>) -> Result<Self, CompileError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for package in packages {
      let name = package.name.clone();
      if nodes.contains_key(&name) {
        return Err(CompileError::DuplicatePackage(name));
      }
      let idx = graph.add_node(package);
      nodes.insert(name, idx);
    }

    let mut edges = Vec::new();
    for idx in graph.node_indices() {
      let package = &graph[idx];
      for dependency in &package.dependencies {
        let Some(&dep_idx) = nodes.get(dependency) else {
          return Err(CompileError::UnknownDependency {
            package: package.name.clone(),
            dependency: dependency.clone(),
          });
        };
        edges.push((dep_idx, idx));
      }
    }
    for (from, to) in edges {
      graph.add_edge(from, to, ());
    }

    Ok(Self { graph, nodes })
  }

  pub fn contains(&self, name: &str) -> bool {
    self.nodes.contains_key(name)
  }

  pub fn get(&self, name: &str) -> Option<&Package> {
    self.nodes.get(name).map(|&idx| &self.graph[idx])
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Package names in lexical order.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.nodes.keys().cloned().collect();
    names.sort();
    names
  }

  /// Find a dependency cycle, returning its members in dependency order
  /// (each member depends on the next, the last on the first).
  pub fn detect_cycle(&self) -> Option<Vec<String>> {
    let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();
    let mut path: Vec<NodeIndex> = Vec::new();

    for name in self.names() {
      let idx = self.nodes[&name];
      if !marks.contains_key(&idx)
        && let Some(cycle) = self.visit(idx, &mut marks, &mut path)
      {
        return Some(cycle);
      }
    }
    None
  }

  fn visit(
    &self,
    idx: NodeIndex,
    marks: &mut HashMap<NodeIndex, Mark>,
    path: &mut Vec<NodeIndex>,
  ) -> Option<Vec<String>> {
    marks.insert(idx, Mark::InProgress);
    path.push(idx);

    for dep_idx in self.sorted_dependencies(idx) {
      match marks.get(&dep_idx) {
        Some(Mark::InProgress) => {
          let start = path.iter().position(|&n| n == dep_idx).unwrap_or(0);
          return Some(path[start..].iter().map(|&n| self.graph[n].name.clone()).collect());
        }
        Some(Mark::Done) => {}
        None => {
          if let Some(cycle) = self.visit(dep_idx, marks, path) {
            return Some(cycle);
          }
        }
      }
    }

    path.pop();
    marks.insert(idx, Mark::Done);
    None
  }

  fn sorted_dependencies(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut deps: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Incoming).collect();
    deps.sort_by(|a, b| self.graph[*a].name.cmp(&self.graph[*b].name));
    deps.dedup();
    deps
  }

  /// Topological order, dependencies first. Among packages that are ready at
  /// the same time the lexically smallest name goes first.
  pub fn compile_order(&self) -> Result<Vec<String>, CompileError> {
    let mut in_degree: HashMap<NodeIndex, usize> = self
      .graph
      .node_indices()
      .map(|idx| (idx, self.sorted_dependencies(idx).len()))
      .collect();

    let mut ready: BTreeSet<(String, NodeIndex)> = in_degree
      .iter()
      .filter(|&(_, &deg)| deg == 0)
      .map(|(&idx, _)| (self.graph[idx].name.clone(), idx))
      .collect();

    let mut order = Vec::with_capacity(self.len());
    while let Some((name, idx)) = ready.pop_first() {
      order.push(name);

      let mut dependents: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Outgoing).collect();
      dependents.sort();
      dependents.dedup();
      for dependent in dependents {
        if let Some(deg) = in_degree.get_mut(&dependent) {
          *deg = deg.saturating_sub(1);
          if *deg == 0 {
            ready.insert((self.graph[dependent].name.clone(), dependent));
          }
        }
      }
    }

    if order.len() != self.len() {
      return Err(CompileError::DependencyCycle {
        cycle: self.detect_cycle().unwrap_or_default(),
      });
    }
    Ok(order)
  }

  /// Group packages into waves. Every dependency of a package in wave `n` is
  /// in a wave before `n`. Names within a wave are sorted.
  pub fn waves(&self) -> Result<Vec<Vec<String>>, CompileError> {
    let mut level: HashMap<String, usize> = HashMap::new();
    let mut waves: Vec<Vec<String>> = Vec::new();

    for name in self.compile_order()? {
      let package = &self.graph[self.nodes[&name]];
      let wave = package
        .dependencies
        .iter()
        .filter_map(|dep| level.get(dep))
        .map(|l| l + 1)
        .max()
        .unwrap_or(0);

      if waves.len() <= wave {
        waves.resize_with(wave + 1, Vec::new);
      }
      waves[wave].push(name.clone());
      level.insert(name, wave);
    }

    for wave in &mut waves {
      wave.sort();
    }
    Ok(waves)
  }

  /// Fingerprint of every package. A fingerprint covers the package's name,
  /// its source digest and the fingerprints of its direct dependencies, so a
  /// change anywhere upstream changes it.
  pub fn fingerprints(&self) -> Result<BTreeMap<String, Fingerprint>, CompileError> {
    let mut fingerprints: BTreeMap<String, Fingerprint> = BTreeMap::new();

    for name in self.compile_order()? {
      let package = &self.graph[self.nodes[&name]];
      let dependencies = package
        .dependencies
        .iter()
        .filter_map(|dep| fingerprints.get(dep).map(|fp| (dep.as_str(), fp)))
        .collect();

      let fingerprint = FingerprintInput {
        name: &package.name,
        source_digest: &package.source_digest,
        dependencies,
      }
      .compute_fingerprint()?;

      fingerprints.insert(name, fingerprint);
    }

    Ok(fingerprints)
  }
}
