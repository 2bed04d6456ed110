//! Transitive dependency resolution
//!
//! [`DependencyResolver::resolve`] works in two passes without recursion, so
//! deep or cyclic graphs cannot overflow the call stack and no traversal
//! state outlives a single call.
//!
//! The first pass selects one version per module name, breadth-first. Edges
//! that are required along the whole chain from the root are examined before
//! any optional edge, so a module that a required chain needs is selected
//! for that chain's constraint. Every edge keeps the outcome it got.
//!
//! The second pass judges the finished graph, so its answer does not depend
//! on the order dependencies were declared in:
//!
//! - a required edge that closes a cycle is cut and reported once
//! - a module is required when a chain of required edges reaches it
//! - each failed required edge of a required module is a conflict
//! - an optional module whose own required dependencies cannot be met is
//!   left out, along with anything only it pulled in
//!
//! Dependencies precede their dependents in the install order, and the
//! root goes last.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use modreg_catalog::{Catalog, Dependency, Metadata, Module, ModuleId, ReviewStatus};
use modreg_version::{Version, VersionRange};

use crate::config::{ConflictPolicy, ResolutionConfig};
use crate::conflict::{ConflictType, ModuleConflict};
use crate::{Error, Result};

/// One module pulled in by a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDependency {
    pub module_id: ModuleId,
    pub name: String,
    pub version: String,
    /// True when a chain of required dependencies leads here from the root.
    pub required: bool,
    /// Shortest distance from the root; direct dependencies are 1.
    pub depth: usize,
}

/// The outcome of resolving one module.
///
/// A `resolved == false` result still carries the partial install order
/// reached; check `resolved` before acting on it. Optional modules whose
/// own requirements cannot be met appear in neither list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyResolution {
    pub resolved: bool,
    pub dependencies: Vec<ResolvedDependency>,
    pub conflicts: Vec<ModuleConflict>,
    /// Dependencies first, root module last. Never contains duplicates.
    pub install_order: Vec<ModuleId>,
}

impl DependencyResolution {
    /// Resolved and free of blocking conflicts.
    pub fn is_installable(&self) -> bool {
        self.resolved && !self.conflicts.iter().any(ModuleConflict::is_blocking)
    }

    pub fn dependency(&self, name: &str) -> Option<&ResolvedDependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    name: String,
    constraint: String,
}

impl NodeKey {
    fn of(dependency: &Dependency) -> Self {
        Self {
            name: dependency.id.clone(),
            constraint: dependency.version.trim().to_string(),
        }
    }
}

/// Where an edge led once the graph was built.
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    /// Not examined yet; never left after the build pass.
    Pending,
    Resolved(usize),
    Missing(String),
    /// The name is already selected at a version outside the constraint.
    Mismatch(usize),
    TooDeep(String),
    Cycle { target: usize, path: String },
}

impl Outcome {
    fn target(&self) -> Option<usize> {
        match self {
            Outcome::Resolved(target) => Some(*target),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Edge {
    dependency: Dependency,
    outcome: Outcome,
}

impl Edge {
    fn required(&self) -> bool {
        !self.dependency.optional
    }
}

/// A selected module version.
#[derive(Debug)]
struct Node {
    module_id: ModuleId,
    name: String,
    version: String,
    semver: Option<Version>,
    /// Distance from the root along the chain that selected it.
    depth: usize,
    parent: Option<usize>,
    edges: Vec<Edge>,
}

impl Node {
    fn edges_of(metadata: &Metadata) -> Vec<Edge> {
        metadata
            .dependencies
            .iter()
            .map(|dependency| Edge {
                dependency: dependency.clone(),
                outcome: Outcome::Pending,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Selected modules keyed by name. The root is node 0.
#[derive(Debug, Default)]
struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Graph {
    fn add(&mut self, node: Node) -> usize {
        let idx = self.nodes.len();
        self.index.insert(node.name.clone(), idx);
        self.nodes.push(node);
        idx
    }

    /// Names along the selecting chain from the root to `node`, then `closing`.
    fn describe_path(&self, node: usize, closing: &str) -> String {
        let mut names = vec![closing];
        let mut current = Some(node);
        while let Some(i) = current {
            names.push(self.nodes[i].name.as_str());
            current = self.nodes[i].parent;
        }
        names.reverse();
        names.join(" -> ")
    }

    /// Turn every required edge that closes a cycle into [`Outcome::Cycle`].
    fn cut_required_cycles(&mut self) {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::OnPath;
            let mut stack = vec![(start, 0usize)];

            while let Some((node, next)) = stack.last().copied() {
                let Some(edge) = self.nodes[node].edges.get(next) else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                };
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                let Some(target) = edge.outcome.target().filter(|_| edge.required()) else {
                    continue;
                };

                match marks[target] {
                    Mark::Unvisited => {
                        marks[target] = Mark::OnPath;
                        stack.push((target, 0));
                    }
                    Mark::OnPath => {
                        let mut names: Vec<&str> = stack
                            .iter()
                            .map(|(i, _)| self.nodes[*i].name.as_str())
                            .collect();
                        names.push(self.nodes[target].name.as_str());
                        let path = names.join(" -> ");
                        tracing::warn!(path = %path, "Dependency cycle detected");
                        self.nodes[node].edges[next].outcome = Outcome::Cycle { target, path };
                    }
                    Mark::Done => {}
                }
            }
        }
    }

    /// A node is viable when every required edge below it resolves to a
    /// viable node.
    fn viability(&self) -> Vec<bool> {
        let mut viable = vec![true; self.nodes.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (i, node) in self.nodes.iter().enumerate() {
                if !viable[i] {
                    continue;
                }
                let broken = node
                    .edges
                    .iter()
                    .filter(|e| e.required())
                    .any(|e| e.outcome.target().is_none_or(|t| !viable[t]));
                if broken {
                    viable[i] = false;
                    changed = true;
                }
            }
        }
        viable
    }

    /// Nodes reached from the root through required edges only.
    fn required_set(&self) -> Vec<bool> {
        let mut required = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([0]);
        required[0] = true;
        while let Some(i) = queue.pop_front() {
            for target in self.nodes[i]
                .edges
                .iter()
                .filter(|e| e.required())
                .filter_map(|e| e.outcome.target())
            {
                if !required[target] {
                    required[target] = true;
                    queue.push_back(target);
                }
            }
        }
        required
    }

    /// Shortest distance from the root for every node that gets installed.
    fn included(&self, viable: &[bool], required: &[bool]) -> Vec<Option<usize>> {
        let mut depth = vec![None; self.nodes.len()];
        let mut queue = VecDeque::from([(0, 0)]);
        depth[0] = Some(0);
        while let Some((i, d)) = queue.pop_front() {
            for target in self.nodes[i].edges.iter().filter_map(|e| e.outcome.target()) {
                if depth[target].is_none() && (viable[target] || required[target]) {
                    depth[target] = Some(d + 1);
                    queue.push_back((target, d + 1));
                }
            }
        }
        depth
    }

    /// Post-order over included nodes, in declaration order; root last.
    fn install_order(&self, included: &[Option<usize>]) -> Vec<usize> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![(0, 0usize)];
        marks[0] = Mark::OnPath;

        while let Some((node, next)) = stack.last().copied() {
            let Some(edge) = self.nodes[node].edges.get(next) else {
                marks[node] = Mark::Done;
                order.push(node);
                stack.pop();
                continue;
            };
            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }
            if let Some(target) = edge.outcome.target() {
                if included[target].is_some() && marks[target] == Mark::Unvisited {
                    marks[target] = Mark::OnPath;
                    stack.push((target, 0));
                }
            }
        }
        order
    }
}

/// A version chosen for a dependency, with the metadata to descend into.
struct Candidate {
    module_id: ModuleId,
    name: String,
    version: String,
    semver: Version,
    deprecated: bool,
    metadata: Metadata,
}

enum Selection {
    Found(Candidate),
    Missing(String),
}

/// Read-only resolver over a catalog.
pub struct DependencyResolver<'a> {
    catalog: &'a dyn Catalog,
    config: &'a ResolutionConfig,
    policy: &'a ConflictPolicy,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        config: &'a ResolutionConfig,
        policy: &'a ConflictPolicy,
    ) -> Self {
        Self {
            catalog,
            config,
            policy,
        }
    }

    /// Resolve `module_id` at `version` (its current version when `None`).
    ///
    /// # Errors
    ///
    /// [`Error::ModuleNotFound`] or [`Error::VersionNotFound`] when the root
    /// itself cannot be found, and catalog read failures. Missing or cyclic
    /// dependencies are reported in the result, not as errors.
    pub async fn resolve(
        &self,
        module_id: ModuleId,
        version: Option<&str>,
    ) -> Result<DependencyResolution> {
        let root = self
            .catalog
            .get_module(module_id)
            .await?
            .ok_or_else(|| Error::module_not_found(module_id))?;
        let (root_version, metadata) = self.root_metadata(&root, version).await?;

        tracing::debug!(
            module = %root.name,
            version = %root_version,
            dependencies = metadata.dependencies.len(),
            "Resolving dependencies"
        );

        let mut graph = Graph::default();
        graph.add(Node {
            module_id: root.id,
            name: root.name.clone(),
            semver: modreg_version::parse_version(&root_version).ok(),
            version: root_version,
            depth: 0,
            parent: None,
            edges: Node::edges_of(&metadata),
        });
        self.build(&mut graph).await?;
        graph.cut_required_cycles();

        let resolution = self.evaluate(&graph);
        tracing::debug!(
            module = %root.name,
            resolved = resolution.resolved,
            install_order = resolution.install_order.len(),
            conflicts = resolution.conflicts.len(),
            "Resolution finished"
        );
        Ok(resolution)
    }

    async fn root_metadata(&self, root: &Module, version: Option<&str>) -> Result<(String, Metadata)> {
        match version {
            None => Ok((root.version.clone(), root.metadata.clone())),
            Some(v) if v == root.version => Ok((root.version.clone(), root.metadata.clone())),
            Some(v) => {
                let record = self.catalog.get_version(root.id, v).await?.ok_or_else(|| {
                    Error::VersionNotFound {
                        module: root.name.clone(),
                        version: v.to_string(),
                    }
                })?;
                Ok((record.version, record.metadata))
            }
        }
    }

    /// Select versions and record an outcome on every edge.
    async fn build(&self, graph: &mut Graph) -> Result<()> {
        let mut required = VecDeque::new();
        let mut optional = VecDeque::new();
        let mut missing: HashMap<NodeKey, String> = HashMap::new();
        enqueue(graph, 0, true, &mut required, &mut optional);

        loop {
            let (node, edge, on_required_chain) = match required.pop_front() {
                Some((node, edge)) => (node, edge, true),
                None => match optional.pop_front() {
                    Some((node, edge)) => (node, edge, false),
                    None => break,
                },
            };
            let dependency = graph.nodes[node].edges[edge].dependency.clone();
            let depth = graph.nodes[node].depth + 1;

            let outcome = match VersionRange::parse(&dependency.version) {
                Err(e) => Outcome::Missing(format!("invalid constraint ({e})")),
                Ok(range) => match graph.index.get(&dependency.id).copied() {
                    Some(selected) => {
                        let compatible = graph.nodes[selected]
                            .semver
                            .as_ref()
                            .is_some_and(|v| range.matches(v));
                        if compatible {
                            Outcome::Resolved(selected)
                        } else {
                            Outcome::Mismatch(selected)
                        }
                    }
                    None if depth > self.config.max_depth => {
                        Outcome::TooDeep(graph.describe_path(node, &dependency.id))
                    }
                    None => {
                        let key = NodeKey::of(&dependency);
                        if let Some(reason) = missing.get(&key) {
                            Outcome::Missing(reason.clone())
                        } else {
                            match self.select(&dependency, &range).await? {
                                Selection::Found(candidate) => {
                                    let selected = graph.add(Node {
                                        module_id: candidate.module_id,
                                        name: candidate.name,
                                        version: candidate.version,
                                        semver: Some(candidate.semver),
                                        depth,
                                        parent: Some(node),
                                        edges: Node::edges_of(&candidate.metadata),
                                    });
                                    enqueue(
                                        graph,
                                        selected,
                                        on_required_chain,
                                        &mut required,
                                        &mut optional,
                                    );
                                    Outcome::Resolved(selected)
                                }
                                Selection::Missing(reason) => {
                                    missing.insert(key, reason.clone());
                                    Outcome::Missing(reason)
                                }
                            }
                        }
                    }
                },
            };
            graph.nodes[node].edges[edge].outcome = outcome;
        }
        Ok(())
    }

    fn evaluate(&self, graph: &Graph) -> DependencyResolution {
        let viable = graph.viability();
        let required = graph.required_set();

        let mut conflicts = Vec::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            for edge in &node.edges {
                if required[i] && edge.required() {
                    conflicts.extend(self.edge_conflict(graph, node, edge));
                } else if edge.outcome.target().is_none() {
                    tracing::debug!(
                        module = %node.name,
                        dependency = %edge.dependency.id,
                        constraint = %edge.dependency.version,
                        "Skipping unavailable optional dependency"
                    );
                }
            }
        }

        let included = graph.included(&viable, &required);
        for (node, _) in graph
            .nodes
            .iter()
            .zip(&included)
            .filter(|(_, depth)| depth.is_none())
        {
            tracing::debug!(
                module = %node.name,
                version = %node.version,
                "Leaving out optional module with unmet requirements"
            );
        }

        let order = graph.install_order(&included);
        let dependencies = order
            .iter()
            .filter(|&&i| i != 0)
            .filter_map(|&i| {
                let node = &graph.nodes[i];
                included[i].map(|depth| ResolvedDependency {
                    module_id: node.module_id,
                    name: node.name.clone(),
                    version: node.version.clone(),
                    required: required[i],
                    depth,
                })
            })
            .collect();

        DependencyResolution {
            resolved: conflicts.is_empty(),
            dependencies,
            conflicts,
            install_order: order.iter().map(|&i| graph.nodes[i].module_id).collect(),
        }
    }

    fn edge_conflict(&self, graph: &Graph, node: &Node, edge: &Edge) -> Option<ModuleConflict> {
        let dep = &edge.dependency;
        let (conflicting, description, resolution) = match &edge.outcome {
            Outcome::Pending | Outcome::Resolved(_) => return None,
            Outcome::Cycle { target, path } => (
                Some(graph.nodes[*target].module_id),
                format!("Circular dependency: {path}"),
                format!("Remove the dependency of {} on {}", node.name, dep.id),
            ),
            Outcome::Mismatch(selected) => {
                let selected = &graph.nodes[*selected];
                (
                    Some(selected.module_id),
                    format!(
                        "{} requires {} {} but {}@{} is already selected",
                        node.name, dep.id, dep.version, dep.id, selected.version
                    ),
                    format!("Align the version constraints on {}", dep.id),
                )
            }
            Outcome::TooDeep(path) => (
                None,
                format!(
                    "Dependency chain exceeds maximum depth {} at {path}",
                    self.config.max_depth
                ),
                "Flatten the dependency chain".to_string(),
            ),
            Outcome::Missing(reason) => (
                None,
                format!("{} requires {} {}: {reason}", node.name, dep.id, dep.version),
                format!("Publish a version of {} matching {}", dep.id, dep.version),
            ),
        };
        Some(ModuleConflict {
            conflict_type: ConflictType::Dependency,
            module_id: node.module_id,
            conflicting_module_id: conflicting,
            description,
            resolution: Some(resolution),
            severity: self.policy.severity_for(ConflictType::Dependency),
        })
    }

    /// Pick the best catalog version for `dep`.
    async fn select(&self, dep: &Dependency, range: &VersionRange) -> Result<Selection> {
        let modules = self.catalog.find_modules_by_name(&dep.id).await?;
        if modules.is_empty() {
            return Ok(Selection::Missing("not found in the catalog".to_string()));
        }

        let mut best: Option<Candidate> = None;
        let mut yanked_matches = 0usize;
        for module in modules
            .iter()
            .filter(|m| m.review_status != ReviewStatus::Rejected)
        {
            for record in self.catalog.list_versions(module.id).await? {
                let Ok(semver) = record.semver() else {
                    continue;
                };
                if !range.matches(&semver) {
                    continue;
                }
                if record.yanked || module.review_status == ReviewStatus::Yanked {
                    yanked_matches += 1;
                    continue;
                }
                let metadata = if record.version == module.version {
                    module.metadata.clone()
                } else {
                    record.metadata.clone()
                };
                let candidate = Candidate {
                    module_id: module.id,
                    name: module.name.clone(),
                    deprecated: record.deprecated
                        || module.review_status == ReviewStatus::Deprecated,
                    version: record.version,
                    semver,
                    metadata,
                };
                if best.as_ref().is_none_or(|b| self.outranks(&candidate, b)) {
                    best = Some(candidate);
                }
            }
        }

        Ok(match best {
            Some(candidate) => {
                if candidate.deprecated {
                    tracing::warn!(
                        module = %candidate.name,
                        version = %candidate.version,
                        "Selected a deprecated version"
                    );
                }
                Selection::Found(candidate)
            }
            None if yanked_matches > 0 => {
                Selection::Missing("every matching version has been yanked".to_string())
            }
            None => Selection::Missing("no version satisfies the constraint".to_string()),
        })
    }

    fn outranks(&self, a: &Candidate, b: &Candidate) -> bool {
        if self.config.prefer_non_deprecated && a.deprecated != b.deprecated {
            return !a.deprecated;
        }
        modreg_version::precedence(&a.semver, &b.semver) == Ordering::Greater
    }
}

/// Queue `node`'s edges. Only required edges under a required chain go on
/// the required queue.
fn enqueue(
    graph: &Graph,
    node: usize,
    required_chain: bool,
    required: &mut VecDeque<(usize, usize)>,
    optional: &mut VecDeque<(usize, usize)>,
) {
    for (i, edge) in graph.nodes[node].edges.iter().enumerate() {
        if required_chain && edge.required() {
            required.push_back((node, i));
        } else {
            optional.push_back((node, i));
        }
    }
}
