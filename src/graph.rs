//! The dependency graph the resolver builds up and tears down as it
//! backtracks. Vertices are named and carry an optional payload
//! ([`Specification`]) once a possibility has been activated for them;
//! edges carry the [`Requirement`] that justified adding them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::spec::{Requirement, Specification};

pub type VertexId = u32;

/// Name of the synthetic vertex the resolver hangs root requirements off
/// of; shared with the lockfile codec so `Lockfile::to_graph` reconstructs
/// the same shape.
pub const ROOT_VERTEX: &str = ".";

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub name: String,
    pub payload: Option<Specification>,
    pub root: bool,
}

impl Vertex {
    fn new(id: VertexId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            payload: None,
            root: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub origin: VertexId,
    pub destination: VertexId,
    pub requirement: Requirement,
}

/// A directed graph of named vertices. Vertex identity is by name; `id` is
/// a stable handle that survives detach/reattach within one graph
/// instance, used so edges don't need to hold string keys.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    vertices: BTreeMap<VertexId, Vertex>,
    names: BTreeMap<String, VertexId>,
    edges: Vec<Edge>,
    next_id: VertexId,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_named(&self, name: &str) -> Option<&Vertex> {
        self.names.get(name).and_then(|id| self.vertices.get(id))
    }

    pub fn vertex_named_mut(&mut self, name: &str) -> Option<&mut Vertex> {
        let id = *self.names.get(name)?;
        self.vertices.get_mut(&id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Inserts a vertex by name if absent, returning its id either way.
    pub fn add_vertex(&mut self, name: &str, root: bool) -> VertexId {
        if let Some(&id) = self.names.get(name) {
            if root {
                self.vertices.get_mut(&id).unwrap().root = true;
            }
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        let mut vertex = Vertex::new(id, name);
        vertex.root = root;
        self.vertices.insert(id, vertex);
        self.names.insert(name.to_string(), id);
        id
    }

    /// Adds (or reuses) a vertex named `name`, linked from `origin` by
    /// `requirement`. Returns the child's id.
    pub fn add_child_vertex(
        &mut self,
        name: &str,
        origin: VertexId,
        requirement: Requirement,
    ) -> VertexId {
        let child = self.add_vertex(name, false);
        if !self
            .edges
            .iter()
            .any(|e| e.origin == origin && e.destination == child)
        {
            self.edges.push(Edge {
                origin,
                destination: child,
                requirement,
            });
        }
        child
    }

    /// Requirements currently pointing at `name`, from whichever vertices
    /// are still reachable in the graph.
    pub fn requirements_for(&self, name: &str) -> Vec<&Requirement> {
        let Some(&id) = self.names.get(name) else {
            return Vec::new();
        };
        self.edges
            .iter()
            .filter(|e| e.destination == id)
            .map(|e| &e.requirement)
            .collect()
    }

    /// The vertex that introduced the given edge's requirement, for
    /// conflict-chain reporting.
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    /// Detaches `name` and recursively removes any vertex that becomes
    /// unreachable from a root as a result (orphan pruning), mirroring how
    /// the resolver unwinds a rejected possibility.
    pub fn detach_vertex_named(&mut self, name: &str) {
        let Some(&id) = self.names.get(name) else {
            return;
        };
        self.remove_vertex(id);
        self.prune_orphans();
    }

    fn remove_vertex(&mut self, id: VertexId) {
        if let Some(vertex) = self.vertices.remove(&id) {
            self.names.remove(&vertex.name);
        }
        self.edges.retain(|e| e.origin != id && e.destination != id);
    }

    fn prune_orphans(&mut self) {
        loop {
            let reachable = self.reachable_from_roots();
            let orphans: Vec<VertexId> = self
                .vertices
                .keys()
                .copied()
                .filter(|id| !reachable.contains(id))
                .collect();
            if orphans.is_empty() {
                break;
            }
            for id in orphans {
                self.remove_vertex(id);
            }
        }
    }

    fn reachable_from_roots(&self) -> BTreeSet<VertexId> {
        let mut seen: BTreeSet<VertexId> = BTreeSet::new();
        let mut stack: Vec<VertexId> = self
            .vertices
            .values()
            .filter(|v| v.root)
            .map(|v| v.id)
            .collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            for edge in &self.edges {
                if edge.origin == id && !seen.contains(&edge.destination) {
                    stack.push(edge.destination);
                }
            }
        }
        seen
    }

    /// True if `name` sits on a cycle: reachable from itself by following
    /// at least one edge.
    pub fn is_circular(&self, name: &str) -> bool {
        self.cycle_through(name).is_some()
    }

    /// If `name` sits on a cycle, returns one concrete path (by name) that
    /// leads from `name` back to itself; otherwise `None`. Used to render
    /// a useful [`crate::conflict::ResolveError::CircularDependency`]
    /// instead of just refusing to resolve.
    pub fn cycle_through(&self, name: &str) -> Option<Vec<String>> {
        let &id = self.names.get(name)?;
        let mut stack: Vec<(VertexId, Vec<VertexId>)> = self
            .edges
            .iter()
            .filter(|e| e.origin == id)
            .map(|e| (e.destination, vec![id]))
            .collect();
        let mut seen: BTreeSet<VertexId> = BTreeSet::new();
        while let Some((current, mut path)) = stack.pop() {
            path.push(current);
            if current == id {
                return Some(path.iter().map(|v| self.vertices[v].name.clone()).collect());
            }
            if !seen.insert(current) {
                continue;
            }
            for edge in &self.edges {
                if edge.origin == current {
                    stack.push((edge.destination, path.clone()));
                }
            }
        }
        None
    }

    /// Drops `vertex_id`'s edges to any child not named in `keep`, then
    /// prunes anything that becomes unreachable as a result. Used when a
    /// vertex's payload is swapped for one with a different dependency
    /// set, so the children only the old payload needed don't linger.
    /// Returns the names that ended up detached, so the caller can also
    /// drop any still-pending requirement for them.
    pub fn retain_children_of(&mut self, vertex_id: VertexId, keep: &BTreeSet<String>) -> Vec<String> {
        let stale: Vec<VertexId> = self
            .edges
            .iter()
            .filter(|e| e.origin == vertex_id)
            .filter(|e| {
                self.vertices
                    .get(&e.destination)
                    .is_some_and(|v| !keep.contains(&v.name))
            })
            .map(|e| e.destination)
            .collect();
        let stale_names: Vec<String> = stale
            .iter()
            .filter_map(|id| self.vertices.get(id).map(|v| v.name.clone()))
            .collect();
        self.edges
            .retain(|e| !(e.origin == vertex_id && stale.contains(&e.destination)));
        self.prune_orphans();
        stale_names
            .into_iter()
            .filter(|name| !self.names.contains_key(name))
            .collect()
    }

    /// Deep-clones the graph so the resolver can branch into a possibility
    /// without mutating the state it might have to unwind to.
    pub fn dup(&self) -> Self {
        self.clone()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for vertex in self.vertices.values() {
            match &vertex.payload {
                Some(spec) => writeln!(f, "{} -> {}", vertex.name, spec.version)?,
                None => writeln!(f, "{} -> (unresolved)", vertex.name)?,
            }
        }
        Ok(())
    }
}
