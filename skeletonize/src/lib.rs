#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use geo::{Coord, LineString, MultiLineString, Point};

pub use self::config::GisConfig;
pub use self::pipeline::{
    extract_centerlines, CancelToken, CenterlineOutput, DebugStages, StageMeta,
};
pub use self::policy::SkeletonPolicy;
pub use self::prune::Pruner;
pub use self::topology::TopologyPass;
pub use self::validate::validate_centerlines;

mod cluster;
mod config;
mod geometry;
mod pairs;
mod parallel;
mod pipeline;
mod policy;
mod prune;
mod selector;
mod smooth;
mod stabilize;
mod topology;
mod validate;
mod voronoi;

/// Node coordinates are keyed to millimetre precision. Everything downstream
/// (deduplication, edge identity, degree counting) relies on this rounding.
pub const COORD_PRECISION_MM: f64 = 1000.0;

/// Lower bound on a node's reported boundary distance.
pub const MIN_NODE_RADIUS: f64 = 0.1;

/// A graph node identity: coordinates rounded to 3 decimal places (0.001 m),
/// stored quantized so keys hash and order exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    x_mm: i64,
    y_mm: i64,
}

impl NodeKey {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x_mm: (x * COORD_PRECISION_MM).round() as i64,
            y_mm: (y * COORD_PRECISION_MM).round() as i64,
        }
    }

    pub fn from_coord(c: Coord<f64>) -> Self {
        Self::new(c.x, c.y)
    }

    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.x_mm as f64 / COORD_PRECISION_MM,
            y: self.y_mm as f64 / COORD_PRECISION_MM,
        }
    }

    pub fn to_point(self) -> Point<f64> {
        Point(self.to_coord())
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = self.to_coord();
        write!(f, "({:.3}, {:.3})", c.x, c.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub id: EdgeId,
    pub a: NodeKey,
    pub b: NodeKey,
    /// First and last coordinate always equal `a` and `b`. Interior vertices
    /// keep full precision.
    pub geometry: LineString<f64>,
    pub length: f64,
}

impl Edge {
    pub fn other_endpoint(&self, n: NodeKey) -> NodeKey {
        if self.a == n {
            self.b
        } else {
            self.a
        }
    }

    pub fn canonical_key(&self) -> (NodeKey, NodeKey) {
        canonical_key(self.a, self.b)
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    /// Distance from this node to the stabilized polygon boundary, clamped to
    /// `MIN_NODE_RADIUS`. Stays at the clamp for graphs built without a
    /// boundary (the topology stages don't use it).
    pub radius: f64,
    /// Incident edges in insertion order. Parallel edges are allowed; loops
    /// are not.
    pub edges: Vec<EdgeId>,
}

/// Endpoints sorted, for canonical undirected edge identity.
pub fn canonical_key(a: NodeKey, b: NodeKey) -> (NodeKey, NodeKey) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The undirected graph every stage after candidate selection operates on.
/// Nodes are rounded coordinates, edges carry their polyline. A multigraph
/// during topology normalization; the skeleton stages keep it simple by
/// replacing duplicate (a, b) edges on insert.
#[derive(Clone, Debug, Default)]
pub struct PlanarGraph {
    pub nodes: BTreeMap<NodeKey, Node>,
    pub edges: BTreeMap<EdgeId, Edge>,
    next_edge_id: usize,
}

/// A walk from a leaf through degree-2 nodes, ending at the first junction
/// (degree >= 3) or at a dead end.
#[derive(Clone, Debug)]
pub struct LeafPath {
    pub nodes: Vec<NodeKey>,
    pub edges: Vec<EdgeId>,
    pub total_length: f64,
    pub terminal: NodeKey,
    pub terminal_radius: f64,
}

impl PlanarGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a multigraph from bare lines; degenerate lines (under 2 distinct
    /// rounded endpoints) are dropped.
    pub fn from_lines<I: IntoIterator<Item = LineString<f64>>>(lines: I) -> Self {
        let mut graph = Self::new();
        for line in lines {
            graph.add_edge(line);
        }
        graph
    }

    /// Build the skeleton graph: simple (duplicate endpoints replace the
    /// earlier edge, like the candidate stage expects), with each node's
    /// radius measured against the stabilized polygon boundary.
    pub fn from_centerlines<I: IntoIterator<Item = LineString<f64>>>(
        lines: I,
        boundary: &MultiLineString<f64>,
    ) -> Self {
        let mut graph = Self::new();
        let mut measured: BTreeSet<NodeKey> = BTreeSet::new();
        for line in lines {
            let Some(id) = graph.add_or_replace_edge(line) else {
                continue;
            };
            let (a, b) = {
                let e = &graph.edges[&id];
                (e.a, e.b)
            };
            for n in [a, b] {
                if measured.insert(n) {
                    let d = geometry::distance_to_lines(n.to_point(), boundary);
                    graph.set_radius(n, d.max(MIN_NODE_RADIUS));
                }
            }
        }
        graph
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Adds an edge for this polyline, keyed by its rounded endpoints. The
    /// first/last coordinates are snapped onto the node keys. Returns `None`
    /// for self-loops and degenerate geometry.
    pub fn add_edge(&mut self, mut geometry: LineString<f64>) -> Option<EdgeId> {
        if geometry.0.len() < 2 {
            return None;
        }
        let a = NodeKey::from_coord(geometry.0[0]);
        let b = NodeKey::from_coord(*geometry.0.last().unwrap());
        if a == b {
            return None;
        }
        geometry.0[0] = a.to_coord();
        *geometry.0.last_mut().unwrap() = b.to_coord();
        let length = geometry::line_length(&geometry);
        if length <= 0.0 {
            return None;
        }

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.insert(
            id,
            Edge {
                id,
                a,
                b,
                geometry,
                length,
            },
        );
        for n in [a, b] {
            self.nodes
                .entry(n)
                .or_insert_with(|| Node {
                    radius: MIN_NODE_RADIUS,
                    edges: Vec::new(),
                })
                .edges
                .push(id);
        }
        Some(id)
    }

    /// Like `add_edge`, but an existing (a, b) edge is replaced instead of
    /// doubled up.
    pub fn add_or_replace_edge(&mut self, geometry: LineString<f64>) -> Option<EdgeId> {
        if geometry.0.len() < 2 {
            return None;
        }
        let a = NodeKey::from_coord(geometry.0[0]);
        let b = NodeKey::from_coord(*geometry.0.last().unwrap());
        if let Some(existing) = self.edge_between(a, b) {
            self.remove_edge(existing);
        }
        self.add_edge(geometry)
    }

    /// Removes an edge. Endpoints left without any incident edge disappear
    /// with it.
    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        for n in [edge.a, edge.b] {
            if let Some(node) = self.nodes.get_mut(&n) {
                node.edges.retain(|e| *e != id);
                if node.edges.is_empty() {
                    self.nodes.remove(&n);
                }
            }
        }
        Some(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Snapshot of edge ids in insertion order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.keys().copied().collect()
    }

    pub fn edge_between(&self, a: NodeKey, b: NodeKey) -> Option<EdgeId> {
        let node = self.nodes.get(&a)?;
        node.edges
            .iter()
            .copied()
            .find(|id| self.edges[id].other_endpoint(a) == b)
    }

    pub fn contains_node(&self, n: NodeKey) -> bool {
        self.nodes.contains_key(&n)
    }

    pub fn degree(&self, n: NodeKey) -> usize {
        self.nodes.get(&n).map(|node| node.edges.len()).unwrap_or(0)
    }

    /// Adjacent nodes with the connecting edge, in edge-insertion order.
    pub fn neighbors(&self, n: NodeKey) -> Vec<(NodeKey, EdgeId)> {
        match self.nodes.get(&n) {
            Some(node) => node
                .edges
                .iter()
                .map(|id| (self.edges[id].other_endpoint(n), *id))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn incident_edges(&self, n: NodeKey) -> Vec<EdgeId> {
        self.nodes.get(&n).map(|node| node.edges.clone()).unwrap_or_default()
    }

    pub fn radius(&self, n: NodeKey) -> f64 {
        self.nodes.get(&n).map(|node| node.radius).unwrap_or(MIN_NODE_RADIUS)
    }

    pub fn set_radius(&mut self, n: NodeKey, radius: f64) {
        if let Some(node) = self.nodes.get_mut(&n) {
            node.radius = radius;
        }
    }

    pub fn leaves(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.edges.len() == 1)
            .map(|(n, _)| *n)
            .collect()
    }

    pub fn junctions(&self) -> Vec<NodeKey> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.edges.len() >= 3)
            .map(|(n, _)| *n)
            .collect()
    }

    /// Connected components as node sets, in deterministic key order.
    pub fn connected_components(&self) -> Vec<Vec<NodeKey>> {
        let mut unvisited: BTreeSet<NodeKey> = self.nodes.keys().copied().collect();
        let mut components = Vec::new();
        while let Some(start) = unvisited.iter().next().copied() {
            let mut queue = vec![start];
            let mut component = Vec::new();
            while let Some(current) = queue.pop() {
                if !unvisited.remove(&current) {
                    continue;
                }
                component.push(current);
                for (nb, _) in self.neighbors(current) {
                    if unvisited.contains(&nb) {
                        queue.push(nb);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }

    /// Walk from a leaf via the unique unvisited neighbor until hitting a
    /// junction (degree >= 3) or running out of road.
    pub fn trace_leaf_to_junction(&self, leaf: NodeKey) -> Option<LeafPath> {
        if !self.contains_node(leaf) {
            return None;
        }
        let mut visited: BTreeSet<NodeKey> = BTreeSet::new();
        visited.insert(leaf);
        let mut nodes = vec![leaf];
        let mut edges = Vec::new();
        let mut total_length = 0.0;
        let mut current = leaf;

        loop {
            let next = self
                .neighbors(current)
                .into_iter()
                .find(|(nb, _)| !visited.contains(nb));
            let Some((nb, eid)) = next else {
                return Some(LeafPath {
                    nodes,
                    edges,
                    total_length,
                    terminal: current,
                    terminal_radius: self.radius(current),
                });
            };
            total_length += self.edges[&eid].length;
            edges.push(eid);
            current = nb;
            visited.insert(current);
            nodes.push(current);
            if self.degree(current) >= 3 {
                return Some(LeafPath {
                    nodes,
                    edges,
                    total_length,
                    terminal: current,
                    terminal_radius: self.radius(current),
                });
            }
        }
    }

    /// Edge geometries in insertion order.
    pub fn lines(&self) -> Vec<LineString<f64>> {
        self.edges.values().map(|e| e.geometry.clone()).collect()
    }

    /// Collapse pass-through nodes: wherever exactly two edges meet at a
    /// degree-2 node, concatenate them into one polyline. Nodes whose merge
    /// would close a loop onto a single neighbor are left alone.
    pub fn merge_degree_two_nodes(&mut self) {
        loop {
            let candidates: Vec<NodeKey> = self
                .nodes
                .iter()
                .filter(|(_, node)| node.edges.len() == 2)
                .map(|(n, _)| *n)
                .collect();
            let mut merged = 0usize;

            for node in candidates {
                let Some(data) = self.nodes.get(&node) else {
                    continue;
                };
                if data.edges.len() != 2 {
                    continue;
                }
                let (e1, e2) = (data.edges[0], data.edges[1]);
                let edge1 = self.edges[&e1].clone();
                let edge2 = self.edges[&e2].clone();
                let u = edge1.other_endpoint(node);
                let v = edge2.other_endpoint(node);
                if u == v {
                    continue;
                }

                let mut coords1 = edge1.geometry.0.clone();
                if edge1.a == node {
                    coords1.reverse();
                }
                let mut coords2 = edge2.geometry.0.clone();
                if edge2.b == node {
                    coords2.reverse();
                }
                coords1.extend(coords2.into_iter().skip(1));

                let u_radius = self.radius(u);
                let v_radius = self.radius(v);
                self.remove_edge(e1);
                self.remove_edge(e2);
                if let Some(_id) = self.add_edge(LineString::new(coords1)) {
                    self.set_radius(u, u_radius);
                    self.set_radius(v, v_radius);
                    merged += 1;
                }
            }

            if merged == 0 {
                break;
            }
        }
    }
}
