//! End-of-line cleanup passes: Y-forks and hooks where the skeleton runs
//! into the road boundary, leftover short spurs anywhere, and false-node
//! merging of chains split by earlier passes.

use std::collections::{BTreeMap, BTreeSet};

use geo::{LineString, MultiPolygon};

use crate::geometry;
use crate::{EdgeId, LeafPath, NodeKey, PlanarGraph};

/// Terminal forks: leaves close to the input boundary, grouped by the
/// junction they trace back to.
const FORK_BOUNDARY_THRESHOLD_M: f64 = 0.8;
/// A fork branch at most this long is an artifact of the polygon's end cap.
const MAX_FORK_LEN_M: f64 = 25.0;
/// A lone boundary leaf only loses a short hook prefix.
const MAX_HOOK_LEN_M: f64 = 4.0;
/// Generic dead-end spur limit for the topology stage.
const MAX_SPUR_LEN_M: f64 = 2.5;

/// Remove Y-shaped forks and bent hooks where centerline ends approach the
/// original polygon boundary. Forks (two or more boundary leaves meeting at
/// one junction) are removed whole; a lone leaf only loses a short prefix.
pub fn clean_terminal_forks(
    lines: Vec<LineString<f64>>,
    input: &MultiPolygon<f64>,
) -> Vec<LineString<f64>> {
    if lines.is_empty() || input.0.is_empty() {
        return lines;
    }
    let boundary = geometry::boundary_lines(input);
    let mut graph = PlanarGraph::from_lines(lines);
    let mut removed_total = 0usize;

    loop {
        let mut groups: BTreeMap<NodeKey, Vec<LeafPath>> = BTreeMap::new();
        for leaf in graph.leaves() {
            if geometry::distance_to_lines(leaf.to_point(), &boundary) > FORK_BOUNDARY_THRESHOLD_M
            {
                continue;
            }
            if let Some(path) = graph.trace_leaf_to_junction(leaf) {
                if !path.edges.is_empty() {
                    groups.entry(path.terminal).or_default().push(path);
                }
            }
        }

        let mut to_remove: BTreeSet<EdgeId> = BTreeSet::new();
        for (_, paths) in groups {
            if paths.len() >= 2 {
                for path in paths {
                    if path.total_length <= MAX_FORK_LEN_M {
                        to_remove.extend(path.edges);
                    }
                }
            } else {
                // A single boundary leaf: trim the bent hook at its tip, if
                // any, but never eat into a long straight approach.
                let path = &paths[0];
                let mut accumulated = 0.0;
                for id in &path.edges {
                    let len = graph.edges[id].length;
                    if accumulated + len > MAX_HOOK_LEN_M {
                        break;
                    }
                    accumulated += len;
                    to_remove.insert(*id);
                }
            }
        }

        if to_remove.is_empty() {
            break;
        }
        if to_remove.len() >= graph.num_edges() {
            warn!("terminal fork cleanup would remove every edge; stopping");
            break;
        }
        removed_total += to_remove.len();
        for id in to_remove {
            graph.remove_edge(id);
        }
    }

    if removed_total > 0 {
        info!("terminal fork cleanup done: {} edges removed", removed_total);
    }
    graph.lines()
}

/// Remove single-ended spur paths up to `MAX_SPUR_LEN_M`, repeating until
/// nothing changes.
pub fn clean_short_spurs(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut graph = PlanarGraph::from_lines(lines);
    let mut removed_total = 0usize;

    loop {
        let mut to_remove: BTreeSet<EdgeId> = BTreeSet::new();
        for leaf in graph.leaves() {
            if let Some(path) = graph.trace_leaf_to_junction(leaf) {
                if !path.edges.is_empty() && path.total_length <= MAX_SPUR_LEN_M {
                    to_remove.extend(path.edges);
                }
            }
        }
        if to_remove.is_empty() {
            break;
        }
        if to_remove.len() >= graph.num_edges() {
            warn!("spur cleanup would remove every edge; stopping");
            break;
        }
        removed_total += to_remove.len();
        for id in to_remove {
            graph.remove_edge(id);
        }
    }

    if removed_total > 0 {
        info!("spur cleanup done: {} edges removed", removed_total);
    }
    graph.lines()
}

/// Collapse degree-2 pass-through nodes into single polylines.
pub fn merge_false_nodes(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let before = lines.len();
    let mut graph = PlanarGraph::from_lines(lines);
    graph.merge_degree_two_nodes();
    let out = graph.lines();
    if out.len() != before {
        info!("false node merge done: {} -> {} edges", before, out.len());
    }
    out
}
