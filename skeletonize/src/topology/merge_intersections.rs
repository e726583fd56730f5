//! Contracts short bridges between junctions into a single intersection
//! node. A dual carriageway also produces short junction-to-junction edges,
//! so a bridge whose two ends each continue in nearly the same direction (a
//! parallel corridor) is left alone.

use geo::LineString;

use crate::config::GisConfig;
use crate::geometry;
use crate::{EdgeId, NodeKey, PlanarGraph};

pub fn merge_intersection_bridges(
    lines: Vec<LineString<f64>>,
    config: &GisConfig,
) -> Vec<LineString<f64>> {
    let mut graph = PlanarGraph::from_lines(lines);
    let mut merged = 0usize;

    while let Some(bridge) = find_bridge(&graph, config) {
        contract(&mut graph, bridge);
        merged += 1;
    }

    if merged > 0 {
        info!("intersection bridge merge done: {} contracted", merged);
    }
    graph.lines()
}

fn find_bridge(graph: &PlanarGraph, config: &GisConfig) -> Option<EdgeId> {
    for edge in graph.edges.values() {
        if edge.a == edge.b {
            continue;
        }
        if graph.degree(edge.a) < 3 || graph.degree(edge.b) < 3 {
            continue;
        }
        if edge.length > config.topology_intersection_merge_threshold_m {
            continue;
        }
        if preserves_parallel_corridor(graph, edge.id, edge.a, edge.b, config) {
            continue;
        }
        return Some(edge.id);
    }
    None
}

/// True when some incident direction on the `u` side runs nearly parallel to
/// some incident direction on the `v` side: contracting the bridge would
/// fuse the two halves of a divided road.
fn preserves_parallel_corridor(
    graph: &PlanarGraph,
    bridge: EdgeId,
    u: NodeKey,
    v: NodeKey,
    config: &GisConfig,
) -> bool {
    let u_dirs = neighbor_directions(graph, u, bridge);
    let v_dirs = neighbor_directions(graph, v, bridge);
    if u_dirs.is_empty() || v_dirs.is_empty() {
        return false;
    }
    for a in &u_dirs {
        for b in &v_dirs {
            if geometry::angle_between_deg(*a, *b) <= config.topology_intersection_parallel_angle_deg
            {
                return true;
            }
        }
    }
    false
}

/// Unit directions of every incident edge (except the excluded bridge),
/// leaving `node` along the edge's first geometry step.
fn neighbor_directions(graph: &PlanarGraph, node: NodeKey, excluded: EdgeId) -> Vec<(f64, f64)> {
    let origin = node.to_coord();
    let mut dirs = Vec::new();
    for id in graph.incident_edges(node) {
        if id == excluded {
            continue;
        }
        let edge = &graph.edges[&id];
        let coords = &edge.geometry.0;
        if coords.len() < 2 {
            continue;
        }
        let reference = if edge.a == node {
            coords[1]
        } else {
            coords[coords.len() - 2]
        };
        if let Some(dir) = geometry::unit(reference.x - origin.x, reference.y - origin.y) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Replace the bridge and its two junctions with their midpoint; every other
/// incident edge gets re-anchored onto it.
fn contract(graph: &mut PlanarGraph, bridge: EdgeId) {
    let Some(edge) = graph.remove_edge(bridge) else {
        return;
    };
    let (u, v) = (edge.a, edge.b);
    let ca = u.to_coord();
    let cb = v.to_coord();
    let w = NodeKey::new((ca.x + cb.x) / 2.0, (ca.y + cb.y) / 2.0);
    let wc = w.to_coord();

    let mut incident: Vec<EdgeId> = graph.incident_edges(u);
    for id in graph.incident_edges(v) {
        if !incident.contains(&id) {
            incident.push(id);
        }
    }

    for id in incident {
        let Some(old) = graph.remove_edge(id) else {
            continue;
        };
        let mut coords = old.geometry.0;
        if old.a == u || old.a == v {
            coords[0] = wc;
        }
        if old.b == u || old.b == v {
            *coords.last_mut().unwrap() = wc;
        }
        // An edge with both endpoints on the contracted pair becomes a
        // self-loop and disappears here.
        graph.add_edge(LineString::new(coords));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: Vec<Vec<(f64, f64)>>, config: &GisConfig) -> Vec<LineString<f64>> {
        merge_intersection_bridges(
            lines.into_iter().map(LineString::from).collect(),
            config,
        )
    }

    #[test]
    fn short_bridge_between_junctions_is_contracted() {
        let config = GisConfig::default();
        // Two junctions 1 m apart. Arm orientations (45, 135 on one side;
        // 0, 90 on the other) all differ by 45 degrees, so the corridor veto
        // stays quiet.
        let lines = vec![
            vec![(0.0, 0.0), (1.0, 0.0)], // bridge
            vec![(0.0, 0.0), (-10.0, 10.0)],
            vec![(0.0, 0.0), (-10.0, -10.0)],
            vec![(1.0, 0.0), (11.0, 0.0)],
            vec![(1.0, 0.0), (1.0, 10.0)],
        ];
        let result = run(lines, &config);
        assert_eq!(result.len(), 4);
        // All arms now meet at the midpoint (0.5, 0).
        let w = NodeKey::new(0.5, 0.0);
        for line in &result {
            let touches_w = NodeKey::from_coord(line.0[0]) == w
                || NodeKey::from_coord(*line.0.last().unwrap()) == w;
            assert!(touches_w, "{:?} missed the merged node", line);
        }
    }

    #[test]
    fn long_bridge_is_left_alone() {
        let config = GisConfig::default();
        let lines = vec![
            vec![(0.0, 0.0), (10.0, 0.0)],
            vec![(0.0, 0.0), (-10.0, 5.0)],
            vec![(0.0, 0.0), (-10.0, -5.0)],
            vec![(10.0, 0.0), (20.0, 5.0)],
            vec![(10.0, 0.0), (20.0, -5.0)],
        ];
        assert_eq!(run(lines, &config).len(), 5);
    }

    #[test]
    fn parallel_corridor_is_preserved() {
        let config = GisConfig::default();
        // A divided road: both sides continue straight through the short
        // crossing bridge, so the bridge must stay.
        let lines = vec![
            vec![(0.0, 0.0), (0.0, 1.0)], // bridge between carriageways
            vec![(0.0, 0.0), (-20.0, 0.0)],
            vec![(0.0, 0.0), (20.0, 0.0)],
            vec![(0.0, 1.0), (-20.0, 1.0)],
            vec![(0.0, 1.0), (20.0, 1.0)],
        ];
        assert_eq!(run(lines, &config).len(), 5);
    }

    #[test]
    fn chain_of_bridges_terminates_in_one_junction() {
        let config = GisConfig::default();
        // Three junctions in a row, 1 m apart, arm orientations spread out
        // so no pair across a bridge runs parallel. Both bridges collapse.
        let lines = vec![
            vec![(0.0, 0.0), (1.0, 0.0)],
            vec![(1.0, 0.0), (2.0, 0.0)],
            vec![(0.0, 0.0), (-10.0, 10.0)],  // 135 deg
            vec![(0.0, 0.0), (-10.0, -10.0)], // 45 deg
            vec![(1.0, 0.0), (1.0, 10.0)],    // 90 deg
            vec![(2.0, 0.0), (5.4, 9.4)],     // ~70 deg
            vec![(2.0, 0.0), (-1.4, 9.4)],    // ~110 deg
        ];
        let result = run(lines, &config);
        assert_eq!(result.len(), 5);

        let graph = PlanarGraph::from_lines(result);
        assert_eq!(graph.junctions().len(), 1);
        for edge in graph.edges.values() {
            let junction_pair = graph.degree(edge.a) >= 3 && graph.degree(edge.b) >= 3;
            assert!(
                !junction_pair || edge.length > config.topology_intersection_merge_threshold_m,
                "left a short bridge behind"
            );
        }
    }
}
