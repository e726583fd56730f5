//! Directional smoothing: nudge every interior node toward the mean
//! direction of its neighbors, morph edge polylines onto the moved nodes,
//! then window-average and resample each polyline. Repeated a small number of
//! times this straightens the skeleton without letting it drift.

use std::collections::BTreeMap;

use geo::{Coord, LineString};

use crate::geometry;
use crate::policy::SkeletonPolicy;
use crate::{NodeKey, PlanarGraph};

pub fn smooth_by_direction_field(graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
    if graph.is_empty() {
        return;
    }

    for _ in 0..policy.graph_smooth_iterations.max(1) {
        let moves = node_moves(graph, policy);

        let mut remapped = PlanarGraph::new();
        for edge in graph.edges.values() {
            let uu = moves.get(&edge.a).copied().unwrap_or(edge.a);
            let vv = moves.get(&edge.b).copied().unwrap_or(edge.b);
            if uu == vv {
                continue;
            }
            let morphed = morph_geometry(&edge.geometry, edge.a, edge.b, uu, vv);
            let geom = smooth_and_resample(morphed, policy);
            if geom.0.len() >= 2 {
                remapped.add_or_replace_edge(geom);
            }
        }
        *graph = remapped;
    }
}

/// Where each node with two or more neighbors wants to go: a small step
/// toward the mean neighbor direction, eased by alpha.
fn node_moves(graph: &PlanarGraph, policy: &SkeletonPolicy) -> BTreeMap<NodeKey, NodeKey> {
    let mut moves = BTreeMap::new();
    for node in graph.nodes.keys().copied() {
        let origin = node.to_coord();
        let vecs: Vec<(f64, f64)> = graph
            .neighbors(node)
            .into_iter()
            .filter_map(|(nb, _)| {
                let c = nb.to_coord();
                geometry::unit(c.x - origin.x, c.y - origin.y)
            })
            .collect();
        if vecs.len() < 2 {
            continue;
        }
        let ax = vecs.iter().map(|v| v.0).sum::<f64>() / vecs.len() as f64;
        let ay = vecs.iter().map(|v| v.1).sum::<f64>() / vecs.len() as f64;
        let Some(mean) = geometry::unit(ax, ay) else {
            continue;
        };
        let tx = origin.x + mean.0 * policy.graph_smooth_target_shift_m;
        let ty = origin.y + mean.1 * policy.graph_smooth_target_shift_m;
        let alpha = policy.graph_smooth_alpha;
        let new = NodeKey::new(
            (1.0 - alpha) * origin.x + alpha * tx,
            (1.0 - alpha) * origin.y + alpha * ty,
        );
        if new != node {
            moves.insert(node, new);
        }
    }
    moves
}

/// Re-anchor a polyline onto moved endpoints. Whether the stored geometry
/// runs a->b or b->a is decided by distance, not assumed.
fn morph_geometry(
    geometry: &LineString<f64>,
    old_a: NodeKey,
    old_b: NodeKey,
    new_a: NodeKey,
    new_b: NodeKey,
) -> LineString<f64> {
    let mut coords = geometry.0.clone();
    let start = coords[0];
    let end = *coords.last().unwrap();
    let (ca, cb) = (old_a.to_coord(), old_b.to_coord());

    let direct_cost =
        geometry_dist(start, ca) + geometry_dist(end, cb);
    let reverse_cost =
        geometry_dist(start, cb) + geometry_dist(end, ca);

    if direct_cost <= reverse_cost {
        coords[0] = new_a.to_coord();
        *coords.last_mut().unwrap() = new_b.to_coord();
    } else {
        coords[0] = new_b.to_coord();
        *coords.last_mut().unwrap() = new_a.to_coord();
    }
    LineString::new(coords)
}

fn geometry_dist(a: Coord<f64>, b: Coord<f64>) -> f64 {
    geometry::coord_distance(a, b)
}

/// Sliding-window mean over the interior vertices (endpoints stay anchored
/// to their nodes), then uniform arc-length resampling.
fn smooth_and_resample(line: LineString<f64>, policy: &SkeletonPolicy) -> LineString<f64> {
    let coords = &line.0;
    if coords.len() < 2 {
        return line;
    }

    let window = policy.direction_smooth_window.max(3);
    let mut smoothed: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for i in 0..coords.len() {
        if i == 0 || i == coords.len() - 1 {
            smoothed.push(coords[i]);
            continue;
        }
        let lo = i.saturating_sub(window / 2);
        let hi = (i + window / 2 + 1).min(coords.len());
        let count = (hi - lo) as f64;
        let sx = coords[lo..hi].iter().map(|c| c.x).sum::<f64>() / count;
        let sy = coords[lo..hi].iter().map(|c| c.y).sum::<f64>() / count;
        smoothed.push(Coord { x: sx, y: sy });
    }

    let smooth_line = LineString::new(smoothed);
    let length = geometry::line_length(&smooth_line);
    if length <= 0.0 {
        return smooth_line;
    }
    let step = policy.resample_step_m.max(policy.resample_min_step_m);
    let n = ((length / step) as usize + 1).max(2);
    let pts = geometry::sample_points(&smooth_line, n);
    if pts.len() < 2 {
        return smooth_line;
    }
    LineString::from(
        pts.into_iter()
            .map(|p| (p.x(), p.y()))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SkeletonPolicy {
        SkeletonPolicy::from_width_distribution(&[6.0])
    }

    #[test]
    fn straight_chain_stays_straight() {
        let policy = policy();
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]));
        g.add_edge(LineString::from(vec![(10.0, 0.0), (20.0, 0.0)]));
        smooth_by_direction_field(&mut g, &policy);

        assert!(!g.is_empty());
        for line in g.lines() {
            for c in &line.0 {
                assert!(c.y.abs() < 0.6, "drifted off axis: {:?}", c);
            }
        }
    }

    #[test]
    fn resampling_respects_the_step_floor() {
        let policy = policy();
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(0.0, 0.0), (20.0, 0.0)]));
        g.add_edge(LineString::from(vec![(20.0, 0.0), (40.0, 3.0)]));
        smooth_by_direction_field(&mut g, &policy);

        let step = policy.resample_step_m.max(policy.resample_min_step_m);
        for line in g.lines() {
            for pair in line.0.windows(2) {
                let d = geometry::coord_distance(pair[0], pair[1]);
                // Uniform resampling: segments within a factor of the step.
                assert!(d <= step * 2.0 + 1e-6, "segment too long: {d}");
            }
        }
    }

    #[test]
    fn morph_matches_reversed_geometry() {
        let a = NodeKey::new(0.0, 0.0);
        let b = NodeKey::new(10.0, 0.0);
        // Geometry stored from b to a.
        let geom = LineString::from(vec![(10.0, 0.0), (5.0, 0.5), (0.0, 0.0)]);
        let na = NodeKey::new(0.0, 1.0);
        let nb = NodeKey::new(10.0, 1.0);
        let morphed = morph_geometry(&geom, a, b, na, nb);
        // The first coordinate tracked old b, so it becomes new b.
        assert_eq!(NodeKey::from_coord(morphed.0[0]), nb);
        assert_eq!(NodeKey::from_coord(*morphed.0.last().unwrap()), na);
    }
}
