//! Two repairs on the pruned skeleton: push apart edges that ended up almost
//! on top of each other (overlapping candidates from the two families), then
//! bridge colinear breaks between dangling endpoints, as long as the bridge
//! stays inside the road.

use std::collections::BTreeSet;

use geo::{BooleanOps, LineString, MultiLineString, MultiPolygon, Relate};
use geo_buffer::buffer_multi_polygon;

use crate::geometry;
use crate::policy::SkeletonPolicy;
use crate::{canonical_key, NodeKey, PlanarGraph};

pub fn separate_parallel_and_reconnect(
    graph: &mut PlanarGraph,
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
) {
    separate_close_parallels(graph, policy);
    reconnect_directional_breaks(graph, stable, policy);
}

/// For every near-parallel edge pair whose geometry midpoints nearly
/// coincide, slide the second edge sideways by a fraction of the lane width.
/// Each edge moves at most once.
fn separate_close_parallels(graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
    let close_dist = policy.min_lane_width_m * policy.parallel_close_dist_factor;
    let offset = policy.min_lane_width_m * policy.parallel_offset_factor;

    let snapshot: Vec<_> = graph
        .edges
        .values()
        .map(|e| (e.id, e.a, e.b, e.geometry.clone()))
        .collect();
    let mut moved: BTreeSet<(NodeKey, NodeKey)> = BTreeSet::new();
    let mut shifted = 0usize;

    for i in 0..snapshot.len() {
        let (id1, a1, b1, ref geom1) = snapshot[i];
        if graph.edge(id1).is_none() {
            continue;
        }
        let Some(dir1) = geometry::chord_direction(geom1) else {
            continue;
        };
        let Some(mid1) = geometry::midpoint(geom1) else {
            continue;
        };
        for j in i + 1..snapshot.len() {
            let (id2, a2, b2, ref geom2) = snapshot[j];
            if graph.edge(id2).is_none() {
                continue;
            }
            // Edges meeting at a node are a junction, not an overlap.
            if a1 == a2 || a1 == b2 || b1 == a2 || b1 == b2 {
                continue;
            }
            if moved.contains(&canonical_key(a2, b2)) {
                continue;
            }
            let Some(mid2) = geometry::midpoint(geom2) else {
                continue;
            };
            if geometry::point_distance(mid1, mid2) > close_dist {
                continue;
            }
            let Some(dir2) = geometry::chord_direction(geom2) else {
                continue;
            };
            if geometry::angle_between_deg(dir1, dir2) > policy.parallel_angle_deg {
                continue;
            }

            // Shift along the right-hand normal of the second edge.
            let normal = (dir2.1, -dir2.0);
            let shifted_geom = LineString::from(
                geom2
                    .0
                    .iter()
                    .map(|c| (c.x + normal.0 * offset, c.y + normal.1 * offset))
                    .collect::<Vec<_>>(),
            );
            moved.insert(canonical_key(a2, b2));
            graph.remove_edge(id2);
            if let Some(new_id) = graph.add_or_replace_edge(shifted_geom) {
                let e = &graph.edges[&new_id];
                moved.insert(e.canonical_key());
                shifted += 1;
            }
        }
    }
    info!("parallel separation done: {} edges shifted", shifted);
}

/// Connect pairs of dangling endpoints whose headings line up and whose
/// connecting segment stays inside the (buffered) road polygon.
fn reconnect_directional_breaks(
    graph: &mut PlanarGraph,
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
) {
    let endpoints = graph.leaves();
    if endpoints.len() < 2 {
        return;
    }
    let buffered = buffer_multi_polygon(stable, policy.reconnect_boundary_buffer_m);
    let mut added = 0usize;

    for i in 0..endpoints.len() {
        for j in i + 1..endpoints.len() {
            let (a, b) = (endpoints[i], endpoints[j]);
            let dist = geometry::point_distance(a.to_point(), b.to_point());
            if dist <= 0.0 || dist > policy.reconnect_search_radius_m {
                continue;
            }
            let (Some(ha), Some(hb)) = (endpoint_heading(graph, a), endpoint_heading(graph, b))
            else {
                continue;
            };
            if geometry::angle_between_deg(ha, hb) > policy.reconnect_angle_deg {
                continue;
            }
            if graph.edge_between(a, b).is_some() {
                continue;
            }

            let segment = LineString::from(vec![a.to_coord(), b.to_coord()]);
            let inside = stable.clip(&MultiLineString::new(vec![segment.clone()]), false);
            let inside_len: f64 = inside.0.iter().map(geometry::line_length).sum();
            let inside_ratio = inside_len / dist;
            // The buffer is a fallback for segments grazing the boundary,
            // not a second requirement.
            let is_within_buffer = segment.relate(&buffered).is_within();
            if inside_ratio < policy.reconnect_min_inside_ratio && !is_within_buffer {
                continue;
            }

            if graph.add_edge(segment).is_some() {
                added += 1;
            }
        }
    }
    info!("directional reconnect done: {} bridges added", added);
}

/// Direction a dangling endpoint points away from its sole neighbor.
fn endpoint_heading(graph: &PlanarGraph, node: NodeKey) -> Option<(f64, f64)> {
    let (neighbor, _) = graph.neighbors(node).into_iter().next()?;
    let n = node.to_coord();
    let nb = neighbor.to_coord();
    geometry::unit(n.x - nb.x, n.y - nb.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{EuclideanDistance, Polygon};

    fn rect_mp(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )])
    }

    fn policy() -> SkeletonPolicy {
        SkeletonPolicy::from_width_distribution(&[6.0])
    }

    #[test]
    fn overlapping_parallels_get_separated() {
        let policy = policy();
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(0.0, 3.0), (20.0, 3.0)]));
        g.add_edge(LineString::from(vec![(0.5, 3.1), (20.5, 3.1)]));

        separate_close_parallels(&mut g, &policy);
        assert_eq!(g.num_edges(), 2);
        let min_gap = policy.min_lane_width_m * policy.parallel_offset_factor - 0.15;
        let lines = g.lines();
        assert!(lines[0].euclidean_distance(&lines[1]) >= min_gap);
    }

    #[test]
    fn perpendicular_edges_are_left_alone() {
        let policy = policy();
        let mut g = PlanarGraph::new();
        // Midpoints 1 m apart, well inside the close-distance threshold; only
        // the angle gate keeps this pair untouched.
        g.add_edge(LineString::from(vec![(0.0, 0.0), (20.0, 0.0)]));
        g.add_edge(LineString::from(vec![(10.0, 0.5), (10.0, 1.5)]));
        let before = g.lines();
        separate_close_parallels(&mut g, &policy);
        assert_eq!(g.lines(), before);
    }

    #[test]
    fn longitudinally_offset_parallels_are_left_alone() {
        let policy = policy();
        // Same axis, partial overlap, but the midpoints sit far apart: the
        // pair is a continuation, not a duplicate.
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(0.0, 3.0), (20.0, 3.0)]));
        g.add_edge(LineString::from(vec![(16.0, 3.1), (36.0, 3.1)]));
        let before = g.lines();
        separate_close_parallels(&mut g, &policy);
        assert_eq!(g.lines(), before);
    }

    #[test]
    fn facing_breaks_reconnect_inside_polygon() {
        let policy = policy();
        let stable = rect_mp(0.0, 0.0, 30.0, 6.0);
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(1.0, 3.0), (13.0, 3.0)]));
        g.add_edge(LineString::from(vec![(17.0, 3.0), (29.0, 3.0)]));

        reconnect_directional_breaks(&mut g, &stable, &policy);
        assert!(g
            .edge_between(NodeKey::new(13.0, 3.0), NodeKey::new(17.0, 3.0))
            .is_some());
    }

    #[test]
    fn breaks_outside_polygon_stay_broken() {
        let policy = policy();
        // The gap between the two chains crosses a hole in the coverage.
        let stable = MultiPolygon(vec![
            rect_mp(0.0, 0.0, 13.5, 6.0).0.remove(0),
            rect_mp(16.5, 0.0, 30.0, 6.0).0.remove(0),
        ]);
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(1.0, 3.0), (13.0, 3.0)]));
        g.add_edge(LineString::from(vec![(17.0, 3.0), (29.0, 3.0)]));

        reconnect_directional_breaks(&mut g, &stable, &policy);
        assert!(g
            .edge_between(NodeKey::new(13.0, 3.0), NodeKey::new(17.0, 3.0))
            .is_none());
    }

    #[test]
    fn divergent_headings_do_not_reconnect() {
        let policy = policy();
        let stable = rect_mp(0.0, 0.0, 30.0, 30.0);
        let mut g = PlanarGraph::new();
        g.add_edge(LineString::from(vec![(1.0, 3.0), (12.0, 3.0)]));
        // Heading roughly perpendicular to the first chain's.
        g.add_edge(LineString::from(vec![(14.0, 5.0), (14.0, 16.0)]));

        reconnect_directional_breaks(&mut g, &stable, &policy);
        assert_eq!(g.num_edges(), 2);
    }
}
