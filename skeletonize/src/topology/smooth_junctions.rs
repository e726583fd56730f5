//! Straightens the immediate approach to every junction by deleting interior
//! vertices inside a small clearance circle around the junction node.

use geo::{Coord, LineString};

use crate::geometry::coord_distance;
use crate::PlanarGraph;

const CLEARANCE_RADIUS_M: f64 = 2.0;

pub fn smooth_intersections(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let graph = PlanarGraph::from_lines(lines);
    let junction_set: std::collections::BTreeSet<_> = graph.junctions().into_iter().collect();
    if junction_set.is_empty() {
        return graph.lines();
    }

    let mut out = Vec::with_capacity(graph.num_edges());
    let mut smoothed = 0usize;
    for edge in graph.edges.values() {
        let at_a = junction_set.contains(&edge.a);
        let at_b = junction_set.contains(&edge.b);
        if !at_a && !at_b {
            out.push(edge.geometry.clone());
            continue;
        }

        let coords = &edge.geometry.0;
        let ca = edge.a.to_coord();
        let cb = edge.b.to_coord();
        let mut kept: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
        for (i, pt) in coords.iter().enumerate() {
            if i == 0 || i == coords.len() - 1 {
                kept.push(*pt);
                continue;
            }
            let near_a = at_a && coord_distance(*pt, ca) <= CLEARANCE_RADIUS_M;
            let near_b = at_b && coord_distance(*pt, cb) <= CLEARANCE_RADIUS_M;
            if !(near_a || near_b) {
                kept.push(*pt);
            }
        }
        if kept.len() < 2 {
            kept = vec![coords[0], *coords.last().unwrap()];
        }
        if kept.len() != coords.len() {
            smoothed += 1;
        }
        out.push(LineString::new(kept));
    }

    if smoothed > 0 {
        info!("junction smoothing done: {} edges straightened", smoothed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiggles_near_the_junction_disappear() {
        let lines = vec![
            LineString::from(vec![
                (0.0, 0.0),
                (1.0, 0.4),
                (1.8, -0.3),
                (5.0, 0.0),
                (10.0, 0.0),
            ]),
            LineString::from(vec![(0.0, 0.0), (-10.0, 1.0)]),
            LineString::from(vec![(0.0, 0.0), (0.0, 10.0)]),
        ];
        let result = smooth_intersections(lines);
        let long = result
            .iter()
            .find(|l| l.0[0].x == 10.0 || l.0.last().unwrap().x == 10.0)
            .unwrap();
        // The two vertices within 2 m of the junction are gone; (5, 0) stays.
        assert!(long.0.iter().all(|c| c.x != 1.0 && c.x != 1.8));
        assert!(long.0.iter().any(|c| c.x == 5.0));
    }

    #[test]
    fn edges_away_from_junctions_are_untouched() {
        let lines = vec![LineString::from(vec![
            (0.0, 0.0),
            (1.0, 0.4),
            (2.0, 0.0),
        ])];
        let result = smooth_intersections(lines);
        assert_eq!(result[0].0.len(), 3);
    }
}
