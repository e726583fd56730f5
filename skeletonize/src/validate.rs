//! Final QA observer. Logs connectivity and boundary-touch findings about
//! the finished network; never modifies anything.

use geo::{LineString, MultiPolygon};
use petgraph::graphmap::UnGraphMap;

use crate::config::GisConfig;
use crate::geometry;
use crate::NodeKey;

pub fn validate_centerlines(
    final_lines: &[LineString<f64>],
    input: &MultiPolygon<f64>,
    config: &GisConfig,
) {
    if final_lines.is_empty() {
        warn!("[validator] nothing to validate: final result is empty");
        return;
    }
    info!("[validator] final result QA starting");

    let mut graph: UnGraphMap<NodeKey, ()> = UnGraphMap::new();
    for line in final_lines {
        if line.0.len() < 2 {
            continue;
        }
        let a = NodeKey::from_coord(line.0[0]);
        let b = NodeKey::from_coord(*line.0.last().unwrap());
        if a != b {
            graph.add_edge(a, b, ());
        }
    }

    let mut findings = 0usize;
    findings += check_connectivity(&graph);
    findings += check_boundary_touch(&graph, input, config);

    if findings == 0 {
        info!("[validator] all quality checks passed");
    } else {
        warn!("[validator] {} potential quality issues found", findings);
    }
}

fn check_connectivity(graph: &UnGraphMap<NodeKey, ()>) -> usize {
    let components = petgraph::algo::tarjan_scc(graph);
    info!("[validator] network component count: {}", components.len());
    if components.len() > 1 {
        let mut sizes: Vec<usize> = components.iter().map(|c| c.len()).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        debug!("[validator] component node counts: {:?}", sizes);
        warn!(
            "[validator] network is split into {} fragments",
            components.len()
        );
        1
    } else {
        0
    }
}

fn check_boundary_touch(
    graph: &UnGraphMap<NodeKey, ()>,
    input: &MultiPolygon<f64>,
    config: &GisConfig,
) -> usize {
    let terminals: Vec<NodeKey> = graph
        .nodes()
        .filter(|n| graph.neighbors(*n).count() == 1)
        .collect();
    if terminals.is_empty() {
        return 0;
    }

    let boundary = geometry::boundary_lines(input);
    if boundary.0.is_empty() {
        warn!("[validator] no input boundary, skipping terminal check");
        return 0;
    }

    let tolerance = config.snap_threshold;
    let mut failed = 0usize;
    for node in &terminals {
        let dist = geometry::distance_to_lines(node.to_point(), &boundary);
        if dist > tolerance {
            failed += 1;
            if failed <= 3 {
                warn!(
                    "[validator] terminal {} sits {:.3} m from the boundary (tolerance {} m)",
                    node, dist, tolerance
                );
            }
        }
    }

    if failed == 0 {
        info!(
            "[validator] all {} terminals finish at the boundary",
            terminals.len()
        );
        0
    } else {
        warn!(
            "[validator] {} of {} terminals stop short of the boundary",
            failed,
            terminals.len()
        );
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Polygon;

    #[test]
    fn validator_is_read_only_and_total() {
        let input = MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (20.0, 0.0), (20.0, 6.0), (0.0, 6.0), (0.0, 0.0)]),
            vec![],
        )]);
        let lines = vec![LineString::from(vec![(0.3, 3.0), (19.7, 3.0)])];
        validate_centerlines(&lines, &input, &GisConfig::default());
        validate_centerlines(&[], &input, &GisConfig::default());
    }
}
