//! Read-only quality report over the normalized network. Pure logging; the
//! line set is never modified.

use geo::{LineString, MultiPolygon};
use petgraph::graphmap::UnGraphMap;

use crate::geometry;
use crate::NodeKey;

/// Thresholds for flagging suspect edges; fixed, not policy-driven.
#[derive(Clone, Debug)]
pub struct DiagnosticsPolicy {
    pub boundary_dist_threshold_m: f64,
    pub short_edge_threshold_m: f64,
    pub sample_points: usize,
    pub top_n_suspects: usize,
    pub max_edges_for_boundary_scan: usize,
}

impl Default for DiagnosticsPolicy {
    fn default() -> Self {
        Self {
            boundary_dist_threshold_m: 0.25,
            short_edge_threshold_m: 3.0,
            sample_points: 5,
            top_n_suspects: 20,
            max_edges_for_boundary_scan: 20_000,
        }
    }
}

pub fn report(lines: &[LineString<f64>], input: &MultiPolygon<f64>, policy: &DiagnosticsPolicy) {
    if lines.is_empty() {
        warn!("[diag] nothing to analyze");
        return;
    }

    let mut graph: UnGraphMap<NodeKey, ()> = UnGraphMap::new();
    for line in lines {
        if line.0.len() < 2 {
            continue;
        }
        let a = NodeKey::from_coord(line.0[0]);
        let b = NodeKey::from_coord(*line.0.last().unwrap());
        if a != b {
            graph.add_edge(a, b, ());
        }
    }

    log_graph_summary(&graph, lines.len());
    log_edge_length_summary(lines);

    if lines.len() > policy.max_edges_for_boundary_scan {
        warn!(
            "[diag] skipping boundary scan, too many edges (cap {})",
            policy.max_edges_for_boundary_scan
        );
        return;
    }
    let boundary = geometry::boundary_lines(input);
    if boundary.0.is_empty() {
        warn!("[diag] no boundary available, skipping proximity scan");
        return;
    }
    log_boundary_proximity(lines, &graph, &boundary, policy);
}

fn log_graph_summary(graph: &UnGraphMap<NodeKey, ()>, edges: usize) {
    let mut d1 = 0usize;
    let mut d2 = 0usize;
    let mut d3p = 0usize;
    for n in graph.nodes() {
        match graph.neighbors(n).count() {
            1 => d1 += 1,
            2 => d2 += 1,
            d if d >= 3 => d3p += 1,
            _ => {}
        }
    }
    let components = petgraph::algo::connected_components(graph);
    info!(
        "[diag] nodes={} edges={} components={} leaves={} passthrough={} junctions={}",
        graph.node_count(),
        edges,
        components,
        d1,
        d2,
        d3p
    );
}

fn log_edge_length_summary(lines: &[LineString<f64>]) {
    let mut lengths: Vec<f64> = lines.iter().map(geometry::line_length).collect();
    lengths.sort_by(f64::total_cmp);
    let pct = |p: f64| -> f64 {
        let idx = ((lengths.len() - 1) as f64 * p).round() as usize;
        lengths[idx]
    };
    let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
    info!(
        "[diag] edge length mean={:.3} p05={:.3} p50={:.3} p95={:.3} max={:.3}",
        mean,
        pct(0.05),
        pct(0.5),
        pct(0.95),
        lengths[lengths.len() - 1]
    );
}

fn log_boundary_proximity(
    lines: &[LineString<f64>],
    graph: &UnGraphMap<NodeKey, ()>,
    boundary: &geo::MultiLineString<f64>,
    policy: &DiagnosticsPolicy,
) {
    // (index, length, min boundary distance, leaf edge?)
    let mut rows: Vec<(usize, f64, f64, bool)> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if line.0.len() < 2 {
            continue;
        }
        let samples = geometry::sample_points(line, policy.sample_points.max(2));
        let min_bd = samples
            .iter()
            .map(|p| geometry::distance_to_lines(*p, boundary))
            .fold(f64::INFINITY, f64::min);
        let a = NodeKey::from_coord(line.0[0]);
        let b = NodeKey::from_coord(*line.0.last().unwrap());
        let is_leaf_edge =
            graph.neighbors(a).count() == 1 || graph.neighbors(b).count() == 1;
        rows.push((idx, geometry::line_length(line), min_bd, is_leaf_edge));
    }
    if rows.is_empty() {
        return;
    }

    let near = rows
        .iter()
        .filter(|(_, _, bd, _)| *bd < policy.boundary_dist_threshold_m)
        .count();
    let near_leaves = rows
        .iter()
        .filter(|(_, _, bd, leaf)| *bd < policy.boundary_dist_threshold_m && *leaf)
        .count();
    info!(
        "[diag] boundary proximity: {} edges under {:.2} m ({} of them leaf edges)",
        near, policy.boundary_dist_threshold_m, near_leaves
    );

    let mut suspects: Vec<&(usize, f64, f64, bool)> = rows
        .iter()
        .filter(|(_, len, bd, _)| {
            *bd < policy.boundary_dist_threshold_m && *len < policy.short_edge_threshold_m
        })
        .collect();
    suspects.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.1.total_cmp(&b.1)));
    info!("[diag] suspect short boundary-hugging edges: {}", suspects.len());
    for (idx, len, bd, _) in suspects.into_iter().take(policy.top_n_suspects) {
        info!(
            "[diag]   edge #{}: length={:.3} m, boundary distance={:.3} m",
            idx, len, bd
        );
    }
}
