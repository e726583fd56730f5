//! Final simplification. Edges touching a junction get a slightly looser
//! tolerance than plain mainline edges; both tolerances are small enough
//! that re-running the pass is a no-op.

use std::collections::BTreeMap;

use geo::{LineString, Simplify};

use crate::config::GisConfig;
use crate::NodeKey;

pub fn simplify_adaptive(lines: Vec<LineString<f64>>, config: &GisConfig) -> Vec<LineString<f64>> {
    let mut degree: BTreeMap<NodeKey, usize> = BTreeMap::new();
    for line in &lines {
        if line.0.len() < 2 {
            continue;
        }
        let s = NodeKey::from_coord(line.0[0]);
        let e = NodeKey::from_coord(*line.0.last().unwrap());
        *degree.entry(s).or_insert(0) += 1;
        *degree.entry(e).or_insert(0) += 1;
    }

    let mut junction_edges = 0usize;
    let out = lines
        .into_iter()
        .map(|line| {
            if line.0.len() < 2 {
                return line;
            }
            let s = degree[&NodeKey::from_coord(line.0[0])];
            let e = degree[&NodeKey::from_coord(*line.0.last().unwrap())];
            let at_junction =
                s >= config.topology_junction_min_degree || e >= config.topology_junction_min_degree;
            let tol = if at_junction {
                junction_edges += 1;
                config.topology_simplify_junction_tolerance_m
            } else {
                config.topology_simplify_main_tolerance_m
            };
            line.simplify(&tol)
        })
        .collect();

    debug!(
        "adaptive simplify done ({} junction edges)",
        junction_edges
    );
    out
}
