//! Drops tiny isolated fragments: connected components with no junction at
//! all, too short and too narrow to be a real piece of road.

use std::collections::BTreeSet;

use crate::policy::SkeletonPolicy;
use crate::{NodeKey, PlanarGraph};

pub fn execute(graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
    let mut doomed: Vec<Vec<crate::EdgeId>> = Vec::new();

    for component in graph.connected_components() {
        if component.iter().any(|n| graph.degree(*n) >= 3) {
            continue;
        }
        let nodes: BTreeSet<NodeKey> = component.iter().copied().collect();
        let edge_ids: Vec<_> = graph
            .edges
            .values()
            .filter(|e| nodes.contains(&e.a) && nodes.contains(&e.b))
            .map(|e| e.id)
            .collect();
        let total_len: f64 = edge_ids.iter().map(|id| graph.edges[id].length).sum();
        let max_radius = component
            .iter()
            .map(|n| graph.radius(*n))
            .fold(0.0, f64::max);

        if total_len >= policy.component_min_total_len_m
            || max_radius >= policy.component_protect_max_radius_m
        {
            continue;
        }
        doomed.push(edge_ids);
    }

    let removed_edges: usize = doomed.iter().map(|ids| ids.len()).sum();
    if removed_edges >= graph.num_edges() && removed_edges > 0 {
        warn!("fragment removal would remove every edge; stopping");
        return;
    }
    let removed_components = doomed.len();
    for ids in doomed {
        for id in ids {
            graph.remove_edge(id);
        }
    }

    info!(
        "isolated fragment removal done: {} components, {} edges removed",
        removed_components, removed_edges
    );
}
