//! Removes leaf paths that never escape their terminal junction's clearance:
//! `path length < terminal radius * prune_ratio_limit`.

use std::collections::BTreeSet;

use crate::policy::SkeletonPolicy;
use crate::{EdgeId, PlanarGraph};

pub fn execute(graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
    let mut removed_paths = 0usize;
    let mut removed_edges = 0usize;

    loop {
        let leaves = graph.leaves();
        if leaves.is_empty() {
            break;
        }

        let mut to_remove: BTreeSet<EdgeId> = BTreeSet::new();
        for leaf in leaves {
            let Some(path) = graph.trace_leaf_to_junction(leaf) else {
                continue;
            };
            if path.total_length < path.terminal_radius * policy.prune_ratio_limit {
                to_remove.extend(path.edges);
                removed_paths += 1;
            }
        }

        if to_remove.is_empty() {
            break;
        }
        // Never wipe the whole graph in one wave.
        if to_remove.len() >= graph.num_edges() {
            warn!("ratio pruning would remove every edge; stopping");
            break;
        }
        removed_edges += to_remove.len();
        for id in to_remove {
            graph.remove_edge(id);
        }
    }

    info!(
        "ratio pruning done: {} paths, {} edges removed",
        removed_paths, removed_edges
    );
}
