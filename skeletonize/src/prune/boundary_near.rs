//! Removes leaf paths that hug the polygon boundary. A path whose nodes
//! mostly sit within a sliver of the boundary is an artifact of boundary
//! noise, not a road. Large or wide components are protected wholesale.

use std::collections::{BTreeMap, BTreeSet};

use crate::policy::SkeletonPolicy;
use crate::{EdgeId, NodeKey, PlanarGraph};

struct ComponentMeta {
    total_len: f64,
    max_radius: f64,
}

pub fn execute(graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
    let (meta, node_component) = component_meta(graph);
    let mut hard_removed_paths = 0usize;
    let mut soft_removed_edges = 0usize;

    loop {
        let leaves = graph.leaves();
        if leaves.is_empty() {
            break;
        }

        let mut to_remove: BTreeSet<EdgeId> = BTreeSet::new();
        let mut changed = false;

        for leaf in leaves {
            let Some(path) = graph.trace_leaf_to_junction(leaf) else {
                continue;
            };
            if path.edges.is_empty() {
                continue;
            }

            // Leave whole healthy components alone, even if a leaf looks bad.
            if let Some(cid) = node_component.get(&leaf) {
                let m = &meta[*cid];
                if m.total_len >= policy.boundary_protect_component_min_total_len_m
                    || m.max_radius >= policy.boundary_protect_component_max_radius_m
                {
                    continue;
                }
            }

            if path.terminal_radius <= policy.boundary_hard_min_radius_m {
                // The whole path dead-ends into the boundary.
                to_remove.extend(path.edges.iter().copied());
                hard_removed_paths += 1;
                changed = true;
                continue;
            }

            let radii: Vec<f64> = path.nodes.iter().map(|n| graph.radius(*n)).collect();
            let hits = radii
                .iter()
                .filter(|r| **r <= policy.boundary_min_radius_hit_m)
                .count();
            let hit_ratio = hits as f64 / radii.len().max(1) as f64;

            if hit_ratio >= policy.boundary_max_hit_ratio || hits >= policy.boundary_max_abs_hits {
                let k = policy
                    .boundary_remove_leaf_edges_count
                    .min(path.edges.len());
                let before = to_remove.len();
                to_remove.extend(path.edges[..k].iter().copied());
                soft_removed_edges += to_remove.len() - before;
                changed = true;
            }
        }

        if !changed || to_remove.is_empty() {
            break;
        }
        if to_remove.len() >= graph.num_edges() {
            warn!("boundary-near pruning would remove every edge; stopping");
            break;
        }
        for id in to_remove {
            graph.remove_edge(id);
        }
    }

    info!(
        "boundary-near pruning done: {} hard paths, {} trimmed edges",
        hard_removed_paths, soft_removed_edges
    );
}

fn component_meta(graph: &PlanarGraph) -> (Vec<ComponentMeta>, BTreeMap<NodeKey, usize>) {
    let mut metas = Vec::new();
    let mut node_component = BTreeMap::new();
    for (cid, component) in graph.connected_components().into_iter().enumerate() {
        let nodes: BTreeSet<NodeKey> = component.iter().copied().collect();
        let mut total_len = 0.0;
        for edge in graph.edges.values() {
            if nodes.contains(&edge.a) && nodes.contains(&edge.b) {
                total_len += edge.length;
            }
        }
        let max_radius = component
            .iter()
            .map(|n| graph.radius(*n))
            .fold(0.0, f64::max);
        for n in component {
            node_component.insert(n, cid);
        }
        metas.push(ComponentMeta {
            total_len,
            max_radius,
        });
    }
    (metas, node_component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn chain(points: &[(f64, f64)]) -> PlanarGraph {
        let mut g = PlanarGraph::new();
        for pair in points.windows(2) {
            g.add_edge(LineString::from(vec![pair[0], pair[1]]));
        }
        g
    }

    #[test]
    fn boundary_hugging_leaf_is_trimmed() {
        let policy = SkeletonPolicy::from_width_distribution(&[6.0]);
        // Short chain, every node radius under the urban hit threshold of
        // 0.12, terminal radius above the hard floor. A healthy protected
        // chain sits far away.
        let mut g = chain(&[(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (6.0, 0.0)]);
        g.add_edge(geo::LineString::from(vec![(100.0, 0.0), (140.0, 0.0)]));
        g.set_radius(crate::NodeKey::new(100.0, 0.0), 3.0);
        for n in [(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (6.0, 0.0)] {
            g.set_radius(crate::NodeKey::new(n.0, n.1), 0.11);
        }
        execute(&mut g, &policy);
        // hit_ratio 1.0 >= 0.45: the hugging chain is eaten from both ends;
        // the protected chain survives.
        assert!(g.num_edges() < 4);
        assert!(g.contains_node(crate::NodeKey::new(100.0, 0.0)));
    }

    #[test]
    fn long_component_is_protected() {
        let policy = SkeletonPolicy::from_width_distribution(&[6.0]);
        // Total length 40 >= 30: protected despite tiny radii.
        let mut g = chain(&[(0.0, 0.0), (20.0, 0.0), (40.0, 0.0)]);
        for n in g.nodes.keys().copied().collect::<Vec<_>>() {
            g.set_radius(n, 0.11);
        }
        execute(&mut g, &policy);
        assert_eq!(g.num_edges(), 2);
    }

    #[test]
    fn wide_component_is_protected() {
        let policy = SkeletonPolicy::from_width_distribution(&[6.0]);
        let mut g = chain(&[(0.0, 0.0), (2.0, 0.0), (4.0, 0.0)]);
        // One genuinely wide node protects the component.
        g.set_radius(crate::NodeKey::new(2.0, 0.0), 2.5);
        execute(&mut g, &policy);
        assert_eq!(g.num_edges(), 2);
    }
}
