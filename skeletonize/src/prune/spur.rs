//! Removes short true spurs at junctions: a branch that dead-ends quickly
//! while its siblings run much further is an artifact of the candidate stage,
//! not a side street.

use std::collections::BTreeSet;

use crate::policy::SkeletonPolicy;
use crate::{EdgeId, NodeKey, PlanarGraph};

pub fn execute(graph: &mut PlanarGraph, policy: &SkeletonPolicy) {
    let junctions = graph.junctions();
    if junctions.is_empty() {
        return;
    }

    let mut to_remove: BTreeSet<EdgeId> = BTreeSet::new();
    for junction in junctions {
        let mut branches = Vec::new();
        for (neighbor, first_edge) in graph.neighbors(junction) {
            let (length, is_true_spur) = trace_branch(graph, junction, neighbor, first_edge);
            branches.push((first_edge, length, is_true_spur));
        }
        if branches.is_empty() {
            continue;
        }
        let max_len = branches
            .iter()
            .map(|(_, len, _)| *len)
            .fold(0.0, f64::max);
        for (first_edge, length, is_true_spur) in branches {
            if is_true_spur
                && length <= policy.spur_abs_max_len_m
                && length <= max_len * policy.spur_rel_ratio
            {
                to_remove.insert(first_edge);
            }
        }
    }

    let removed = to_remove.len();
    for id in to_remove {
        graph.remove_edge(id);
    }
    info!("junction spur removal done: {} edges removed", removed);
}

/// Follow a branch from `junction` through `first` until a dead end (a true
/// spur) or the next junction. Returns cumulative length.
fn trace_branch(
    graph: &PlanarGraph,
    junction: NodeKey,
    first: NodeKey,
    first_edge: EdgeId,
) -> (f64, bool) {
    let mut total = graph.edges[&first_edge].length;
    let mut prev = junction;
    let mut current = first;

    loop {
        let degree = graph.degree(current);
        if degree == 1 {
            return (total, true);
        }
        if degree >= 3 {
            return (total, false);
        }
        let next = graph
            .neighbors(current)
            .into_iter()
            .find(|(nb, _)| *nb != prev);
        let Some((nb, eid)) = next else {
            return (total, true);
        };
        total += graph.edges[&eid].length;
        prev = current;
        current = nb;
    }
}
