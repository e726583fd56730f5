//! Topology normalization: turns the smoothed skeleton lines into a clean
//! planar network. Passes run in a fixed order; each one rebuilds its own
//! graph from the current line set, so they compose freely.

use geo::{LineString, MultiPolygon};

use crate::config::GisConfig;

mod cleaners;
pub mod diagnostics;
mod merge_intersections;
mod planarize;
mod simplify;
mod smooth_junctions;
mod snap;

/// One normalization step over the working line set.
pub enum TopologyPass {
    /// Round every coordinate to the network precision.
    SnapCoordinates,
    /// Split lines at every mutual crossing.
    Planarize,
    /// Contract short bridges between junctions, sparing parallel corridors.
    MergeIntersectionBridges,
    /// Remove Y-forks and hooks where the skeleton runs into the boundary.
    CleanTerminalForks,
    /// Remove any remaining short dead-end spurs.
    CleanShortSpurs,
    /// Drop wiggle vertices right next to junctions.
    SmoothIntersections,
    /// Merge edge pairs that meet at a degree-2 node.
    MergeFalseNodes,
    /// Length-adaptive Douglas-Peucker over the final edges.
    SimplifyAdaptive,
}

impl TopologyPass {
    pub fn standard() -> Vec<Self> {
        vec![
            TopologyPass::SnapCoordinates,
            TopologyPass::Planarize,
            TopologyPass::MergeIntersectionBridges,
            TopologyPass::CleanTerminalForks,
            TopologyPass::CleanShortSpurs,
            TopologyPass::SmoothIntersections,
            TopologyPass::MergeFalseNodes,
            TopologyPass::SimplifyAdaptive,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TopologyPass::SnapCoordinates => "snap coordinates",
            TopologyPass::Planarize => "planarize",
            TopologyPass::MergeIntersectionBridges => "merge intersection bridges",
            TopologyPass::CleanTerminalForks => "clean terminal forks",
            TopologyPass::CleanShortSpurs => "clean short spurs",
            TopologyPass::SmoothIntersections => "smooth intersections",
            TopologyPass::MergeFalseNodes => "merge false nodes",
            TopologyPass::SimplifyAdaptive => "simplify",
        }
    }

    pub fn apply(
        &self,
        lines: Vec<LineString<f64>>,
        input: &MultiPolygon<f64>,
        config: &GisConfig,
    ) -> Vec<LineString<f64>> {
        match self {
            TopologyPass::SnapCoordinates => snap::snap_coordinates(lines),
            TopologyPass::Planarize => planarize::planarize(lines),
            TopologyPass::MergeIntersectionBridges => {
                merge_intersections::merge_intersection_bridges(lines, config)
            }
            TopologyPass::CleanTerminalForks => cleaners::clean_terminal_forks(lines, input),
            TopologyPass::CleanShortSpurs => cleaners::clean_short_spurs(lines),
            TopologyPass::SmoothIntersections => smooth_junctions::smooth_intersections(lines),
            TopologyPass::MergeFalseNodes => cleaners::merge_false_nodes(lines),
            TopologyPass::SimplifyAdaptive => simplify::simplify_adaptive(lines, config),
        }
    }
}

/// The three interesting snapshots of the normalization, for debug export.
pub struct TopologyOutcome {
    pub planarized: Vec<LineString<f64>>,
    pub cleaned: Vec<LineString<f64>>,
    pub final_lines: Vec<LineString<f64>>,
}

pub fn normalize_topology(
    lines: Vec<LineString<f64>>,
    input: &MultiPolygon<f64>,
    config: &GisConfig,
) -> TopologyOutcome {
    let mut current = lines;
    let mut planarized = Vec::new();
    let mut cleaned = Vec::new();

    for pass in TopologyPass::standard() {
        let before = current.len();
        current = pass.apply(current, input, config);
        debug!("{}: {} -> {} lines", pass.name(), before, current.len());

        match pass {
            TopologyPass::Planarize => planarized = current.clone(),
            TopologyPass::MergeFalseNodes => cleaned = current.clone(),
            _ => {}
        }
    }

    TopologyOutcome {
        planarized,
        cleaned,
        final_lines: current,
    }
}
