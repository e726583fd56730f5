//! Runtime-tunable settings, as opposed to the data-derived `SkeletonPolicy`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings the caller may override per run. Defaults match production
/// behavior; loadable from a JSON file for tooling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GisConfig {
    /// Write per-stage intermediate files next to the final output.
    pub debug_export_intermediate: bool,
    /// Bridges between junctions at most this long get contracted.
    pub topology_intersection_merge_threshold_m: f64,
    /// Angular tolerance for detecting a parallel corridor across a bridge.
    pub topology_intersection_parallel_angle_deg: f64,
    /// Douglas-Peucker tolerance for ordinary edges.
    pub topology_simplify_main_tolerance_m: f64,
    /// Douglas-Peucker tolerance for edges touching a junction.
    pub topology_simplify_junction_tolerance_m: f64,
    /// Minimum degree for a node to count as a junction when simplifying.
    pub topology_junction_min_degree: usize,
    /// How far a terminal node may sit from the input boundary before the
    /// result validator flags it.
    pub snap_threshold: f64,
}

impl Default for GisConfig {
    fn default() -> Self {
        Self {
            debug_export_intermediate: false,
            topology_intersection_merge_threshold_m: 1.5,
            topology_intersection_parallel_angle_deg: 15.0,
            topology_simplify_main_tolerance_m: 0.05,
            topology_simplify_junction_tolerance_m: 0.12,
            topology_junction_min_degree: 3,
            snap_threshold: 0.5,
        }
    }
}

impl GisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("couldn't read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("couldn't parse config {}", path.display()))?;
        Ok(config)
    }
}
