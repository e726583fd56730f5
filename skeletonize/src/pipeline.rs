//! End-to-end orchestration: policy derivation, preprocessing, candidate
//! generation and selection, graph refinement, and topology normalization.
//! Cancellation is observed between stages; within a stage the pipeline is
//! synchronous and single-threaded.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use geo::{LineString, MultiPolygon, Polygon};
use serde::Serialize;

use crate::config::GisConfig;
use crate::policy::SkeletonPolicy;
use crate::prune::Pruner;
use crate::topology::{self, diagnostics};
use crate::{cluster, geometry, pairs, parallel, selector, smooth, stabilize, voronoi};
use crate::PlanarGraph;

/// Cooperative cancellation flag. The shell may set it from another thread;
/// the pipeline checks it between top-level stages only.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            bail!("pipeline cancelled");
        }
        Ok(())
    }
}

/// One record per pipeline stage: counts and thresholds worth keeping.
#[derive(Clone, Debug, Serialize)]
pub struct StageMeta {
    pub stage: &'static str,
    pub meta: BTreeMap<&'static str, f64>,
}

/// Intermediate line sets, captured only when debug export is on.
#[derive(Clone, Debug)]
pub struct DebugStages {
    pub skeleton: Vec<LineString<f64>>,
    pub planarized: Vec<LineString<f64>>,
    pub cleaned: Vec<LineString<f64>>,
}

#[derive(Clone, Debug)]
pub struct CenterlineOutput {
    pub lines: Vec<LineString<f64>>,
    pub stages: Vec<StageMeta>,
    pub debug: Option<DebugStages>,
}

impl CenterlineOutput {
    fn empty(stages: Vec<StageMeta>) -> Self {
        Self {
            lines: Vec::new(),
            stages,
            debug: None,
        }
    }

    pub fn stage_meta_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.stages)?)
    }
}

/// Run the full pipeline over a sequence of road polygons (planar, metric
/// CRS). Empty input produces empty output, not an error.
pub fn extract_centerlines(
    polygons: &[Polygon<f64>],
    config: &GisConfig,
    cancel: &CancelToken,
) -> Result<CenterlineOutput> {
    let total_timer = Instant::now();
    let mut stages: Vec<StageMeta> = Vec::new();

    if polygons.is_empty() {
        warn!("input is empty, nothing to do");
        return Ok(CenterlineOutput::empty(stages));
    }

    let widths = width_samples(polygons);
    let policy = SkeletonPolicy::from_width_distribution(&widths);
    info!(
        "[policy] regime={} from {} width samples (median {:.2} m)",
        policy.regime.name(),
        widths.len(),
        median(&widths)
    );
    cancel.check()?;

    let skeleton_timer = Instant::now();
    let Some(merged) = cluster::merge_road_units(polygons, &policy) else {
        warn!("polygon merge produced nothing");
        return Ok(CenterlineOutput::empty(stages));
    };
    if merged.0.is_empty() {
        warn!("polygon merge produced an empty geometry");
        return Ok(CenterlineOutput::empty(stages));
    }
    push_stage(
        &mut stages,
        "00_merge",
        [("parts", merged.0.len() as f64)].into(),
    );
    cancel.check()?;

    let stable = stabilize::stabilize_geometry(&merged, &policy);
    push_stage(
        &mut stages,
        "01_preprocess",
        [("parts", stable.0.len() as f64)].into(),
    );
    cancel.check()?;

    let raw_voronoi = voronoi::generate_voronoi_skeleton(&stable, &policy);
    let raw_pairs = pairs::generate_boundary_pair_centerlines(&stable, &policy);
    let (voronoi_raw_count, pairs_raw_count) = (raw_voronoi.len(), raw_pairs.len());

    let selected_voronoi = selector::select_candidates(raw_voronoi, &stable, &policy, "voronoi");
    let selected_pairs =
        selector::select_candidates(raw_pairs, &stable, &policy, "boundary_pair");
    let voronoi_selected_count = selected_voronoi.len();
    let pairs_selected_count = selected_pairs.len();

    let mut raw_lines = selected_voronoi;
    raw_lines.extend(selected_pairs);
    raw_lines.retain(|ls| ls.0.len() >= 2 && geometry::line_length(ls) > 0.0);
    push_stage(
        &mut stages,
        "02_candidates",
        [
            ("voronoi_raw", voronoi_raw_count as f64),
            ("voronoi_selected", voronoi_selected_count as f64),
            ("boundary_pair_raw", pairs_raw_count as f64),
            ("boundary_pair_selected", pairs_selected_count as f64),
            ("total", raw_lines.len() as f64),
        ]
        .into(),
    );
    if raw_lines.is_empty() {
        warn!("no candidate centerlines survived selection");
        return Ok(CenterlineOutput::empty(stages));
    }
    cancel.check()?;

    let boundary = geometry::boundary_lines(&stable);
    let mut graph = PlanarGraph::from_centerlines(raw_lines, &boundary);
    push_stage(
        &mut stages,
        "03_graph_build",
        [
            ("nodes", graph.num_nodes() as f64),
            ("edges", graph.num_edges() as f64),
        ]
        .into(),
    );
    cancel.check()?;

    for pruner in Pruner::standard() {
        pruner.execute(&mut graph, &policy);
    }
    cancel.check()?;

    graph.merge_degree_two_nodes();
    parallel::separate_parallel_and_reconnect(&mut graph, &stable, &policy);
    smooth::smooth_by_direction_field(&mut graph, &policy);
    push_stage(
        &mut stages,
        "04_graph_refine",
        [
            ("nodes", graph.num_nodes() as f64),
            ("edges", graph.num_edges() as f64),
        ]
        .into(),
    );
    cancel.check()?;

    let skeleton: Vec<LineString<f64>> = graph
        .lines()
        .into_iter()
        .filter(|ls| geometry::line_length(ls) >= policy.postprocess_min_len_m)
        .collect();
    push_stage(
        &mut stages,
        "05_finalize",
        [
            ("line_count", skeleton.len() as f64),
            ("min_len", policy.postprocess_min_len_m),
        ]
        .into(),
    );
    info!(
        "skeleton extraction done in {:.2}s ({} lines)",
        skeleton_timer.elapsed().as_secs_f64(),
        skeleton.len()
    );
    cancel.check()?;

    let topology_timer = Instant::now();
    let input_geom = MultiPolygon(polygons.to_vec());
    let outcome = topology::normalize_topology(skeleton.clone(), &input_geom, config);
    info!(
        "topology normalization done in {:.2}s ({} lines)",
        topology_timer.elapsed().as_secs_f64(),
        outcome.final_lines.len()
    );

    diagnostics::report(
        &outcome.final_lines,
        &input_geom,
        &diagnostics::DiagnosticsPolicy::default(),
    );
    info!(
        "pipeline finished in {:.2}s",
        total_timer.elapsed().as_secs_f64()
    );

    let debug = config.debug_export_intermediate.then(|| DebugStages {
        skeleton,
        planarized: outcome.planarized,
        cleaned: outcome.cleaned,
    });
    Ok(CenterlineOutput {
        lines: outcome.final_lines,
        stages,
        debug,
    })
}

fn push_stage(
    stages: &mut Vec<StageMeta>,
    stage: &'static str,
    meta: BTreeMap<&'static str, f64>,
) {
    let summary = meta
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    info!("[stage:{}] {}", stage, summary);
    stages.push(StageMeta { stage, meta });
}

/// Short edge of each polygon's minimum rotated rectangle.
fn width_samples(polygons: &[Polygon<f64>]) -> Vec<f64> {
    polygons
        .iter()
        .filter_map(geometry::min_rect_edge_lengths)
        .map(|(short, _)| short)
        .collect()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted[sorted.len() / 2]
}
