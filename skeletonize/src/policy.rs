//! Data-driven thresholds. Every knob in the pipeline is a function of the
//! median road width observed in the input, with clamps keeping degenerate
//! datasets from producing degenerate parameters.

/// Width regime of the dataset, from the median short edge of per-polygon
/// minimum rotated rectangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidthRegime {
    Urban,
    Rural,
}

impl WidthRegime {
    pub fn name(self) -> &'static str {
        match self {
            WidthRegime::Urban => "urban",
            WidthRegime::Rural => "rural",
        }
    }
}

/// Immutable threshold set derived once per run. All distances in metres,
/// angles in degrees.
#[derive(Clone, Debug)]
pub struct SkeletonPolicy {
    pub regime: WidthRegime,

    // Preprocessing
    pub protrusion_clean_m: f64,
    pub sharp_angle_simplify_m: f64,
    pub min_lane_width_m: f64,

    // Candidate generation
    pub voronoi_density_interval_m: f64,
    pub pair_sample_step_m: f64,
    pub pair_axis_bin_m: f64,
    pub pair_segment_break_bin_ratio: f64,
    pub boundary_sample_min_step_m: f64,

    // Cluster merge
    pub merge_shared_ratio_th: f64,
    pub merge_distance_min_m: f64,
    pub merge_distance_lane_width_ratio: f64,

    // Candidate selection
    pub selector_min_quality_score: f64,
    pub selector_keep_top_ratio: f64,
    pub selector_length_ref_factor: f64,
    pub selector_inside_sample_step_m: f64,

    // Smoothing
    pub graph_smooth_iterations: usize,
    pub graph_smooth_alpha: f64,
    pub graph_smooth_target_shift_m: f64,
    pub direction_smooth_window: usize,
    pub resample_step_m: f64,
    pub resample_min_step_m: f64,

    // Reconnect
    pub reconnect_search_radius_m: f64,
    pub reconnect_angle_deg: f64,
    pub reconnect_boundary_buffer_m: f64,
    pub reconnect_min_inside_ratio: f64,

    // Parallel separation
    pub parallel_close_dist_factor: f64,
    pub parallel_angle_deg: f64,
    pub parallel_offset_factor: f64,

    // Pruners
    pub prune_ratio_limit: f64,
    pub boundary_min_radius_hit_m: f64,
    pub boundary_max_hit_ratio: f64,
    pub boundary_max_abs_hits: usize,
    pub boundary_remove_leaf_edges_count: usize,
    pub boundary_protect_component_min_total_len_m: f64,
    pub boundary_protect_component_max_radius_m: f64,
    pub boundary_hard_min_radius_m: f64,
    pub component_min_total_len_m: f64,
    pub component_protect_max_radius_m: f64,
    pub spur_abs_max_len_m: f64,
    pub spur_rel_ratio: f64,

    pub postprocess_min_len_m: f64,
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.clamp(lo, hi)
}

impl SkeletonPolicy {
    /// Derive the threshold set from observed road widths. An empty
    /// distribution falls back to an 8 m median.
    pub fn from_width_distribution(widths: &[f64]) -> Self {
        let mut vals: Vec<f64> = widths.iter().copied().filter(|w| *w > 0.0).collect();
        if vals.is_empty() {
            vals.push(8.0);
        }
        vals.sort_by(f64::total_cmp);
        let median = vals[vals.len() / 2];

        let rural = median >= 12.0;
        let regime = if rural {
            WidthRegime::Rural
        } else {
            WidthRegime::Urban
        };

        Self {
            regime,
            protrusion_clean_m: clamp(median * 0.02, 0.15, 0.5),
            sharp_angle_simplify_m: clamp(median * 0.018, 0.1, 0.45),
            min_lane_width_m: clamp(median * 0.12, 1.4, 3.5),
            voronoi_density_interval_m: clamp(median * 0.08, 0.35, 1.2),
            pair_sample_step_m: clamp(median * 0.16, 1.0, 3.0),
            pair_axis_bin_m: clamp(median * 0.10, 0.8, 2.0),
            pair_segment_break_bin_ratio: clamp(3.0, 1.0, 10.0),
            boundary_sample_min_step_m: clamp(0.5, 0.1, 2.0),
            merge_shared_ratio_th: clamp(if rural { 0.06 } else { 0.08 }, 0.04, 0.15),
            merge_distance_min_m: clamp(0.5, 0.1, 2.0),
            merge_distance_lane_width_ratio: clamp(0.7, 0.2, 2.0),
            selector_min_quality_score: 0.55,
            selector_keep_top_ratio: 0.35,
            selector_length_ref_factor: 4.0,
            selector_inside_sample_step_m: clamp(median * 0.10, 0.5, 2.0),
            graph_smooth_iterations: if rural { 3 } else { 2 },
            graph_smooth_alpha: if rural { 0.30 } else { 0.35 },
            graph_smooth_target_shift_m: clamp(0.5, 0.1, 2.0),
            direction_smooth_window: if rural { 5 } else { 4 },
            resample_step_m: clamp(median * 0.12, 0.8, 2.5),
            resample_min_step_m: clamp(0.4, 0.1, 2.0),
            reconnect_search_radius_m: clamp(median * 0.9, 4.0, 14.0),
            reconnect_angle_deg: if rural { 25.0 } else { 20.0 },
            reconnect_boundary_buffer_m: clamp(median * 0.05, 0.1, 1.0),
            reconnect_min_inside_ratio: clamp(0.97, 0.8, 1.0),
            parallel_close_dist_factor: clamp(0.8, 0.5, 1.2),
            parallel_angle_deg: clamp(12.0, 5.0, 25.0),
            parallel_offset_factor: clamp(0.2, 0.05, 0.5),
            prune_ratio_limit: clamp(if rural { 1.8 } else { 1.3 }, 1.0, 3.0),
            boundary_min_radius_hit_m: clamp(if rural { 0.22 } else { 0.12 }, 0.05, 0.6),
            boundary_max_hit_ratio: clamp(if rural { 0.30 } else { 0.45 }, 0.1, 0.8),
            boundary_max_abs_hits: if rural { 3 } else { 4 },
            boundary_remove_leaf_edges_count: 2,
            boundary_protect_component_min_total_len_m: clamp(30.0, 5.0, 120.0),
            boundary_protect_component_max_radius_m: clamp(1.0, 0.2, 4.0),
            boundary_hard_min_radius_m: clamp(0.05, 0.01, 0.2),
            component_min_total_len_m: clamp(if rural { 18.0 } else { 10.0 }, 3.0, 80.0),
            component_protect_max_radius_m: clamp(1.0, 0.2, 4.0),
            spur_abs_max_len_m: clamp(if rural { 3.5 } else { 2.0 }, 0.5, 10.0),
            spur_rel_ratio: clamp(if rural { 0.25 } else { 0.15 }, 0.05, 0.6),
            postprocess_min_len_m: clamp(median * 0.15, 1.0, 4.0),
        }
    }

    /// How close two polygons must be before the cluster merge will consider
    /// joining them without a shared boundary.
    pub fn merge_distance_threshold(&self) -> f64 {
        self.merge_distance_min_m
            .max(self.min_lane_width_m * self.merge_distance_lane_width_ratio)
    }
}
