//! Scores raw centerline candidates and keeps the good ones. Each candidate
//! family (Voronoi, boundary-pair) is selected on its own: scoring picks the
//! pieces that are inside the road, centered, straight and long, and a
//! near-parallel suppression pass removes the duplication within the family.

use geo::{EuclideanDistance, Intersects, LineString, MultiLineString, MultiPolygon};

use crate::geometry;
use crate::policy::SkeletonPolicy;

pub fn select_candidates(
    lines: Vec<LineString<f64>>,
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
    group_name: &str,
) -> Vec<LineString<f64>> {
    let boundary = geometry::boundary_lines(stable);
    let input_count = lines.len();

    let mut scored: Vec<(f64, LineString<f64>)> = lines
        .into_iter()
        .filter(|line| line.0.len() >= 2 && geometry::line_length(line) > 0.0)
        .map(|line| (quality_score(&line, stable, &boundary, policy), line))
        .collect();
    if scored.is_empty() {
        return Vec::new();
    }
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let passing = scored
        .iter()
        .take_while(|(score, _)| *score >= policy.selector_min_quality_score)
        .count();
    let pool_len = if passing > 0 {
        passing
    } else {
        // Nothing clears the bar; fall back to the best few so the polygon
        // still produces output.
        ((scored.len() as f64 * policy.selector_keep_top_ratio).ceil() as usize).max(1)
    };
    let pool = &scored[..pool_len];

    let selected = suppress_near_parallel_duplicates(pool, policy);
    info!(
        "[selector:{}] input={}, scored={}, quality_pass={}, pool={}, selected={}",
        group_name,
        input_count,
        scored.len(),
        passing,
        pool_len,
        selected.len()
    );
    selected
}

fn quality_score(
    line: &LineString<f64>,
    stable: &MultiPolygon<f64>,
    boundary: &MultiLineString<f64>,
    policy: &SkeletonPolicy,
) -> f64 {
    let inside = inside_ratio(line, stable, policy);
    let center = center_proximity_score(line, boundary, policy);
    let curvature = geometry::curvature_penalty(line);
    let length = length_score(line, policy);

    (inside * 0.45 + center * 0.25 + (1.0 - curvature) * 0.15 + length * 0.15).clamp(0.0, 1.0)
}

/// Fraction of sample points covered by the stabilized geometry.
fn inside_ratio(
    line: &LineString<f64>,
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
) -> f64 {
    if stable.0.is_empty() {
        return 0.0;
    }
    let samples = score_samples(line, policy);
    if samples.is_empty() {
        return 0.0;
    }
    let hits = samples.iter().filter(|pt| stable.intersects(*pt)).count();
    hits as f64 / samples.len() as f64
}

/// 1.0 for samples at least half a lane from the boundary, scaled down
/// linearly below that.
fn center_proximity_score(
    line: &LineString<f64>,
    boundary: &MultiLineString<f64>,
    policy: &SkeletonPolicy,
) -> f64 {
    if boundary.0.is_empty() {
        return 0.0;
    }
    let target_radius = (policy.min_lane_width_m * 0.5).max(0.1);
    let tolerance = (policy.min_lane_width_m * 0.35).max(0.2);
    let samples = score_samples(line, policy);
    if samples.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for pt in &samples {
        let dist = geometry::distance_to_lines(*pt, boundary);
        if dist >= target_radius {
            total += 1.0;
        } else {
            total += (dist / tolerance).clamp(0.0, 1.0);
        }
    }
    total / samples.len() as f64
}

fn length_score(line: &LineString<f64>, policy: &SkeletonPolicy) -> f64 {
    let target = (policy.min_lane_width_m * policy.selector_length_ref_factor)
        .max(policy.postprocess_min_len_m);
    if target <= 0.0 {
        return 1.0;
    }
    (geometry::line_length(line) / target).clamp(0.0, 1.0)
}

fn score_samples(line: &LineString<f64>, policy: &SkeletonPolicy) -> Vec<geo::Point<f64>> {
    let step = policy.selector_inside_sample_step_m.max(0.1);
    let n = ((geometry::line_length(line) / step).ceil() as usize + 1).max(3);
    geometry::sample_points(line, n)
}

/// Walk the pool best-first; a candidate close to and nearly parallel with an
/// already kept one is a duplicate.
fn suppress_near_parallel_duplicates(
    pool: &[(f64, LineString<f64>)],
    policy: &SkeletonPolicy,
) -> Vec<LineString<f64>> {
    let min_dist = (policy.min_lane_width_m * 0.35).max(0.4);
    let max_angle = (policy.parallel_angle_deg * 0.8).max(5.0);

    let mut selected: Vec<LineString<f64>> = Vec::new();
    for (_, line) in pool {
        let duplicate = selected.iter().any(|existing| {
            line.euclidean_distance(existing) <= min_dist
                && line_angle_diff_deg(line, existing) <= max_angle
        });
        if !duplicate {
            selected.push(line.clone());
        }
    }
    selected
}

/// Angle between chords, modulo 180. Degenerate chords count as maximally
/// different so they never suppress anything.
fn line_angle_diff_deg(a: &LineString<f64>, b: &LineString<f64>) -> f64 {
    match (geometry::chord_direction(a), geometry::chord_direction(b)) {
        (Some(da), Some(db)) => geometry::angle_between_deg(da, db),
        _ => 180.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Polygon;

    fn rect_mp(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )])
    }

    fn policy() -> SkeletonPolicy {
        SkeletonPolicy::from_width_distribution(&[6.0])
    }

    #[test]
    fn centered_axis_line_beats_boundary_hugger() {
        let stable = rect_mp(0.0, 0.0, 30.0, 6.0);
        let boundary = geometry::boundary_lines(&stable);
        let policy = policy();

        let centered = LineString::from(vec![(2.0, 3.0), (28.0, 3.0)]);
        let hugging = LineString::from(vec![(2.0, 0.2), (28.0, 0.2)]);
        let outside = LineString::from(vec![(2.0, 9.0), (28.0, 9.0)]);

        let s_center = quality_score(&centered, &stable, &boundary, &policy);
        let s_hug = quality_score(&hugging, &stable, &boundary, &policy);
        let s_out = quality_score(&outside, &stable, &boundary, &policy);
        assert!(s_center > s_hug, "{s_center} vs {s_hug}");
        assert!(s_hug > s_out, "{s_hug} vs {s_out}");
        assert!(s_center >= 0.9);
        // An outside line loses the whole inside-ratio share.
        assert!(s_out <= 0.56);
    }

    #[test]
    fn near_parallel_duplicate_is_suppressed() {
        let stable = rect_mp(0.0, 0.0, 30.0, 6.0);
        let policy = policy();

        let a = LineString::from(vec![(2.0, 3.0), (28.0, 3.0)]);
        let b = LineString::from(vec![(2.0, 3.2), (28.0, 3.2)]);
        let selected = select_candidates(vec![a, b], &stable, &policy, "test");
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn crossing_lines_both_survive() {
        let stable = rect_mp(0.0, 0.0, 30.0, 30.0);
        let policy = policy();

        let a = LineString::from(vec![(2.0, 15.0), (28.0, 15.0)]);
        let b = LineString::from(vec![(15.0, 2.0), (15.0, 28.0)]);
        let selected = select_candidates(vec![a, b], &stable, &policy, "test");
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn low_scorers_fall_back_to_top_ratio() {
        let stable = rect_mp(0.0, 0.0, 30.0, 6.0);
        let policy = policy();

        // Wiggly lines outside the polygon; nothing passes the quality bar,
        // but at least one line must come back.
        let zigzag = |y0: f64| {
            LineString::from(vec![
                (0.0, y0),
                (2.0, y0 + 4.0),
                (4.0, y0),
                (6.0, y0 + 4.0),
                (8.0, y0),
            ])
        };
        let selected = select_candidates(vec![zigzag(20.0), zigzag(40.0)], &stable, &policy, "test");
        assert!(!selected.is_empty());
    }
}
