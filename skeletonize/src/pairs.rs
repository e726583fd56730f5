//! Boundary-pair centerline candidates: sample the exterior ring, project
//! samples onto the part's long axis, and pair off the extreme left/right
//! samples in each longitudinal bin. The bin midpoints strung together follow
//! the middle of the carriageway even where the Voronoi skeleton gets noisy.

use std::collections::BTreeMap;

use geo::{Centroid, LineString, MultiPolygon, Polygon};

use crate::geometry;
use crate::policy::SkeletonPolicy;

pub fn generate_boundary_pair_centerlines(
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
) -> Vec<LineString<f64>> {
    let mut out = Vec::new();
    for poly in &stable.0 {
        out.extend(part_centerlines(poly, policy));
    }
    out
}

fn part_centerlines(poly: &Polygon<f64>, policy: &SkeletonPolicy) -> Vec<LineString<f64>> {
    let Some(axis) = geometry::long_axis(poly) else {
        return Vec::new();
    };
    let normal = (-axis.1, axis.0);
    let Some(centroid) = poly.centroid() else {
        return Vec::new();
    };

    let sampled = sample_exterior(poly, policy);
    if sampled.len() < 4 {
        return Vec::new();
    }

    // Bucket samples along the axis, split by which side of it they fall on.
    #[derive(Default)]
    struct Bucket {
        left: Vec<(f64, f64, f64)>,
        right: Vec<(f64, f64, f64)>,
    }
    let mut buckets: BTreeMap<i64, Bucket> = BTreeMap::new();
    for (x, y) in &sampled {
        let rel_x = x - centroid.x();
        let rel_y = y - centroid.y();
        let longitudinal = rel_x * axis.0 + rel_y * axis.1;
        let lateral = rel_x * normal.0 + rel_y * normal.1;
        let key = (longitudinal / policy.pair_axis_bin_m).round() as i64;
        let bucket = buckets.entry(key).or_default();
        if lateral >= 0.0 {
            bucket.left.push((*x, *y, lateral.abs()));
        } else {
            bucket.right.push((*x, *y, lateral.abs()));
        }
    }

    // One midpoint per bin that sees both sides of the road.
    let mut mids: Vec<(i64, f64, f64)> = Vec::new();
    for (key, bucket) in &buckets {
        let (Some(left), Some(right)) = (extreme(&bucket.left), extreme(&bucket.right)) else {
            continue;
        };
        let width = (left.0 - right.0).hypot(left.1 - right.1);
        if width < policy.min_lane_width_m {
            continue;
        }
        mids.push((*key, (left.0 + right.0) / 2.0, (left.1 + right.1) / 2.0));
    }

    // Walk the bins in axis order, breaking whenever consecutive midpoints
    // jump further than a few bins' worth (don't stitch across gaps).
    let break_dist = policy.pair_axis_bin_m * policy.pair_segment_break_bin_ratio;
    let mut out = Vec::new();
    let mut segment: Vec<(f64, f64)> = Vec::new();
    for (idx, (_, mx, my)) in mids.iter().enumerate() {
        if idx > 0 {
            let (_, px, py) = mids[idx - 1];
            if (mx - px).hypot(my - py) > break_dist {
                if segment.len() >= 2 {
                    out.push(LineString::from(segment.clone()));
                }
                segment.clear();
            }
        }
        segment.push((*mx, *my));
    }
    if segment.len() >= 2 {
        out.push(LineString::from(segment));
    }
    out
}

fn extreme(side: &[(f64, f64, f64)]) -> Option<(f64, f64)> {
    side.iter()
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(x, y, _)| (*x, *y))
}

fn sample_exterior(poly: &Polygon<f64>, policy: &SkeletonPolicy) -> Vec<(f64, f64)> {
    let exterior = poly.exterior();
    let length = geometry::line_length(exterior);
    if length <= 0.0 {
        return Vec::new();
    }
    let step = policy
        .pair_sample_step_m
        .max(policy.boundary_sample_min_step_m);
    let n = ((length / step) as usize).max(8);
    (0..n)
        .filter_map(|i| geometry::point_at(exterior, i as f64 / n as f64))
        .map(|p| (p.x(), p.y()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{coord_distance, line_length};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    #[test]
    fn rectangle_midline_sits_on_the_axis() {
        let policy = SkeletonPolicy::from_width_distribution(&[6.0]);
        let stable = MultiPolygon(vec![rect(0.0, 0.0, 30.0, 6.0)]);
        let lines = generate_boundary_pair_centerlines(&stable, &policy);
        assert!(!lines.is_empty());

        for line in &lines {
            for c in &line.0 {
                assert!((c.y - 3.0).abs() < 1.0, "midpoint off-axis: {:?}", c);
            }
        }
        let total: f64 = lines.iter().map(line_length).sum();
        assert!(total > 15.0, "total = {total}");
    }

    #[test]
    fn narrow_rectangle_yields_nothing() {
        let policy = SkeletonPolicy::from_width_distribution(&[6.0]);
        // Width 1 m < min lane width: no bucket pair passes.
        let stable = MultiPolygon(vec![rect(0.0, 0.0, 30.0, 1.0)]);
        assert!(generate_boundary_pair_centerlines(&stable, &policy).is_empty());
    }

    #[test]
    fn distant_fragments_do_not_get_stitched() {
        let policy = SkeletonPolicy::from_width_distribution(&[6.0]);
        // An L of two strips; the corner region pairs oddly, but nothing
        // should connect samples across more than a few bins.
        let stable = MultiPolygon(vec![rect(0.0, 0.0, 40.0, 6.0)]);
        let lines = generate_boundary_pair_centerlines(&stable, &policy);
        let break_dist = policy.pair_axis_bin_m * policy.pair_segment_break_bin_ratio;
        for line in &lines {
            for pair in line.0.windows(2) {
                assert!(coord_distance(pair[0], pair[1]) <= break_dist + 1e-9);
            }
        }
    }
}
