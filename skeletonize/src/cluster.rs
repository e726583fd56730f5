//! Groups input polygons into "same road unit" clusters before anything else
//! runs. Two polygons belong together when they share boundary, point the
//! same way, or sit close enough while agreeing on direction; clusters are
//! unioned into the working geometry.

use std::collections::BTreeMap;

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{unary_union, BoundingRect, EuclideanDistance, LineString, MultiPolygon, Polygon};
use itertools::Itertools;

use crate::geometry::{self, coord_distance};
use crate::policy::SkeletonPolicy;

#[derive(Clone, Copy, Debug)]
struct PairFeature {
    distance: f64,
    shared_ratio: f64,
    axis_similarity: f64,
    score: f64,
}

struct RoadUnitClusterer<'a> {
    policy: &'a SkeletonPolicy,
    distance_th: f64,
    features: BTreeMap<(usize, usize), PairFeature>,
}

impl<'a> RoadUnitClusterer<'a> {
    fn new(geoms: &[Polygon<f64>], policy: &'a SkeletonPolicy) -> Self {
        let distance_th = policy.merge_distance_threshold().max(1e-6);
        let axes: Vec<Option<(f64, f64)>> = geoms.iter().map(geometry::long_axis).collect();

        let mut features = BTreeMap::new();
        for (i, j) in (0..geoms.len()).tuple_combinations() {
            let distance = geoms[i].euclidean_distance(&geoms[j]);
            let shared_len = shared_boundary_length(&geoms[i], &geoms[j]);
            let perim = boundary_length(&geoms[i])
                .min(boundary_length(&geoms[j]))
                .max(1.0);
            let shared_ratio = shared_len / perim;
            let axis_similarity = match (axes[i], axes[j]) {
                (Some(a), Some(b)) => (a.0 * b.0 + a.1 * b.1).abs(),
                _ => 0.5,
            };
            let score = Self::score(policy, distance_th, distance, shared_ratio, axis_similarity);
            features.insert(
                (i, j),
                PairFeature {
                    distance,
                    shared_ratio,
                    axis_similarity,
                    score,
                },
            );
        }

        Self {
            policy,
            distance_th,
            features,
        }
    }

    fn score(
        policy: &SkeletonPolicy,
        distance_th: f64,
        distance: f64,
        shared_ratio: f64,
        axis_similarity: f64,
    ) -> f64 {
        let shared_hi = policy.merge_shared_ratio_th.max(1e-6);
        let shared_lo = shared_hi * 0.5;
        let near_score = (1.0 - distance / distance_th).max(0.0);

        let mut score = (shared_ratio / shared_hi) * 1.2 + axis_similarity * 0.9 + near_score * 0.3;
        // Close but dissimilar: almost certainly two different roads running
        // past each other.
        if distance <= distance_th && shared_ratio < shared_lo && axis_similarity < 0.55 {
            score -= 2.0;
        }
        score
    }

    fn pair(&self, a: usize, b: usize) -> Option<&PairFeature> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.features.get(&key)
    }

    fn can_attach(&self, cluster: &[usize], cand: usize) -> bool {
        if cluster.is_empty() {
            return true;
        }
        let best = cluster
            .iter()
            .filter_map(|i| self.pair(*i, cand))
            .max_by(|a, b| a.score.total_cmp(&b.score));
        let Some(best) = best else {
            return false;
        };

        let shared_hi = self.policy.merge_shared_ratio_th;
        let shared_lo = shared_hi * 0.5;

        if best.distance <= self.distance_th
            && best.shared_ratio < shared_lo
            && best.axis_similarity < 0.55
        {
            return false;
        }
        if best.shared_ratio >= shared_hi && best.axis_similarity >= 0.55 {
            return true;
        }
        if best.shared_ratio >= shared_lo
            && best.axis_similarity >= 0.75
            && best.distance <= self.distance_th
        {
            return true;
        }
        best.score >= 1.8
    }
}

/// Grow clusters greedily and union each one; returns the combined geometry,
/// or `None` when there's nothing to merge.
pub fn merge_road_units(
    polygons: &[Polygon<f64>],
    policy: &SkeletonPolicy,
) -> Option<MultiPolygon<f64>> {
    use geo::Area;
    let geoms: Vec<Polygon<f64>> = polygons
        .iter()
        .filter(|p| p.unsigned_area() > 0.0)
        .cloned()
        .collect();
    if geoms.is_empty() {
        return None;
    }

    let clusterer = RoadUnitClusterer::new(&geoms, policy);
    let mut used = vec![false; geoms.len()];
    let mut merged_parts: Vec<MultiPolygon<f64>> = Vec::new();

    for i in 0..geoms.len() {
        if used[i] {
            continue;
        }
        let mut cluster = vec![i];
        used[i] = true;
        let mut changed = true;
        while changed {
            changed = false;
            for j in 0..geoms.len() {
                if used[j] {
                    continue;
                }
                if clusterer.can_attach(&cluster, j) {
                    cluster.push(j);
                    used[j] = true;
                    changed = true;
                }
            }
        }

        let members: Vec<&Polygon<f64>> = cluster.iter().map(|idx| &geoms[*idx]).collect();
        merged_parts.push(unary_union(members));
        debug!("merged road-unit cluster of {} polygons", cluster.len());
    }

    Some(unary_union(merged_parts.iter()))
}

fn boundary_length(poly: &Polygon<f64>) -> f64 {
    let mut total = geometry::line_length(poly.exterior());
    for ring in poly.interiors() {
        total += geometry::line_length(ring);
    }
    total
}

/// Length of boundary both polygons run along together, summed over
/// collinear segment overlaps.
fn shared_boundary_length(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    let (Some(rect_a), Some(rect_b)) = (a.bounding_rect(), b.bounding_rect()) else {
        return 0.0;
    };
    // Touching boundaries need touching bboxes.
    if rect_a.min().x > rect_b.max().x
        || rect_b.min().x > rect_a.max().x
        || rect_a.min().y > rect_b.max().y
        || rect_b.min().y > rect_a.max().y
    {
        return 0.0;
    }

    let rings_a: Vec<&LineString<f64>> =
        std::iter::once(a.exterior()).chain(a.interiors()).collect();
    let rings_b: Vec<&LineString<f64>> =
        std::iter::once(b.exterior()).chain(b.interiors()).collect();

    let mut total = 0.0;
    for ring_a in &rings_a {
        for seg_a in ring_a.lines() {
            for ring_b in &rings_b {
                for seg_b in ring_b.lines() {
                    if let Some(LineIntersection::Collinear { intersection }) =
                        line_intersection(seg_a, seg_b)
                    {
                        total += coord_distance(intersection.start, intersection.end);
                    }
                }
            }
        }
    }
    total
}
