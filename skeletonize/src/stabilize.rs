//! Polygon stabilization: a morphological open-close knocks off protrusions
//! and pinches, a light simplification removes sliver vertices, and parts too
//! narrow to hold a lane are discarded. The result is the reference boundary
//! for the whole rest of the pipeline.

use geo::orient::{Direction, Orient};
use geo::{unary_union, Area, MultiPolygon, Polygon, Simplify};
use geo_buffer::{buffer_multi_polygon, buffer_polygon};

use crate::geometry;
use crate::policy::SkeletonPolicy;

pub fn stabilize_geometry(geom: &MultiPolygon<f64>, policy: &SkeletonPolicy) -> MultiPolygon<f64> {
    let mut stable_parts: Vec<Polygon<f64>> = Vec::new();

    for poly in &geom.0 {
        if poly.unsigned_area() <= 0.0 {
            continue;
        }
        // The straight-skeleton buffer can panic on pathological reflex
        // chains; a failed part falls back to its raw geometry rather than
        // aborting the run.
        let cleaned = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            open_close(poly, policy.protrusion_clean_m)
        })) {
            Ok(cleaned) => cleaned,
            Err(_) => {
                warn!("open-close buffering failed for a polygon part; keeping it raw");
                MultiPolygon(vec![poly.clone()])
            }
        };
        let simplified = cleaned.simplify(&policy.sharp_angle_simplify_m);
        let survivors: Vec<Polygon<f64>> = simplified
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > 0.0 && passes_min_width(p, policy))
            .collect();
        if survivors.is_empty() {
            warn!("stabilization emptied a polygon part; keeping the original");
        }
        stable_parts.extend(survivors);
    }

    if stable_parts.is_empty() {
        // Fall back to the raw geometry.
        return geom.clone();
    }

    unary_union(stable_parts.iter())
}

/// `buffer(-d).buffer(+d)`: erase anything thinner than `2 * d`.
fn open_close(poly: &Polygon<f64>, d: f64) -> MultiPolygon<f64> {
    let oriented = poly.orient(Direction::Default);
    let shrunk = buffer_polygon(&oriented, -d);
    if shrunk.0.is_empty() {
        return shrunk;
    }
    buffer_multi_polygon(&shrunk, d)
}

fn passes_min_width(poly: &Polygon<f64>, policy: &SkeletonPolicy) -> bool {
    match geometry::min_rect_edge_lengths(poly) {
        Some((short, _)) => short >= policy.min_lane_width_m,
        None => false,
    }
}
