//! Small geometric helpers shared across the pipeline. Anything that needs a
//! real algorithm (boolean ops, simplification, rotated rectangles) goes
//! through the `geo` kernel; this is just the glue.

use geo::{
    Coord, Distance, Euclidean, EuclideanDistance, Length, LineInterpolatePoint, LineString,
    MinimumRotatedRect, MultiLineString, MultiPolygon, Point, Polygon,
};

pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

pub fn line_length(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

pub fn point_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    Euclidean.distance(a, b)
}

pub fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Euclidean.distance(Point(a), Point(b))
}

/// All rings of all parts, as bare lines. This is the reference boundary for
/// radius and proximity tests.
pub fn boundary_lines(geom: &MultiPolygon<f64>) -> MultiLineString<f64> {
    let mut lines = Vec::new();
    for poly in &geom.0 {
        lines.push(poly.exterior().clone());
        lines.extend(poly.interiors().iter().cloned());
    }
    MultiLineString::new(lines)
}

pub fn distance_to_lines(pt: Point<f64>, lines: &MultiLineString<f64>) -> f64 {
    lines
        .0
        .iter()
        .map(|ls| pt.euclidean_distance(ls))
        .fold(f64::INFINITY, f64::min)
}

pub fn unit(dx: f64, dy: f64) -> Option<(f64, f64)> {
    let len = dx.hypot(dy);
    if len > 0.0 {
        Some((dx / len, dy / len))
    } else {
        None
    }
}

/// Acute angle between two directions in degrees, ignoring orientation
/// (parallel and anti-parallel both come out as 0).
pub fn angle_between_deg(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dot = (a.0 * b.0 + a.1 * b.1).clamp(-1.0, 1.0);
    dot.abs().acos().to_degrees()
}

/// Unit direction of the straight chord from first to last vertex.
pub fn chord_direction(line: &LineString<f64>) -> Option<(f64, f64)> {
    let first = line.0.first()?;
    let last = line.0.last()?;
    unit(last.x - first.x, last.y - first.y)
}

/// The four edge lengths of the minimum rotated rectangle, as (short, long).
pub fn min_rect_edge_lengths(poly: &Polygon<f64>) -> Option<(f64, f64)> {
    let rect = poly.minimum_rotated_rect()?;
    let coords = &rect.exterior().0;
    if coords.len() < 5 {
        return None;
    }
    let mut shortest = f64::INFINITY;
    let mut longest: f64 = 0.0;
    for i in 0..4 {
        let len = coord_distance(coords[i], coords[i + 1]);
        shortest = shortest.min(len);
        longest = longest.max(len);
    }
    if shortest.is_finite() {
        Some((shortest, longest))
    } else {
        None
    }
}

/// Unit vector along the longest edge of the minimum rotated rectangle.
pub fn long_axis(poly: &Polygon<f64>) -> Option<(f64, f64)> {
    let rect = poly.minimum_rotated_rect()?;
    let coords = &rect.exterior().0;
    if coords.len() < 5 {
        return None;
    }
    let best = (0..4)
        .map(|i| (coords[i + 1].x - coords[i].x, coords[i + 1].y - coords[i].y))
        .max_by(|a, b| a.0.hypot(a.1).total_cmp(&b.0.hypot(b.1)))?;
    unit(best.0, best.1)
}

pub fn point_at(line: &LineString<f64>, fraction: f64) -> Option<Point<f64>> {
    line.line_interpolate_point(fraction.clamp(0.0, 1.0))
}

pub fn midpoint(line: &LineString<f64>) -> Option<Point<f64>> {
    point_at(line, 0.5)
}

/// `n` evenly spaced points from start to end (inclusive), n >= 2.
pub fn sample_points(line: &LineString<f64>, n: usize) -> Vec<Point<f64>> {
    let n = n.max(2);
    (0..n)
        .filter_map(|i| point_at(line, i as f64 / (n - 1) as f64))
        .collect()
}

/// Average per-vertex turn angle, normalized by pi into [0, 1]. Straight
/// lines score 0.
pub fn curvature_penalty(line: &LineString<f64>) -> f64 {
    let coords = &line.0;
    if coords.len() < 3 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut turns = 0usize;
    for i in 1..coords.len() - 1 {
        let a = unit(coords[i].x - coords[i - 1].x, coords[i].y - coords[i - 1].y);
        let b = unit(coords[i + 1].x - coords[i].x, coords[i + 1].y - coords[i].y);
        let (Some(a), Some(b)) = (a, b) else {
            continue;
        };
        let dot = (a.0 * b.0 + a.1 * b.1).clamp(-1.0, 1.0);
        total += dot.acos();
        turns += 1;
    }
    if turns == 0 {
        return 0.0;
    }
    (total / (std::f64::consts::PI * turns as f64)).clamp(0.0, 1.0)
}
