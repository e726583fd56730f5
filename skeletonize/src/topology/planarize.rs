//! Noded union of the line set: every mutual crossing or touch becomes a
//! split point, so afterwards lines only meet at shared endpoints. The
//! geometry kernel's boolean ops are polygon-only, so the noding is done
//! directly: an R-tree pairs up candidate segments, exact segment
//! intersections supply the split points, and exact duplicate pieces are
//! dropped.

use std::collections::{BTreeMap, HashSet};

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line, LineString};
use rstar::{RTree, RTreeObject, AABB};

use crate::geometry;

const PARAM_EPS: f64 = 1e-9;

struct SegEnvelope {
    idx: usize,
    lower: [f64; 2],
    upper: [f64; 2],
}

impl RTreeObject for SegEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.lower, self.upper)
    }
}

pub fn planarize(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    if lines.is_empty() {
        return lines;
    }

    // Flatten to segments, remembering which line and position each came from.
    let mut segments: Vec<(usize, usize, Line<f64>)> = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for (seg_idx, seg) in line.lines().enumerate() {
            segments.push((line_idx, seg_idx, seg));
        }
    }

    let tree = RTree::bulk_load(
        segments
            .iter()
            .enumerate()
            .map(|(idx, (_, _, seg))| SegEnvelope {
                idx,
                lower: [seg.start.x.min(seg.end.x), seg.start.y.min(seg.end.y)],
                upper: [seg.start.x.max(seg.end.x), seg.start.y.max(seg.end.y)],
            })
            .collect(),
    );

    // Split points per flattened segment index.
    let mut splits: BTreeMap<usize, Vec<Coord<f64>>> = BTreeMap::new();
    for (i, (line_a, _, seg_a)) in segments.iter().enumerate() {
        for cand in tree.locate_in_envelope_intersecting(&segment_envelope(seg_a)) {
            let j = cand.idx;
            if j <= i {
                continue;
            }
            let (line_b, _, seg_b) = &segments[j];
            if line_a == line_b && segments[i].1.abs_diff(segments[j].1) <= 1 {
                // Consecutive segments of one line always touch; that's not a
                // crossing.
                continue;
            }
            match line_intersection(*seg_a, *seg_b) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    splits.entry(i).or_default().push(intersection);
                    splits.entry(j).or_default().push(intersection);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for p in [intersection.start, intersection.end] {
                        splits.entry(i).or_default().push(p);
                        splits.entry(j).or_default().push(p);
                    }
                }
                None => {}
            }
        }
    }

    // Rebuild each line, breaking at every split point strictly inside a
    // segment.
    let mut seen: HashSet<Vec<(i64, i64)>> = HashSet::new();
    let mut out: Vec<LineString<f64>> = Vec::new();
    let mut flat_idx = 0usize;
    for line in &lines {
        let mut current: Vec<Coord<f64>> = vec![line.0[0]];
        for seg in line.lines() {
            let mut cuts: Vec<(f64, Coord<f64>)> = splits
                .get(&flat_idx)
                .map(|pts| {
                    pts.iter()
                        .map(|p| (segment_param(&seg, *p), *p))
                        .filter(|(t, _)| *t > PARAM_EPS && *t < 1.0 - PARAM_EPS)
                        .collect()
                })
                .unwrap_or_default();
            cuts.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (_, p) in cuts {
                if current.last() == Some(&p) {
                    continue;
                }
                current.push(p);
                emit(&mut out, &mut seen, std::mem::take(&mut current));
                current = vec![p];
            }
            if current.last() != Some(&seg.end) {
                current.push(seg.end);
            }
            flat_idx += 1;
        }
        emit(&mut out, &mut seen, current);
    }
    out
}

fn emit(
    out: &mut Vec<LineString<f64>>,
    seen: &mut HashSet<Vec<(i64, i64)>>,
    coords: Vec<Coord<f64>>,
) {
    let mut cleaned: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in coords {
        if cleaned.last() != Some(&c) {
            cleaned.push(c);
        }
    }
    if cleaned.len() < 2 {
        return;
    }
    let line = LineString::new(cleaned);
    if geometry::line_length(&line) <= 0.0 {
        return;
    }

    // Overlapping inputs produce the same piece twice; keep one.
    let forward: Vec<(i64, i64)> = line
        .0
        .iter()
        .map(|c| ((c.x * 1000.0).round() as i64, (c.y * 1000.0).round() as i64))
        .collect();
    let mut backward = forward.clone();
    backward.reverse();
    let key = forward.min(backward);
    if seen.insert(key) {
        out.push(line);
    }
}

fn segment_envelope(seg: &Line<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [seg.start.x.min(seg.end.x), seg.start.y.min(seg.end.y)],
        [seg.start.x.max(seg.end.x), seg.start.y.max(seg.end.y)],
    )
}

/// Parameter of `p` along `seg` in [0, 1], by projection onto the segment.
fn segment_param(seg: &Line<f64>, p: Coord<f64>) -> f64 {
    let dx = seg.end.x - seg.start.x;
    let dy = seg.end.y - seg.start.y;
    let len2 = dx * dx + dy * dy;
    if len2 <= 0.0 {
        return 0.0;
    }
    (((p.x - seg.start.x) * dx + (p.y - seg.start.y) * dy) / len2).clamp(0.0, 1.0)
}
