//! Voronoi-based skeleton candidates. The boundary of each stabilized part is
//! densified and fed to a Delaunay triangulation; the finite edges of the
//! dual Voronoi diagram approximate the medial axis. Clipping them to the
//! polygon and merging runs between branch points leaves the raw centerline
//! chains. The diagram's infinite rays are dual to hull edges, which for
//! boundary-sampled input means "perpendicular comb teeth"; they carry no
//! axis information and are skipped outright.

use anyhow::Result;
use geo::{
    BooleanOps, Contains, Coord, Densify, Euclidean, Line, LineString, MultiLineString,
    MultiPolygon, Polygon,
};
use spade::handles::VoronoiVertex::{Inner, Outer};
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::geometry;
use crate::policy::SkeletonPolicy;
use crate::PlanarGraph;

pub fn generate_voronoi_skeleton(
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
) -> Vec<LineString<f64>> {
    let mut all_lines = Vec::new();
    for poly in &stable.0 {
        match part_skeleton(poly, policy) {
            Ok(lines) => all_lines.extend(lines),
            Err(err) => warn!("voronoi skeleton failed for a polygon part: {}", err),
        }
    }
    filter_by_local_width(all_lines, stable, policy)
}

fn part_skeleton(poly: &Polygon<f64>, policy: &SkeletonPolicy) -> Result<Vec<LineString<f64>>> {
    let interval = policy.voronoi_density_interval_m;
    let mut sites: Vec<Coord<f64>> = Euclidean.densify(poly.exterior(), interval).0;
    for interior in poly.interiors() {
        sites.extend(Euclidean.densify(interior, interval).0.iter().copied());
    }
    if sites.len() < 3 {
        bail!("fewer than 3 boundary sites");
    }

    let ridges = finite_voronoi_edges(&sites)?;
    let diagram = MultiLineString::new(
        ridges
            .into_iter()
            .map(|l| LineString::from(vec![l.start, l.end]))
            .collect(),
    );
    let clipped = poly.clip(&diagram, false);

    // Chain the pieces back together through pass-through vertices, so a
    // straight run of medial axis comes out as one candidate instead of a
    // confetti of circumcenter-to-circumcenter stubs. Branch points stay.
    let mut graph = PlanarGraph::from_lines(
        clipped
            .0
            .into_iter()
            .filter(|ls| ls.0.len() >= 2 && geometry::line_length(ls) > 0.0),
    );
    graph.merge_degree_two_nodes();
    Ok(graph.lines())
}

/// Finite (vertex-to-vertex) Voronoi diagram edges of a point set.
fn finite_voronoi_edges(sites: &[Coord<f64>]) -> Result<Vec<Line<f64>>> {
    let mut triangulation: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    for c in sites {
        triangulation.insert(Point2::new(c.x, c.y))?;
    }
    if triangulation.num_vertices() < 3 {
        bail!("degenerate site set");
    }

    let mut edges = Vec::new();
    for edge in triangulation.undirected_voronoi_edges() {
        match edge.vertices() {
            [Inner(from), Inner(to)] => {
                let a = from.circumcenter();
                let b = to.circumcenter();
                if a.x == b.x && a.y == b.y {
                    continue;
                }
                edges.push(Line::new(
                    Coord { x: a.x, y: a.y },
                    Coord { x: b.x, y: b.y },
                ));
            }
            [Inner(_), Outer(_)] | [Outer(_), Inner(_)] | [Outer(_), Outer(_)] => continue,
        }
    }
    Ok(edges)
}

/// A candidate only counts where the road is actually wide enough: its
/// midpoint must fall inside a part whose local width (twice the distance to
/// the boundary) clears the lane minimum. Midpoints outside every part are
/// noise from clipping and get dropped.
fn filter_by_local_width(
    lines: Vec<LineString<f64>>,
    stable: &MultiPolygon<f64>,
    policy: &SkeletonPolicy,
) -> Vec<LineString<f64>> {
    if stable.0.is_empty() {
        return lines;
    }
    let part_boundaries: Vec<MultiLineString<f64>> = stable
        .0
        .iter()
        .map(|p| geometry::boundary_lines(&MultiPolygon(vec![p.clone()])))
        .collect();

    lines
        .into_iter()
        .filter(|line| {
            let Some(mid) = geometry::midpoint(line) else {
                return false;
            };
            let mut local_width: Option<f64> = None;
            for (poly, boundary) in stable.0.iter().zip(&part_boundaries) {
                if !poly.contains(&mid) {
                    continue;
                }
                let width = geometry::distance_to_lines(mid, boundary) * 2.0;
                local_width = Some(local_width.map_or(width, |w: f64| w.min(width)));
            }
            match local_width {
                Some(w) => w >= policy.min_lane_width_m,
                None => false,
            }
        })
        .collect()
}
