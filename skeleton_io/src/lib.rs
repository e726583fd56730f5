//! File boundary for the centerline pipeline: load road polygons from a
//! shapefile (asserting a metric CRS), write centerline results as ESRI
//! Shapefile or GeoJSON, and drive the whole load -> skeletonize -> validate
//! -> write flow.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geo::{Geometry, LineString, MultiPolygon, Polygon};

use skeletonize::{extract_centerlines, validate_centerlines, CancelToken, GisConfig};

/// Polygons plus the CRS definition they came with (the `.prj` sidecar WKT).
pub struct PolygonSource {
    pub polygons: Vec<Polygon<f64>>,
    pub crs_wkt: String,
}

/// Load a polygon shapefile. Hard errors: wrong extension, missing file,
/// empty dataset, missing `.prj`, or a CRS whose unit isn't metres.
pub fn load_road_polygons(path: &Path) -> Result<PolygonSource> {
    let is_shp = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("shp"))
        .unwrap_or(false);
    if !is_shp {
        bail!("unsupported input format (need .shp): {}", path.display());
    }
    if !path.is_file() {
        bail!("input file not found: {}", path.display());
    }

    let crs_wkt = read_prj(path)?;
    if !is_metre_unit(&crs_wkt) {
        bail!(
            "input CRS unit is not metres: {}",
            path.with_extension("prj").display()
        );
    }

    let rows = shapefile::read(path)
        .with_context(|| format!("couldn't read shapefile {}", path.display()))?;
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for (idx, (shape, _record)) in rows.into_iter().enumerate() {
        let multi: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(p) => p
                .try_into()
                .map_err(|e| anyhow!("invalid polygon at row {}: {:?}", idx, e))?,
            shapefile::Shape::PolygonM(p) => p
                .try_into()
                .map_err(|e| anyhow!("invalid polygon at row {}: {:?}", idx, e))?,
            shapefile::Shape::NullShape => continue,
            other => bail!(
                "row {} is a {}, expected polygons",
                idx,
                other.shapetype()
            ),
        };
        polygons.extend(multi.0);
    }

    if polygons.is_empty() {
        bail!("loaded dataset is empty: {}", path.display());
    }
    info!(
        "loaded {} polygon parts from {}",
        polygons.len(),
        path.display()
    );
    Ok(PolygonSource { polygons, crs_wkt })
}

/// Write centerlines next to a copied `.prj`. The output format follows the
/// extension: `.shp` or `.geojson`. Every geometry must be a `LineString` or
/// `MultiLineString`; anything else fails before a single byte is written.
pub fn save_centerlines(
    geometries: &[Geometry<f64>],
    path: &Path,
    crs_wkt: Option<&str>,
) -> Result<PathBuf> {
    for (idx, geom) in geometries.iter().enumerate() {
        match geom {
            Geometry::LineString(_) | Geometry::MultiLineString(_) => {}
            _ => bail!("geometry {} is not a line, refusing to write", idx),
        }
    }
    if geometries.is_empty() {
        warn!("writing an empty result to {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("couldn't create {}", parent.display()))?;
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "shp" => {
            write_shapefile(geometries, path)?;
            if let Some(wkt) = crs_wkt {
                std::fs::write(path.with_extension("prj"), wkt)
                    .with_context(|| format!("couldn't write {}", path.display()))?;
            }
        }
        "geojson" | "json" => write_geojson(geometries, path)?,
        other => bail!("unsupported output format: .{}", other),
    }

    info!("saved {} features to {}", geometries.len(), path.display());
    Ok(path.to_path_buf())
}

/// Full run: load polygons, extract centerlines, QA-validate, write
/// `<output_dir>/<stem>_centerline.shp`. With `debug_export_intermediate`
/// set, per-stage line sets land next to it.
pub fn run_pipeline(
    input_path: &Path,
    output_dir: &Path,
    config: &GisConfig,
    cancel: &CancelToken,
) -> Result<PathBuf> {
    let source = load_road_polygons(input_path)?;
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("roads");

    let output = extract_centerlines(&source.polygons, config, cancel)?;

    if let Some(debug) = &output.debug {
        for (stage, lines) in [
            ("01_skeleton", &debug.skeleton),
            ("02_planarized", &debug.planarized),
            ("03_cleaned", &debug.cleaned),
            ("04_final_raw", &output.lines),
        ] {
            if lines.is_empty() {
                continue;
            }
            let stage_path = output_dir.join(format!("{}_{}.shp", stem, stage));
            if let Err(err) =
                save_centerlines(&to_geometries(lines), &stage_path, Some(&source.crs_wkt))
            {
                warn!("debug export of {} failed: {}", stage, err);
            }
        }
    }

    let input_geom = MultiPolygon(source.polygons.clone());
    validate_centerlines(&output.lines, &input_geom, config);

    let out_path = output_dir.join(format!("{}_centerline.shp", stem));
    save_centerlines(&to_geometries(&output.lines), &out_path, Some(&source.crs_wkt))
}

fn to_geometries(lines: &[LineString<f64>]) -> Vec<Geometry<f64>> {
    lines
        .iter()
        .map(|ls| Geometry::LineString(ls.clone()))
        .collect()
}

fn read_prj(shp_path: &Path) -> Result<String> {
    let prj = shp_path.with_extension("prj");
    if !prj.is_file() {
        bail!("input has no CRS (missing {})", prj.display());
    }
    std::fs::read_to_string(&prj).with_context(|| format!("couldn't read {}", prj.display()))
}

/// The CRS counts as metric when its WKT declares a metre unit.
fn is_metre_unit(wkt: &str) -> bool {
    let lower = wkt.to_lowercase();
    lower.contains("unit[\"metre") || lower.contains("unit[\"meter")
        || lower.contains("unit[metre") || lower.contains("unit[meter")
}

fn write_shapefile(geometries: &[Geometry<f64>], path: &Path) -> Result<()> {
    let table = shapefile::dbase::TableWriterBuilder::new().add_numeric_field(
        shapefile::dbase::FieldName::try_from("id")
            .map_err(|e| anyhow!("invalid dbf field name: {:?}", e))?,
        10,
        0,
    );
    let mut writer = shapefile::Writer::from_path(path, table)
        .with_context(|| format!("couldn't create {}", path.display()))?;

    for (idx, geom) in geometries.iter().enumerate() {
        let parts: Vec<Vec<shapefile::Point>> = match geom {
            Geometry::LineString(ls) => vec![to_points(ls)],
            Geometry::MultiLineString(mls) => mls.0.iter().map(to_points).collect(),
            _ => unreachable!("checked by save_centerlines"),
        };
        let shape = shapefile::Polyline::with_parts(parts);
        let mut record = shapefile::dbase::Record::default();
        record.insert(
            "id".to_string(),
            shapefile::dbase::FieldValue::Numeric(Some(idx as f64)),
        );
        writer
            .write_shape_and_record(&shape, &record)
            .with_context(|| format!("couldn't write feature {}", idx))?;
    }
    Ok(())
}

fn to_points(ls: &LineString<f64>) -> Vec<shapefile::Point> {
    ls.0.iter()
        .map(|c| shapefile::Point { x: c.x, y: c.y })
        .collect()
}

fn write_geojson(geometries: &[Geometry<f64>], path: &Path) -> Result<()> {
    let features: Vec<geojson::Feature> = geometries
        .iter()
        .map(|geom| geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(geom))),
            id: None,
            properties: None,
            foreign_members: None,
        })
        .collect();
    let collection = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    std::fs::write(path, collection.to_string())
        .with_context(|| format!("couldn't write {}", path.display()))?;
    Ok(())
}
