//! Shapefile export of the flagged topology graph.
//!
//! One feature record is written per node in ascending node-id order so
//! repeated exports of the same graph are byte-for-byte reproducible. The
//! attribute schema is fixed and the spillway flag is always the last
//! field. Existing files at the output path are overwritten silently.

mod reproject;

pub use reproject::reproject_points;

use std::path::Path;

use glam::DVec2;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing, Polyline, Writer};

use crate::error::{Error, Result};
use crate::grid::{CrsDescriptor, StructuredGrid};
use crate::network::{FlaggedGraph, NodeGeometry, NodeId, ResolvedGraph};

/// What geometry the export produces. A shapefile holds a single shape
/// type, so segment and lake exports go to separate files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportMode {
    /// One polyline per segment threading its reach cells (shape type 3).
    #[default]
    SegmentPolylines,
    /// One point per lake at its outlet cell, or at the member-cell
    /// centroid when no outlet is set (shape type 1).
    LakePoints,
    /// One polygon per lake with one outer ring per member cell
    /// (shape type 5).
    LakePolygons,
}

/// Export configuration.
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    pub mode: ExportMode,
    /// Target CRS; None exports in the grid's native coordinates.
    pub target_crs: Option<CrsDescriptor>,
}

/// Write the flagged graph to a shapefile at `path`.
pub fn write_shapefile(
    flagged: &FlaggedGraph,
    grid: &StructuredGrid,
    path: &Path,
    options: &ExportOptions,
) -> Result<()> {
    match options.mode {
        ExportMode::SegmentPolylines => write_segment_polylines(flagged, grid, path, options),
        ExportMode::LakePoints => write_lake_points(flagged, grid, path, options),
        ExportMode::LakePolygons => write_lake_polygons(flagged, grid, path, options),
    }?;

    write_prj_sidecar(path, options)?;

    log::info!("wrote {} ({:?})", path.display(), options.mode);
    Ok(())
}

fn write_segment_polylines(
    flagged: &FlaggedGraph,
    grid: &StructuredGrid,
    path: &Path,
    options: &ExportOptions,
) -> Result<()> {
    let graph = flagged.resolved().graph();
    let mut writer = Writer::from_path(path, attribute_table(upstream_field_width(flagged)?))?;

    for id in graph.sorted_segment_ids() {
        let node = graph.node(id).ok_or_else(|| {
            Error::InconsistentTopology(format!("{} vanished during export", id))
        })?;
        let NodeGeometry::Segment { reach_cells, .. } = &node.geometry else {
            continue;
        };

        let mut points = cell_centers(grid, reach_cells)?;
        // A polyline needs two vertices; a one-reach segment degenerates
        // to a zero-length line within its cell.
        if points.len() == 1 {
            points.push(points[0]);
        }
        reproject_points(&mut points, grid.crs(), options.target_crs.as_ref())?;

        let shape = Polyline::new(to_shp_points(&points));
        writer.write_shape_and_record(&shape, &feature_record(flagged, id))?;
    }

    Ok(())
}

fn write_lake_points(
    flagged: &FlaggedGraph,
    grid: &StructuredGrid,
    path: &Path,
    options: &ExportOptions,
) -> Result<()> {
    let graph = flagged.resolved().graph();
    let mut writer = Writer::from_path(path, attribute_table(upstream_field_width(flagged)?))?;

    for id in graph.sorted_lake_ids() {
        let node = graph.node(id).ok_or_else(|| {
            Error::InconsistentTopology(format!("{} vanished during export", id))
        })?;
        let NodeGeometry::Lake {
            member_cells,
            outlet_cell,
        } = &node.geometry
        else {
            continue;
        };

        let mut points = match outlet_cell {
            Some(cell) => cell_centers(grid, std::slice::from_ref(cell))?,
            None => {
                let centers = cell_centers(grid, member_cells)?;
                let sum = centers.iter().fold(DVec2::ZERO, |acc, &p| acc + p);
                vec![sum / centers.len().max(1) as f64]
            }
        };
        reproject_points(&mut points, grid.crs(), options.target_crs.as_ref())?;

        let shape = Point::new(points[0].x, points[0].y);
        writer.write_shape_and_record(&shape, &feature_record(flagged, id))?;
    }

    Ok(())
}

fn write_lake_polygons(
    flagged: &FlaggedGraph,
    grid: &StructuredGrid,
    path: &Path,
    options: &ExportOptions,
) -> Result<()> {
    let graph = flagged.resolved().graph();
    let mut writer = Writer::from_path(path, attribute_table(upstream_field_width(flagged)?))?;

    for id in graph.sorted_lake_ids() {
        let node = graph.node(id).ok_or_else(|| {
            Error::InconsistentTopology(format!("{} vanished during export", id))
        })?;
        let NodeGeometry::Lake { member_cells, .. } = &node.geometry else {
            continue;
        };

        let mut rings = Vec::with_capacity(member_cells.len());
        for &(row, col) in member_cells {
            if !grid.contains(row, col) {
                return Err(Error::InconsistentTopology(format!(
                    "lake cell ({}, {}) lies outside the {}x{} grid",
                    row,
                    col,
                    grid.nrow(),
                    grid.ncol()
                )));
            }
            let mut ring: Vec<DVec2> = grid.cell_polygon(row, col).to_vec();
            reproject_points(&mut ring, grid.crs(), options.target_crs.as_ref())?;
            rings.push(PolygonRing::Outer(to_shp_points(&ring)));
        }

        let shape = Polygon::with_rings(rings);
        writer.write_shape_and_record(&shape, &feature_record(flagged, id))?;
    }

    Ok(())
}

/// The fixed attribute schema. The spillway flag stays the last field.
/// Numeric id fields take 11 digits so a negated lake id fits at the u32
/// extreme; `UP_IDS` is sized per export by [`upstream_field_width`].
fn attribute_table(up_ids_width: u8) -> TableWriterBuilder {
    TableWriterBuilder::new()
        .add_numeric_field(field_name("ID"), 11, 0)
        .add_character_field(field_name("UP_IDS"), up_ids_width)
        .add_numeric_field(field_name("DN_ID"), 11, 0)
        .add_numeric_field(field_name("LAKE_ID"), 11, 0)
        .add_numeric_field(field_name("SPILL_FLG"), 1, 0)
}

/// Joined upstream export ids, ascending, for one attribute record.
fn upstream_ids(resolved: &ResolvedGraph, id: NodeId) -> String {
    resolved
        .upstream(id)
        .iter()
        .map(|u| u.export_id().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Width of the `UP_IDS` character field, taken from the widest joined
/// upstream list actually present so wide junctions are never truncated
/// by the dBase writer.
fn upstream_field_width(flagged: &FlaggedGraph) -> Result<u8> {
    let resolved = flagged.resolved();
    let widest = resolved
        .graph()
        .sorted_ids()
        .into_iter()
        .map(|id| upstream_ids(resolved, id).len())
        .max()
        .unwrap_or(0)
        .max(1);
    u8::try_from(widest).map_err(|_| {
        Error::InconsistentTopology(format!(
            "a joined upstream id list spans {} characters, past the dBase field limit of {}",
            widest,
            u8::MAX
        ))
    })
}

fn field_name(name: &str) -> FieldName {
    // All schema names are static and within the 10-character dBase limit.
    FieldName::try_from(name).expect("attribute field name fits dBase limits")
}

fn feature_record(flagged: &FlaggedGraph, id: NodeId) -> Record {
    let resolved = flagged.resolved();
    let node = resolved.graph().node(id);

    let upstream = upstream_ids(resolved, id);
    let downstream = resolved.downstream(id).map(|d| d.export_id()).unwrap_or(0);
    let lake_id = match node.map(|n| &n.geometry) {
        Some(NodeGeometry::Segment { lake_id, .. }) => lake_id.unwrap_or(0) as i64,
        Some(NodeGeometry::Lake { .. }) => match id {
            NodeId::Lake(raw) => raw as i64,
            NodeId::Segment(_) => 0,
        },
        None => 0,
    };
    let spillway = node.map(|n| n.spillway).unwrap_or(false);

    let mut record = Record::default();
    record.insert("ID".to_string(), FieldValue::Numeric(Some(id.export_id() as f64)));
    record.insert("UP_IDS".to_string(), FieldValue::Character(Some(upstream)));
    record.insert("DN_ID".to_string(), FieldValue::Numeric(Some(downstream as f64)));
    record.insert("LAKE_ID".to_string(), FieldValue::Numeric(Some(lake_id as f64)));
    record.insert(
        "SPILL_FLG".to_string(),
        FieldValue::Numeric(Some(if spillway { 1.0 } else { 0.0 })),
    );
    record
}

fn cell_centers(grid: &StructuredGrid, cells: &[(usize, usize)]) -> Result<Vec<DVec2>> {
    let mut centers = Vec::with_capacity(cells.len());
    for &(row, col) in cells {
        if !grid.contains(row, col) {
            return Err(Error::InconsistentTopology(format!(
                "reach cell ({}, {}) lies outside the {}x{} grid",
                row,
                col,
                grid.nrow(),
                grid.ncol()
            )));
        }
        centers.push(grid.cell_center(row, col));
    }
    Ok(centers)
}

fn to_shp_points(points: &[DVec2]) -> Vec<Point> {
    points.iter().map(|p| Point::new(p.x, p.y)).collect()
}

fn write_prj_sidecar(path: &Path, options: &ExportOptions) -> Result<()> {
    if let Some(wkt) = options.target_crs.as_ref().and_then(|c| c.wkt.as_ref()) {
        std::fs::write(path.with_extension("prj"), wkt)?;
    }
    Ok(())
}
