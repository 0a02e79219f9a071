//! Structured model grid - cell geometry and coordinate reference system.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Coordinate reference system descriptor.
///
/// The EPSG code identifies the system; the optional WKT string, when
/// present, is written verbatim to the `.prj` sidecar on export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrsDescriptor {
    pub epsg: u32,
    pub wkt: Option<String>,
}

impl CrsDescriptor {
    pub fn from_epsg(epsg: u32) -> Self {
        Self { epsg, wkt: None }
    }

    /// Authority string understood by PROJ, e.g. "EPSG:26911".
    pub fn authority(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

/// A rectangular structured grid with per-column widths and per-row heights.
///
/// World coordinates follow the source-model convention: the origin is the
/// upper-left corner of cell (0, 0), x grows with column index, and y
/// decreases with row index (row 0 is the top row).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructuredGrid {
    nrow: usize,
    ncol: usize,
    /// Column widths, one per column.
    delr: Vec<f64>,
    /// Row heights, one per row.
    delc: Vec<f64>,
    /// World x of the upper-left grid corner.
    xorigin: f64,
    /// World y of the upper-left grid corner.
    yorigin: f64,
    crs: Option<CrsDescriptor>,
}

impl StructuredGrid {
    /// Create a grid from explicit column widths and row heights.
    pub fn new(
        delr: Vec<f64>,
        delc: Vec<f64>,
        xorigin: f64,
        yorigin: f64,
    ) -> Result<Self> {
        if delr.is_empty() || delc.is_empty() {
            return Err(Error::InconsistentTopology(
                "grid must have at least one row and one column".to_string(),
            ));
        }
        Ok(Self {
            nrow: delc.len(),
            ncol: delr.len(),
            delr,
            delc,
            xorigin,
            yorigin,
            crs: None,
        })
    }

    /// Create a grid of uniformly sized square cells with origin (0, 0)
    /// at the upper-left corner.
    pub fn uniform(nrow: usize, ncol: usize, cell_size: f64) -> Self {
        Self {
            nrow,
            ncol,
            delr: vec![cell_size; ncol],
            delc: vec![cell_size; nrow],
            xorigin: 0.0,
            yorigin: nrow as f64 * cell_size,
            crs: None,
        }
    }

    pub fn nrow(&self) -> usize {
        self.nrow
    }

    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.nrow && col < self.ncol
    }

    pub fn crs(&self) -> Option<&CrsDescriptor> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: CrsDescriptor) {
        self.crs = Some(crs);
    }

    /// World-space bounds of a cell: (x_left, x_right, y_bottom, y_top).
    fn cell_bounds(&self, row: usize, col: usize) -> (f64, f64, f64, f64) {
        let x0 = self.xorigin + self.delr[..col].iter().sum::<f64>();
        let x1 = x0 + self.delr[col];
        let y_top = self.yorigin - self.delc[..row].iter().sum::<f64>();
        let y_bot = y_top - self.delc[row];
        (x0, x1, y_bot, y_top)
    }

    /// Center point of a cell in world coordinates.
    pub fn cell_center(&self, row: usize, col: usize) -> DVec2 {
        let (x0, x1, y_bot, y_top) = self.cell_bounds(row, col);
        DVec2::new((x0 + x1) * 0.5, (y_bot + y_top) * 0.5)
    }

    /// Closed clockwise rectangle for a cell (first vertex repeated last).
    pub fn cell_polygon(&self, row: usize, col: usize) -> [DVec2; 5] {
        let (x0, x1, y_bot, y_top) = self.cell_bounds(row, col);
        [
            DVec2::new(x0, y_top),
            DVec2::new(x1, y_top),
            DVec2::new(x1, y_bot),
            DVec2::new(x0, y_bot),
            DVec2::new(x0, y_top),
        ]
    }
}
