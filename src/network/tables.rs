//! Source table records consumed by the topology builder.
//!
//! These are read-only views over the upstream model's segment, reach, and
//! lake tables. They are materialized once per extraction and never written
//! back; the only mutation path is replacing whole tables on the project.

use serde::{Deserialize, Serialize};

/// One stream segment as authored in the source model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// 1-based segment id, unique within the table.
    pub id: u32,
    /// Segment this one routes into; 0 marks a basin outlet.
    pub outflow_segment_id: u32,
    /// Lake this segment discharges into, if any.
    pub lake_id: Option<u32>,
    /// Recorded flow attribute, used by the flow-based spillway policy.
    pub flow: f64,
    /// Recorded elevation attribute, used by the elevation-based policy.
    pub elevation: f64,
}

/// The portion of a segment within a single grid cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReachRecord {
    /// Segment this reach belongs to.
    pub segment_id: u32,
    /// Along-segment position, ascending from the segment head.
    pub order: u32,
    pub row: usize,
    pub col: usize,
    /// Stream length within the cell.
    pub length: f64,
}

/// A static water body connected to the network via inlet/outlet cells.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LakeRecord {
    /// 1-based lake id, unique within the table. Lake ids form a separate
    /// id space from segment ids.
    pub id: u32,
    /// Grid cells covered by the lake.
    pub member_cells: Vec<(usize, usize)>,
    /// Cell where the lake discharges back into the stream network. Must
    /// coincide with a reach cell of exactly one segment when present.
    pub outlet_cell: Option<(usize, usize)>,
    /// Lake stage, used as the lake node's elevation attribute.
    pub stage: f64,
}
