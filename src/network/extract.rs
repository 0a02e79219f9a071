//! Network extraction - builds the topology graph from source tables.
//!
//! Algorithm:
//! 1. Index segments, reaches, and lakes; reject duplicate or dangling ids
//! 2. Create one node per segment (reach chain, cell-space centroid) and
//!    one per lake
//! 3. Add segment→segment edges from nonzero outflow references
//! 4. Add segment→lake edges from authored lake associations
//! 5. Add lake→segment edges where a lake outlet cell coincides with a
//!    reach cell of exactly one segment
//!
//! Construction is pure: all inconsistencies fail before any graph is
//! returned, and the caller owns the fresh graph.

use glam::DVec2;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::network::graph::{EdgeKind, Node, NodeGeometry, NodeId, TopologyGraph};
use crate::network::tables::{LakeRecord, ReachRecord, SegmentRecord};

/// Build a fresh topology graph from the three source tables.
pub fn build_topology(
    segments: &[SegmentRecord],
    reaches: &[ReachRecord],
    lakes: &[LakeRecord],
) -> Result<TopologyGraph> {
    let segment_index = index_segments(segments)?;
    let lake_index = index_lakes(lakes)?;
    let reach_chains = collect_reach_chains(segments, reaches, &segment_index)?;

    let mut graph = TopologyGraph::new();

    // Segment nodes.
    for seg in segments {
        let cells = &reach_chains[&seg.id];
        graph.insert_node(Node {
            id: NodeId::Segment(seg.id),
            centroid: cell_centroid(cells),
            flow: seg.flow,
            elevation: seg.elevation,
            geometry: NodeGeometry::Segment {
                reach_cells: cells.clone(),
                lake_id: seg.lake_id,
            },
            spillway: false,
        });
    }

    // Lake nodes.
    for lake in lakes {
        if lake.member_cells.is_empty() {
            return Err(Error::InconsistentTopology(format!(
                "lake {} has no member cells",
                lake.id
            )));
        }
        graph.insert_node(Node {
            id: NodeId::Lake(lake.id),
            centroid: cell_centroid(&lake.member_cells),
            flow: 0.0,
            elevation: lake.stage,
            geometry: NodeGeometry::Lake {
                member_cells: lake.member_cells.clone(),
                outlet_cell: lake.outlet_cell,
            },
            spillway: false,
        });
    }

    // Segment outflow edges. A segment may route to its downstream segment
    // or into a lake, never both (that would give it two outgoing edges).
    for seg in segments {
        let routes_downstream = seg.outflow_segment_id != 0 && seg.outflow_segment_id != seg.id;

        if seg.outflow_segment_id == seg.id {
            log::warn!(
                "segment {} lists itself as outflow; treating it as an outlet candidate",
                seg.id
            );
        }

        if routes_downstream && seg.lake_id.is_some() {
            return Err(Error::InconsistentTopology(format!(
                "segment {} routes to segment {} and into lake {}; \
                 a non-outlet segment must have exactly one outgoing connection",
                seg.id,
                seg.outflow_segment_id,
                seg.lake_id.unwrap_or_default()
            )));
        }

        if routes_downstream {
            if !segment_index.contains_key(&seg.outflow_segment_id) {
                return Err(Error::InconsistentTopology(format!(
                    "segment {} routes to segment {}, which is not in the segment table",
                    seg.id, seg.outflow_segment_id
                )));
            }
            graph.add_edge(
                NodeId::Segment(seg.id),
                NodeId::Segment(seg.outflow_segment_id),
                EdgeKind::SegmentToSegment,
            );
        } else if let Some(lake_id) = seg.lake_id {
            if !lake_index.contains_key(&lake_id) {
                return Err(Error::InconsistentTopology(format!(
                    "segment {} discharges into lake {}, which is not in the lake table",
                    seg.id, lake_id
                )));
            }
            graph.add_edge(
                NodeId::Segment(seg.id),
                NodeId::Lake(lake_id),
                EdgeKind::SegmentToLake,
            );
        }
    }

    // Lake outlet edges: the outlet cell must land on a reach cell of
    // exactly one segment.
    let cell_to_segments = build_cell_index(&reach_chains);
    for lake in lakes {
        let Some(cell) = lake.outlet_cell else {
            continue;
        };
        let connected = cell_to_segments.get(&cell).map(Vec::as_slice).unwrap_or(&[]);
        match connected {
            [seg_id] => {
                graph.add_edge(
                    NodeId::Lake(lake.id),
                    NodeId::Segment(*seg_id),
                    EdgeKind::LakeToSegment,
                );
            }
            [] => {
                return Err(Error::InconsistentTopology(format!(
                    "lake {} outlet cell ({}, {}) does not coincide with any reach cell",
                    lake.id, cell.0, cell.1
                )));
            }
            many => {
                return Err(Error::InconsistentTopology(format!(
                    "lake {} outlet cell ({}, {}) coincides with reaches of {} segments",
                    lake.id,
                    cell.0,
                    cell.1,
                    many.len()
                )));
            }
        }
    }

    log::debug!(
        "extracted topology: {} nodes, {} edges",
        graph.len(),
        graph.edges().len()
    );

    Ok(graph)
}

fn index_segments(segments: &[SegmentRecord]) -> Result<FxHashMap<u32, usize>> {
    let mut index = FxHashMap::default();
    for (i, seg) in segments.iter().enumerate() {
        if seg.id == 0 {
            return Err(Error::InconsistentTopology(
                "segment id 0 is reserved for the basin outlet marker".to_string(),
            ));
        }
        if index.insert(seg.id, i).is_some() {
            return Err(Error::InconsistentTopology(format!(
                "duplicate segment id {}",
                seg.id
            )));
        }
    }
    Ok(index)
}

fn index_lakes(lakes: &[LakeRecord]) -> Result<FxHashMap<u32, usize>> {
    let mut index = FxHashMap::default();
    for (i, lake) in lakes.iter().enumerate() {
        if index.insert(lake.id, i).is_some() {
            return Err(Error::InconsistentTopology(format!(
                "duplicate lake id {}",
                lake.id
            )));
        }
    }
    Ok(index)
}

/// Group reach cells by segment, ordered along the segment.
fn collect_reach_chains(
    segments: &[SegmentRecord],
    reaches: &[ReachRecord],
    segment_index: &FxHashMap<u32, usize>,
) -> Result<FxHashMap<u32, Vec<(usize, usize)>>> {
    let mut ordered: FxHashMap<u32, Vec<&ReachRecord>> = FxHashMap::default();
    for reach in reaches {
        if !segment_index.contains_key(&reach.segment_id) {
            return Err(Error::InconsistentTopology(format!(
                "reach at ({}, {}) references segment {}, which is not in the segment table",
                reach.row, reach.col, reach.segment_id
            )));
        }
        ordered.entry(reach.segment_id).or_default().push(reach);
    }

    let mut chains = FxHashMap::default();
    for seg in segments {
        let Some(mut group) = ordered.remove(&seg.id) else {
            return Err(Error::InconsistentTopology(format!(
                "segment {} has no reaches",
                seg.id
            )));
        };
        group.sort_by_key(|r| r.order);
        chains.insert(seg.id, group.iter().map(|r| (r.row, r.col)).collect());
    }
    Ok(chains)
}

/// Map each reach cell to the segments whose chains pass through it.
fn build_cell_index(
    reach_chains: &FxHashMap<u32, Vec<(usize, usize)>>,
) -> FxHashMap<(usize, usize), Vec<u32>> {
    let mut cell_to_segments: FxHashMap<(usize, usize), Vec<u32>> = FxHashMap::default();
    for (&seg_id, cells) in reach_chains {
        for &cell in cells {
            let entry = cell_to_segments.entry(cell).or_default();
            if !entry.contains(&seg_id) {
                entry.push(seg_id);
            }
        }
    }
    cell_to_segments
}

/// Mean cell position as (x = column, y = row).
fn cell_centroid(cells: &[(usize, usize)]) -> DVec2 {
    let mut sum = DVec2::ZERO;
    for &(row, col) in cells {
        sum += DVec2::new(col as f64, row as f64);
    }
    sum / cells.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(id: u32, outflow: u32) -> SegmentRecord {
        SegmentRecord {
            id,
            outflow_segment_id: outflow,
            lake_id: None,
            flow: 0.0,
            elevation: 0.0,
        }
    }

    fn reach(segment_id: u32, order: u32, row: usize, col: usize) -> ReachRecord {
        ReachRecord {
            segment_id,
            order,
            row,
            col,
            length: 1.0,
        }
    }

    #[test]
    fn builds_nodes_and_segment_edges() {
        let segments = vec![segment(1, 2), segment(2, 0)];
        let reaches = vec![
            reach(1, 1, 0, 0),
            reach(1, 2, 0, 1),
            reach(2, 1, 0, 2),
        ];

        let graph = build_topology(&segments, &reaches, &[]).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edges().len(), 1);
        let edge = &graph.edges()[0];
        assert_eq!(edge.from, NodeId::Segment(1));
        assert_eq!(edge.to, NodeId::Segment(2));
        assert_eq!(edge.kind, EdgeKind::SegmentToSegment);
    }

    #[test]
    fn reach_referencing_unknown_segment_fails() {
        let segments = vec![segment(1, 0)];
        let reaches = vec![reach(1, 1, 0, 0), reach(7, 1, 1, 1)];

        let err = build_topology(&segments, &reaches, &[]).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    #[test]
    fn duplicate_segment_id_fails() {
        let segments = vec![segment(1, 0), segment(1, 0)];
        let reaches = vec![reach(1, 1, 0, 0)];

        let err = build_topology(&segments, &reaches, &[]).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    #[test]
    fn self_routing_segment_becomes_outlet_candidate() {
        let segments = vec![segment(3, 3)];
        let reaches = vec![reach(3, 1, 0, 0)];

        let graph = build_topology(&segments, &reaches, &[]).unwrap();
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn outflow_to_missing_segment_fails() {
        let segments = vec![segment(1, 9)];
        let reaches = vec![reach(1, 1, 0, 0)];

        let err = build_topology(&segments, &reaches, &[]).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    #[test]
    fn lake_edges_from_association_and_outlet_cell() {
        let mut inflow = segment(1, 0);
        inflow.lake_id = Some(1);
        let segments = vec![inflow, segment(2, 0)];
        let reaches = vec![reach(1, 1, 0, 0), reach(2, 1, 2, 2)];
        let lakes = vec![LakeRecord {
            id: 1,
            member_cells: vec![(1, 0), (1, 1)],
            outlet_cell: Some((2, 2)),
            stage: 100.0,
        }];

        let graph = build_topology(&segments, &reaches, &lakes).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.edges().len(), 2);
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.from == NodeId::Segment(1)
                && e.to == NodeId::Lake(1)
                && e.kind == EdgeKind::SegmentToLake));
        assert!(graph
            .edges()
            .iter()
            .any(|e| e.from == NodeId::Lake(1)
                && e.to == NodeId::Segment(2)
                && e.kind == EdgeKind::LakeToSegment));
    }

    #[test]
    fn lake_outlet_off_every_reach_fails() {
        let segments = vec![segment(1, 0)];
        let reaches = vec![reach(1, 1, 0, 0)];
        let lakes = vec![LakeRecord {
            id: 1,
            member_cells: vec![(1, 1)],
            outlet_cell: Some((5, 5)),
            stage: 0.0,
        }];

        let err = build_topology(&segments, &reaches, &lakes).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    #[test]
    fn lake_outlet_shared_by_two_segments_fails() {
        let segments = vec![segment(1, 0), segment(2, 0)];
        let reaches = vec![reach(1, 1, 3, 3), reach(2, 1, 3, 3)];
        let lakes = vec![LakeRecord {
            id: 1,
            member_cells: vec![(1, 1)],
            outlet_cell: Some((3, 3)),
            stage: 0.0,
        }];

        let err = build_topology(&segments, &reaches, &lakes).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    #[test]
    fn segment_with_outflow_and_lake_fails() {
        let mut seg = segment(1, 2);
        seg.lake_id = Some(1);
        let segments = vec![seg, segment(2, 0)];
        let reaches = vec![reach(1, 1, 0, 0), reach(2, 1, 0, 1)];
        let lakes = vec![LakeRecord {
            id: 1,
            member_cells: vec![(1, 1)],
            outlet_cell: None,
            stage: 0.0,
        }];

        let err = build_topology(&segments, &reaches, &lakes).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    #[test]
    fn segment_without_reaches_fails() {
        let segments = vec![segment(1, 0), segment(2, 1)];
        let reaches = vec![reach(1, 1, 0, 0)];

        let err = build_topology(&segments, &reaches, &[]).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }
}
