//! The flow-connectivity graph: node arena plus explicit edge list.
//!
//! Nodes are stored in an arena keyed by id and edges in a separate list,
//! never as object references between records, so partially edited source
//! tables cannot leave dangling pointers behind. Deterministic orderings
//! always go through [`TopologyGraph::sorted_ids`].

use std::fmt;

use glam::DVec2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Identity of a graph node. Segment and lake ids are disjoint spaces;
/// the variant order makes all segments sort before all lakes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum NodeId {
    Segment(u32),
    Lake(u32),
}

impl NodeId {
    /// Signed id used in exported attribute tables: segment ids as-is,
    /// lake ids negated, 0 reserved for "none".
    pub fn export_id(&self) -> i64 {
        match self {
            NodeId::Segment(id) => *id as i64,
            NodeId::Lake(id) => -(*id as i64),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Segment(id) => write!(f, "segment {}", id),
            NodeId::Lake(id) => write!(f, "lake {}", id),
        }
    }
}

/// Kind of routing connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    SegmentToSegment,
    SegmentToLake,
    LakeToSegment,
}

/// A directed routing connection between two nodes.
#[derive(Clone, Debug)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
}

/// Geometry payload of a node.
#[derive(Clone, Debug)]
pub enum NodeGeometry {
    /// Reach cells in along-segment order, plus the authored lake
    /// association (mirrored into the exported attribute table).
    Segment {
        reach_cells: Vec<(usize, usize)>,
        lake_id: Option<u32>,
    },
    Lake {
        member_cells: Vec<(usize, usize)>,
        outlet_cell: Option<(usize, usize)>,
    },
}

/// A stream segment or lake in the topology graph.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: NodeId,
    /// Cell-space centroid (x = mean column, y = mean row). Used only as
    /// a tie-break distance metric, never exported directly.
    pub centroid: DVec2,
    pub flow: f64,
    pub elevation: f64,
    pub geometry: NodeGeometry,
    /// Set by the spillway flagger; false on freshly built graphs.
    pub spillway: bool,
}

/// Directed flow-connectivity graph over segments and lakes.
#[derive(Clone, Debug, Default)]
pub struct TopologyGraph {
    nodes: FxHashMap<NodeId, Node>,
    edges: Vec<Edge>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        self.edges.push(Edge { from, to, kind });
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// All node ids in ascending order (segments first, then lakes).
    pub fn sorted_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Segment node ids in ascending order.
    pub fn sorted_segment_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| matches!(id, NodeId::Segment(_)))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Lake node ids in ascending order.
    pub fn sorted_lake_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| matches!(id, NodeId::Lake(_)))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_ordering_keeps_segments_before_lakes() {
        let mut ids = vec![
            NodeId::Lake(1),
            NodeId::Segment(9),
            NodeId::Lake(3),
            NodeId::Segment(2),
        ];
        ids.sort_unstable();
        assert_eq!(
            ids,
            vec![
                NodeId::Segment(2),
                NodeId::Segment(9),
                NodeId::Lake(1),
                NodeId::Lake(3),
            ]
        );
    }

    #[test]
    fn export_ids_are_signed_and_disjoint() {
        assert_eq!(NodeId::Segment(24).export_id(), 24);
        assert_eq!(NodeId::Lake(24).export_id(), -24);
    }
}
