//! Topology resolution - outlet detection, reachability, and node ranks.
//!
//! Algorithm:
//! 1. Derive the unique downstream reference of every node (zero outgoing
//!    edges marks an outlet candidate)
//! 2. Invert the edges into per-node upstream sets
//! 3. Walk upstream from all outlets, assigning each node its hop distance
//!    to the outlet it drains to
//! 4. Any node left unvisited sits on a routing cycle and fails resolution

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::network::graph::{NodeId, TopologyGraph};

/// Options controlling resolution strictness.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveOptions {
    /// When true, a graph with more than one outlet fails with
    /// [`Error::MultipleBasins`].
    pub require_single_basin: bool,
}

/// A validated graph annotated with per-node routing properties.
#[derive(Clone, Debug)]
pub struct ResolvedGraph {
    graph: TopologyGraph,
    /// Outlet candidates (no outgoing edge), ascending.
    outlets: Vec<NodeId>,
    upstream: FxHashMap<NodeId, Vec<NodeId>>,
    downstream: FxHashMap<NodeId, Option<NodeId>>,
    /// Hop distance to the outlet each node drains to; 0 at outlets.
    rank: FxHashMap<NodeId, usize>,
}

/// Validate the graph and compute per-node routing properties.
pub fn resolve(graph: TopologyGraph, options: ResolveOptions) -> Result<ResolvedGraph> {
    let ids = graph.sorted_ids();

    // Unique downstream reference per node. build_topology guarantees at
    // most one outgoing edge, but resolve also accepts caller-built graphs.
    let mut downstream: FxHashMap<NodeId, Option<NodeId>> =
        ids.iter().map(|&id| (id, None)).collect();
    let mut upstream: FxHashMap<NodeId, Vec<NodeId>> =
        ids.iter().map(|&id| (id, Vec::new())).collect();

    for edge in graph.edges() {
        if !graph.contains(edge.from) || !graph.contains(edge.to) {
            return Err(Error::InconsistentTopology(format!(
                "edge {} -> {} references a node outside the graph",
                edge.from, edge.to
            )));
        }
        let slot = downstream.entry(edge.from).or_default();
        if slot.is_some() {
            return Err(Error::InconsistentTopology(format!(
                "{} has more than one outgoing connection",
                edge.from
            )));
        }
        *slot = Some(edge.to);
        upstream.entry(edge.to).or_default().push(edge.from);
    }
    for list in upstream.values_mut() {
        list.sort_unstable();
    }

    let outlets: Vec<NodeId> = ids
        .iter()
        .copied()
        .filter(|id| downstream[id].is_none())
        .collect();

    if outlets.is_empty() && !ids.is_empty() {
        return Err(Error::DisconnectedNetwork(
            "every node has an outgoing edge; the network is one big cycle".to_string(),
        ));
    }
    if options.require_single_basin && outlets.len() > 1 {
        return Err(Error::MultipleBasins(outlets.len()));
    }

    // Walk upstream from the outlets. Hop counts are bounded by the node
    // count, so anything unvisited afterwards cannot reach an outlet.
    let mut rank: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    for &outlet in &outlets {
        rank.insert(outlet, 0);
        queue.push_back(outlet);
    }
    while let Some(id) = queue.pop_front() {
        let next_rank = rank[&id] + 1;
        for &up in &upstream[&id] {
            if !rank.contains_key(&up) {
                rank.insert(up, next_rank);
                queue.push_back(up);
            }
        }
    }

    if rank.len() != ids.len() {
        let stuck = ids
            .iter()
            .find(|id| !rank.contains_key(id))
            .copied()
            .unwrap_or(NodeId::Segment(0));
        return Err(Error::DisconnectedNetwork(format!(
            "{} cannot reach an outlet within {} hops (routing cycle)",
            stuck,
            ids.len()
        )));
    }

    log::debug!(
        "resolved topology: {} nodes, {} outlet candidate(s)",
        ids.len(),
        outlets.len()
    );

    Ok(ResolvedGraph {
        graph,
        outlets,
        upstream,
        downstream,
        rank,
    })
}

impl ResolvedGraph {
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut TopologyGraph {
        &mut self.graph
    }

    /// Outlet candidates in ascending id order.
    pub fn outlets(&self) -> &[NodeId] {
        &self.outlets
    }

    pub fn is_outlet_candidate(&self, id: NodeId) -> bool {
        self.downstream.get(&id).map(Option::is_none).unwrap_or(false)
    }

    /// Immediate predecessors, ascending.
    pub fn upstream(&self, id: NodeId) -> &[NodeId] {
        self.upstream.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Immediate successor, or None at outlets.
    pub fn downstream(&self, id: NodeId) -> Option<NodeId> {
        self.downstream.get(&id).copied().flatten()
    }

    /// Hop distance to the outlet this node drains to.
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.rank.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashSet;

    use super::*;
    use crate::network::extract::build_topology;
    use crate::network::graph::EdgeKind;
    use crate::network::tables::{ReachRecord, SegmentRecord};

    fn chain_tables(links: &[(u32, u32)]) -> (Vec<SegmentRecord>, Vec<ReachRecord>) {
        let segments = links
            .iter()
            .map(|&(id, outflow)| SegmentRecord {
                id,
                outflow_segment_id: outflow,
                lake_id: None,
                flow: 0.0,
                elevation: 0.0,
            })
            .collect();
        let reaches = links
            .iter()
            .enumerate()
            .map(|(i, &(id, _))| ReachRecord {
                segment_id: id,
                order: 1,
                row: i,
                col: i,
                length: 1.0,
            })
            .collect();
        (segments, reaches)
    }

    #[test]
    fn outlets_upstream_and_ranks() {
        // 1 -> 3, 2 -> 3, 3 -> 4, 4 is the outlet.
        let (segments, reaches) = chain_tables(&[(1, 3), (2, 3), (3, 4), (4, 0)]);
        let graph = build_topology(&segments, &reaches, &[]).unwrap();
        let resolved = resolve(graph, ResolveOptions::default()).unwrap();

        assert_eq!(resolved.outlets(), &[NodeId::Segment(4)]);
        assert_eq!(
            resolved.upstream(NodeId::Segment(3)),
            &[NodeId::Segment(1), NodeId::Segment(2)]
        );
        assert_eq!(resolved.downstream(NodeId::Segment(3)), Some(NodeId::Segment(4)));
        assert_eq!(resolved.downstream(NodeId::Segment(4)), None);
        assert_eq!(resolved.rank(NodeId::Segment(4)), Some(0));
        assert_eq!(resolved.rank(NodeId::Segment(3)), Some(1));
        assert_eq!(resolved.rank(NodeId::Segment(1)), Some(2));
    }

    #[test]
    fn cycle_fails_resolution() {
        let (segments, reaches) = chain_tables(&[(1, 2), (2, 3), (3, 1), (4, 0)]);
        let graph = build_topology(&segments, &reaches, &[]).unwrap();

        let err = resolve(graph, ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DisconnectedNetwork(_)));
    }

    #[test]
    fn all_cyclic_network_fails() {
        let (segments, reaches) = chain_tables(&[(1, 2), (2, 1)]);
        let graph = build_topology(&segments, &reaches, &[]).unwrap();

        let err = resolve(graph, ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DisconnectedNetwork(_)));
    }

    #[test]
    fn multiple_basins_only_fail_when_required() {
        let (segments, reaches) = chain_tables(&[(1, 2), (2, 0), (3, 4), (4, 0)]);
        let graph = build_topology(&segments, &reaches, &[]).unwrap();

        let resolved = resolve(graph.clone(), ResolveOptions::default()).unwrap();
        assert_eq!(resolved.outlets().len(), 2);

        let err = resolve(
            graph,
            ResolveOptions {
                require_single_basin: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MultipleBasins(2)));
    }

    #[test]
    fn node_with_two_outgoing_edges_is_rejected() {
        let (segments, reaches) = chain_tables(&[(1, 2), (2, 0), (3, 0)]);
        let mut graph = build_topology(&segments, &reaches, &[]).unwrap();
        graph.add_edge(NodeId::Segment(1), NodeId::Segment(3), EdgeKind::SegmentToSegment);

        let err = resolve(graph, ResolveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InconsistentTopology(_)));
    }

    /// Cross-check against brute-force reachability: for every node, the
    /// set of outlets reachable by exhaustively following edges must be
    /// exactly the one implied by the downstream chain.
    #[test]
    fn ranks_match_brute_force_reachability() {
        let (segments, reaches) = chain_tables(&[
            (1, 5),
            (2, 5),
            (3, 6),
            (4, 6),
            (5, 7),
            (6, 7),
            (7, 0),
            (8, 0),
        ]);
        let graph = build_topology(&segments, &reaches, &[]).unwrap();
        let resolved = resolve(graph, ResolveOptions::default()).unwrap();

        let outlet_set: FxHashSet<NodeId> = resolved.outlets().iter().copied().collect();
        for id in resolved.graph().sorted_ids() {
            // Brute force: follow all outgoing edges transitively.
            let mut reachable_outlets = FxHashSet::default();
            let mut stack = vec![id];
            let mut seen = FxHashSet::default();
            while let Some(cur) = stack.pop() {
                if !seen.insert(cur) {
                    continue;
                }
                let succ: Vec<NodeId> =
                    resolved.graph().outgoing(cur).map(|e| e.to).collect();
                if succ.is_empty() {
                    reachable_outlets.insert(cur);
                }
                stack.extend(succ);
            }

            assert!(reachable_outlets.iter().all(|o| outlet_set.contains(o)));

            // Follow the downstream chain; it must end on the same outlet.
            let mut cur = id;
            let mut hops = 0;
            while let Some(next) = resolved.downstream(cur) {
                cur = next;
                hops += 1;
            }
            assert_eq!(reachable_outlets.len(), 1);
            assert!(reachable_outlets.contains(&cur));
            assert_eq!(resolved.rank(id), Some(hops));
        }
    }
}
