//! Spillway flagging - marks designated outflow/control nodes.
//!
//! A policy selects nodes; the optional nearest-snap then moves any
//! selection that is not an outlet candidate onto the closest one. Hop
//! distance and Euclidean centroid distance are kept as two separately
//! ordered tie-break criteria so the behavior stays auditable.

use std::collections::VecDeque;

use ordered_float::OrderedFloat;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::network::graph::NodeId;
use crate::network::resolve::ResolvedGraph;

/// How spillway nodes are selected. Policies do not compose; the last
/// applied policy wins for a given export call.
#[derive(Clone, Debug)]
pub enum SpillwayPolicy {
    /// Flag exactly the listed node ids.
    Explicit(Vec<NodeId>),
    /// Flag the outlet candidate with the maximum recorded flow.
    ByFlow,
    /// Flag the outlet candidate with the minimum recorded elevation.
    ByElevation,
}

/// A resolved graph with spillway flags applied.
#[derive(Clone, Debug)]
pub struct FlaggedGraph {
    resolved: ResolvedGraph,
    flagged: Vec<NodeId>,
}

impl FlaggedGraph {
    pub fn resolved(&self) -> &ResolvedGraph {
        &self.resolved
    }

    /// Flagged node ids, ascending.
    pub fn flagged(&self) -> &[NodeId] {
        &self.flagged
    }

    pub fn is_flagged(&self, id: NodeId) -> bool {
        self.flagged.binary_search(&id).is_ok()
    }
}

/// Apply a selection policy and return the same graph with the spillway
/// flag set on the selected nodes; nothing else is mutated.
pub fn flag_spillways(
    resolved: &ResolvedGraph,
    policy: &SpillwayPolicy,
    nearest: bool,
) -> Result<FlaggedGraph> {
    let selected = match policy {
        SpillwayPolicy::Explicit(ids) => {
            for &id in ids {
                if !resolved.graph().contains(id) {
                    return Err(Error::UnknownNode(id));
                }
            }
            let mut ids = ids.clone();
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        SpillwayPolicy::ByFlow => {
            select_extreme(resolved, |node| OrderedFloat(node.flow), true)
        }
        SpillwayPolicy::ByElevation => {
            select_extreme(resolved, |node| OrderedFloat(node.elevation), false)
        }
    };

    let mut flagged: Vec<NodeId> = selected
        .into_iter()
        .map(|id| {
            if nearest && !resolved.is_outlet_candidate(id) {
                snap_to_outlet(resolved, id)
            } else {
                id
            }
        })
        .collect();
    flagged.sort_unstable();
    flagged.dedup();

    let mut out = resolved.clone();
    for &id in &flagged {
        if let Some(node) = out.graph_mut().node_mut(id) {
            node.spillway = true;
        }
    }

    log::debug!("flagged {} spillway node(s)", flagged.len());

    Ok(FlaggedGraph {
        resolved: out,
        flagged,
    })
}

/// Pick the single outlet candidate with the extreme attribute value.
/// Ties on the value go to the lowest node id; iterating outlets in
/// ascending order makes the first strict improvement win.
fn select_extreme<F>(resolved: &ResolvedGraph, key: F, maximize: bool) -> Vec<NodeId>
where
    F: Fn(&crate::network::graph::Node) -> OrderedFloat<f64>,
{
    let mut best: Option<(OrderedFloat<f64>, NodeId)> = None;
    for &id in resolved.outlets() {
        let Some(node) = resolved.graph().node(id) else {
            continue;
        };
        let value = key(node);
        let better = match best {
            None => true,
            Some((best_value, _)) => {
                if maximize {
                    value > best_value
                } else {
                    value < best_value
                }
            }
        };
        if better {
            best = Some((value, id));
        }
    }
    best.map(|(_, id)| vec![id]).unwrap_or_default()
}

/// Move a non-outlet selection to the outlet candidate at minimum
/// undirected hop distance; ties break on Euclidean centroid distance,
/// then lowest id.
fn snap_to_outlet(resolved: &ResolvedGraph, from: NodeId) -> NodeId {
    let graph = resolved.graph();

    // Undirected adjacency over the edge list.
    let mut adjacency: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
    for edge in graph.edges() {
        adjacency.entry(edge.from).or_default().push(edge.to);
        adjacency.entry(edge.to).or_default().push(edge.from);
    }

    let mut hops: FxHashMap<NodeId, usize> = FxHashMap::default();
    let mut queue = VecDeque::new();
    hops.insert(from, 0);
    queue.push_back(from);
    while let Some(id) = queue.pop_front() {
        let next = hops[&id] + 1;
        if let Some(neighbors) = adjacency.get(&id) {
            for &n in neighbors {
                if !hops.contains_key(&n) {
                    hops.insert(n, next);
                    queue.push_back(n);
                }
            }
        }
    }

    let origin = graph.node(from).map(|n| n.centroid);
    let outlet_set: FxHashSet<NodeId> = resolved.outlets().iter().copied().collect();

    let mut best: Option<(usize, OrderedFloat<f64>, NodeId)> = None;
    for (&id, &hop) in &hops {
        if !outlet_set.contains(&id) {
            continue;
        }
        let euclid = match (origin, graph.node(id)) {
            (Some(o), Some(n)) => OrderedFloat(o.distance(n.centroid)),
            _ => OrderedFloat(f64::INFINITY),
        };
        let candidate = (hop, euclid, id);
        if best.map(|b| candidate < b).unwrap_or(true) {
            best = Some(candidate);
        }
    }

    // A resolved graph always reaches an outlet; keep the original
    // selection if the node is somehow isolated.
    best.map(|(_, _, id)| id).unwrap_or(from)
}
