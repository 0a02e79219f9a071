//! Network topology domain model.
//!
//! The pipeline runs in stages, each consuming the previous one's output:
//!
//! 1. Extraction - source tables to a directed flow-connectivity graph
//! 2. Resolution - outlet detection, reachability validation, node ranks
//! 3. Spillway flagging - policy-driven selection of control nodes
//!
//! Graphs are rebuilt from scratch from the tables on every pass; nothing
//! here caches across table edits.

mod extract;
mod graph;
mod resolve;
mod spillway;

pub mod tables;

pub use extract::build_topology;
pub use graph::{Edge, EdgeKind, Node, NodeGeometry, NodeId, TopologyGraph};
pub use resolve::{resolve, ResolveOptions, ResolvedGraph};
pub use spillway::{flag_spillways, FlaggedGraph, SpillwayPolicy};
