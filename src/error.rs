//! Central error handling for streamnet.
//!
//! Every failure surfaces synchronously as a distinct, named variant so
//! callers can branch on the failure kind rather than on message text.

use crate::network::NodeId;

/// Centralized error type for all topology and export operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or contradictory source references. Fatal: no graph is
    /// returned.
    #[error("inconsistent topology: {0}")]
    InconsistentTopology(String),

    /// A node cannot reach any outlet (routing cycle or dangling chain).
    #[error("disconnected network: {0}")]
    DisconnectedNetwork(String),

    /// More than one outlet was found while the caller required a single
    /// connected basin.
    #[error("multiple basins: {0} outlets found where exactly one was required")]
    MultipleBasins(usize),

    /// Explicit spillway selection referenced an id absent from the graph.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Missing or incompatible coordinate reference system.
    #[error("projection error: {0}")]
    Projection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("workspace serialization error: {0}")]
    Workspace(#[from] serde_json::Error),
}

/// Result type alias for streamnet operations.
pub type Result<T> = std::result::Result<T, Error>;
