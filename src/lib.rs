//! streamnet - stream/lake network topology for structured-grid models.
//!
//! Derives a routable hydrologic network (segments, lakes, diversions)
//! from segment/reach/lake tables authored for a grid-based model, flags
//! spillway/control nodes under a selection policy, and exports the graph
//! with per-feature attributes to shapefiles for external
//! watershed-management tools.
//!
//! The pipeline:
//!
//! ```text
//! tables -> build_topology -> resolve -> flag_spillways -> write_shapefile
//! ```
//!
//! Every stage constructs fresh objects from its inputs; nothing is cached
//! across mutations of the underlying tables.

pub mod error;
pub mod export;
pub mod grid;
pub mod network;
pub mod project;
pub mod util;

pub use error::{Error, Result};
pub use export::{write_shapefile, ExportMode, ExportOptions};
pub use grid::{CrsDescriptor, StructuredGrid};
pub use network::{
    build_topology, flag_spillways, resolve, FlaggedGraph, NodeId, ResolveOptions,
    ResolvedGraph, SpillwayPolicy, TopologyGraph,
};
pub use project::{ModelRunner, Project};
