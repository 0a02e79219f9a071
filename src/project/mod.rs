//! Project orchestration.
//!
//! A [`Project`] owns the structured grid and the three source tables and
//! builds derived topology in stages, like the upstream model object it
//! mirrors. The `ready` flag turns true only once extraction and
//! resolution have succeeded. Workspace files are JSON (gzipped when the
//! path ends in `.gz`) and act as the narrow accessor surface over the
//! source model's own input formats.

mod runner;

pub use runner::ModelRunner;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::export::{write_shapefile, ExportOptions};
use crate::grid::StructuredGrid;
use crate::network::tables::{LakeRecord, ReachRecord, SegmentRecord};
use crate::network::{
    build_topology, flag_spillways, resolve, ResolveOptions, ResolvedGraph, SpillwayPolicy,
};
use crate::util::StageTimer;

/// On-disk workspace representation.
#[derive(Serialize, Deserialize)]
struct ProjectFile {
    name: String,
    grid: StructuredGrid,
    segments: Vec<SegmentRecord>,
    reaches: Vec<ReachRecord>,
    lakes: Vec<LakeRecord>,
}

/// A coupled-model project: grid, source tables, and staged derived state.
pub struct Project {
    name: String,
    grid: StructuredGrid,
    segments: Vec<SegmentRecord>,
    reaches: Vec<ReachRecord>,
    lakes: Vec<LakeRecord>,
    runner: Option<ModelRunner>,
    resolved: Option<ResolvedGraph>,
    ready: bool,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        grid: StructuredGrid,
        segments: Vec<SegmentRecord>,
        reaches: Vec<ReachRecord>,
        lakes: Vec<LakeRecord>,
    ) -> Self {
        Self {
            name: name.into(),
            grid,
            segments,
            reaches,
            lakes,
            runner: None,
            resolved: None,
            ready: false,
        }
    }

    /// Load a project from a workspace file written by [`write_input`].
    ///
    /// [`write_input`]: Project::write_input
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);

        let data: ProjectFile = if is_gzip {
            serde_json::from_reader(GzDecoder::new(BufReader::new(file)))?
        } else {
            serde_json::from_reader(BufReader::new(file))?
        };

        Ok(Self::new(
            data.name,
            data.grid,
            data.segments,
            data.reaches,
            data.lakes,
        ))
    }

    /// Write the project inputs into a workspace directory, creating it if
    /// needed. Returns the path of the written file.
    pub fn write_input(&self, workspace: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(workspace)?;
        let path = workspace.join(format!("{}.json", self.name));
        self.save(&path)?;
        Ok(path)
    }

    /// Save the project inputs to an explicit path (gzipped when the path
    /// ends in `.gz`). An existing file is overwritten without warning.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = ProjectFile {
            name: self.name.clone(),
            grid: self.grid.clone(),
            segments: self.segments.clone(),
            reaches: self.reaches.clone(),
            lakes: self.lakes.clone(),
        };

        let file = File::create(path)?;
        let is_gzip = path.extension().map(|ext| ext == "gz").unwrap_or(false);
        if is_gzip {
            let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(encoder, &data)?;
        } else {
            serde_json::to_writer(BufWriter::new(file), &data)?;
        }

        log::info!("wrote project inputs to {}", path.display());
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid(&self) -> &StructuredGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut StructuredGrid {
        &mut self.grid
    }

    pub fn segments(&self) -> &[SegmentRecord] {
        &self.segments
    }

    pub fn reaches(&self) -> &[ReachRecord] {
        &self.reaches
    }

    pub fn lakes(&self) -> &[LakeRecord] {
        &self.lakes
    }

    /// Replace the source tables. Derived topology is dropped; the project
    /// is no longer ready until [`build`] succeeds again.
    ///
    /// [`build`]: Project::build
    pub fn set_tables(
        &mut self,
        segments: Vec<SegmentRecord>,
        reaches: Vec<ReachRecord>,
        lakes: Vec<LakeRecord>,
    ) {
        self.segments = segments;
        self.reaches = reaches;
        self.lakes = lakes;
        self.resolved = None;
        self.ready = false;
    }

    pub fn with_runner(mut self, runner: ModelRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    /// True only after [`build`] has succeeded on the current tables.
    ///
    /// [`build`]: Project::build
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Extract and resolve the topology from the current tables.
    pub fn build(&mut self, options: ResolveOptions) -> Result<&ResolvedGraph> {
        let _t = StageTimer::info("topology build");
        self.ready = false;
        self.resolved = None;

        let graph = build_topology(&self.segments, &self.reaches, &self.lakes)?;
        let resolved = resolve(graph, options)?;

        self.ready = true;
        Ok(&*self.resolved.insert(resolved))
    }

    pub fn topology(&self) -> Option<&ResolvedGraph> {
        self.resolved.as_ref()
    }

    /// One-call export surface: rebuild the topology from the current
    /// tables, apply the policy, and write the shapefile. The graph is
    /// rebuilt from scratch on every call so table edits are always
    /// reflected, and `resolve_options` applies the same strictness the
    /// caller would get from [`build`].
    ///
    /// [`build`]: Project::build
    pub fn export_shapefile(
        &self,
        path: &Path,
        policy: Option<&SpillwayPolicy>,
        nearest: bool,
        resolve_options: ResolveOptions,
        options: &ExportOptions,
    ) -> Result<()> {
        let _t = StageTimer::info("shapefile export");

        let graph = build_topology(&self.segments, &self.reaches, &self.lakes)?;
        let resolved = resolve(graph, resolve_options)?;

        let none = SpillwayPolicy::Explicit(Vec::new());
        let flagged = flag_spillways(&resolved, policy.unwrap_or(&none), nearest)?;

        write_shapefile(&flagged, &self.grid, path, options)
    }

    /// Run the configured external model executable to completion.
    pub fn run_model(&self) -> Result<(bool, Vec<String>)> {
        let runner = self.runner.as_ref().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no model executable configured for this project",
            ))
        })?;
        runner.run()
    }
}
