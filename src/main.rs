use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use streamnet::network::NodeId;
use streamnet::{
    CrsDescriptor, ExportMode, ExportOptions, Project, ResolveOptions, SpillwayPolicy,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliPolicy {
    /// Flag exactly the ids passed via --spillway-ids
    Explicit,
    /// Flag the outlet with maximum recorded flow
    Flow,
    /// Flag the outlet with minimum recorded elevation
    Elev,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    #[value(name = "segments")]
    Segments,
    #[value(name = "lake-points")]
    LakePoints,
    #[value(name = "lake-polygons")]
    LakePolygons,
}

impl From<CliMode> for ExportMode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Segments => ExportMode::SegmentPolylines,
            CliMode::LakePoints => ExportMode::LakePoints,
            CliMode::LakePolygons => ExportMode::LakePolygons,
        }
    }
}

/// streamnet - derive and export hydrologic network topology
#[derive(Parser, Debug)]
#[command(name = "streamnet", version, about)]
struct Cli {
    /// Project workspace file (.json, or .json.gz)
    project: PathBuf,

    /// Write the network to this shapefile
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Spillway selection policy
    #[arg(long, value_enum)]
    policy: Option<CliPolicy>,

    /// Node ids for --policy explicit; negative ids select lakes
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    spillway_ids: Vec<i64>,

    /// Keep policy selections in place instead of snapping to the
    /// nearest outlet
    #[arg(long)]
    no_nearest: bool,

    /// Export geometry
    #[arg(long, value_enum, default_value_t = CliMode::Segments)]
    mode: CliMode,

    /// Target EPSG code for the exported coordinates
    #[arg(long)]
    epsg: Option<u32>,

    /// Fail unless the whole network drains to a single outlet
    #[arg(long)]
    require_single_basin: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let mut project = match Project::load(&cli.project) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("failed to load {}: {}", cli.project.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let options = ResolveOptions {
        require_single_basin: cli.require_single_basin,
    };
    let (nodes, edges, outlets) = match project.build(options) {
        Ok(resolved) => (
            resolved.graph().len(),
            resolved.graph().edges().len(),
            resolved.outlets().len(),
        ),
        Err(e) => {
            eprintln!("topology build failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{}: {} nodes, {} edges, {} outlet(s)",
        project.name(),
        nodes,
        edges,
        outlets
    );

    let Some(export_path) = cli.export else {
        return ExitCode::SUCCESS;
    };

    let policy = match cli.policy {
        None => None,
        Some(CliPolicy::Flow) => Some(SpillwayPolicy::ByFlow),
        Some(CliPolicy::Elev) => Some(SpillwayPolicy::ByElevation),
        Some(CliPolicy::Explicit) => {
            if cli.spillway_ids.is_empty() {
                eprintln!("--policy explicit requires --spillway-ids");
                return ExitCode::FAILURE;
            }
            let ids = cli
                .spillway_ids
                .iter()
                .map(|&id| {
                    if id < 0 {
                        NodeId::Lake(-id as u32)
                    } else {
                        NodeId::Segment(id as u32)
                    }
                })
                .collect();
            Some(SpillwayPolicy::Explicit(ids))
        }
    };

    let export_options = ExportOptions {
        mode: cli.mode.into(),
        target_crs: cli.epsg.map(CrsDescriptor::from_epsg),
    };

    if let Err(e) = project.export_shapefile(
        &export_path,
        policy.as_ref(),
        !cli.no_nearest,
        options,
        &export_options,
    ) {
        eprintln!("export failed: {}", e);
        return ExitCode::FAILURE;
    }

    println!("exported {}", export_path.display());
    ExitCode::SUCCESS
}
