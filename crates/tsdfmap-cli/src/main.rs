// crates/tsdfmap-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Matrix4;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsdfmap_core::{Config, IntegratorMethod, Position};
use tsdfmap_mesh::{MeshTracker, NullMeshExtractor};
use tsdfmap_pipeline::{IdentityIcp, IdentityOracle, Pipeline, RawPointcloud};
use tsdfmap_posegraph::{NodeId, Pose4Dof, PoseGraph};

#[derive(Parser, Debug)]
#[command(
    name = "tsdfmap",
    about = "tsdfmap reference CLI",
    long_about = "tsdfmap reference CLI.\n\nDrive the mapping pipeline, pose graph, and mesh extraction boundary against synthetic or saved data.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Integrate a synthetic single-plane pointcloud and report the
    /// resulting block/voxel counts; optionally save the layer.
    Run {
        /// Integrator strategy.
        #[arg(value_enum, long, default_value_t = MethodOpt::Merged)]
        method: MethodOpt,

        /// Voxel edge length, in meters.
        #[arg(long, default_value_t = 0.1)]
        voxel_size: f64,

        /// Truncation distance, in meters.
        #[arg(long, default_value_t = 0.2)]
        truncation: f64,

        /// Z-height of the synthetic plane, in meters.
        #[arg(long, default_value_t = 1.0)]
        plane_z: f64,

        /// If set, write the resulting layer to this path.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Load a previously saved layer and print its block/voxel/memory
    /// statistics.
    Inspect {
        /// Input layer path (see `run --save` or `save-map`).
        #[arg(long)]
        input: PathBuf,
    },

    /// Load a previously saved layer and run one mesh-extraction pass
    /// over it with the null (no-op) extractor, reporting how many
    /// blocks the dirty-tracking pass would hand a real backend.
    GenerateMesh {
        #[arg(long)]
        input: PathBuf,
    },

    /// Run a small two-submap pose graph scenario: an absolute prior on
    /// the first node, a noisy relative-odometry constraint between the
    /// two, and an LM solve, printing the resulting poses.
    PoseGraphDemo {
        /// Relative-odometry measurement error injected along x, in
        /// meters, to give the solver something to correct.
        #[arg(long, default_value_t = 0.3)]
        odometry_error_m: f64,
    },

    /// Parse a TOML configuration file and report whether it passes
    /// `Config::validate`.
    ValidateConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum MethodOpt {
    Simple,
    Merged,
    Fast,
}

impl From<MethodOpt> for IntegratorMethod {
    fn from(value: MethodOpt) -> Self {
        match value {
            MethodOpt::Simple => Self::Simple,
            MethodOpt::Merged => Self::Merged,
            MethodOpt::Fast => Self::Fast,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run {
            method,
            voxel_size,
            truncation,
            plane_z,
            save,
        } => run(method, voxel_size, truncation, plane_z, save),

        Cmd::Inspect { input } => inspect(&input),

        Cmd::GenerateMesh { input } => generate_mesh(&input),

        Cmd::PoseGraphDemo { odometry_error_m } => pose_graph_demo(odometry_error_m),

        Cmd::ValidateConfig { config } => validate_config(&config),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn synthetic_plane(z: f64) -> Vec<Position> {
    let mut points = Vec::new();
    let mut x = -0.5;
    while x <= 0.5 {
        let mut y = -0.5;
        while y <= 0.5 {
            points.push(Position::new(x, y, z));
            y += 0.05;
        }
        x += 0.05;
    }
    points
}

fn run(
    method: MethodOpt,
    voxel_size: f64,
    truncation: f64,
    plane_z: f64,
    save: Option<PathBuf>,
) -> Result<()> {
    let config = Config {
        method: method.into(),
        voxel_size,
        truncation_distance: truncation,
        ..Config::default()
    };
    config.validate().context("configuration is invalid")?;

    info!(?method, voxel_size, truncation, "running synthetic single-plane scenario");
    let integrator = tsdfmap_integrate::build(&config);
    let mut pipeline = Pipeline::new(
        config,
        integrator,
        Box::new(IdentityOracle),
        Box::new(IdentityIcp),
        0.0,
    )
    .context("constructing pipeline")?;

    pipeline.insert(RawPointcloud {
        timestamp: 0.0,
        frame_id: "camera".into(),
        points: synthetic_plane(plane_z),
        colors: None,
    });

    let active = pipeline
        .submaps()
        .active_submap()
        .context("pipeline has no active submap")?;
    println!(
        "integrated synthetic plane: {} blocks, {:.1} KiB resident",
        active.layer.block_count(),
        active.layer.approx_memory_bytes() as f64 / 1024.0
    );

    if let Some(path) = save {
        ensure_parent_dir(&path)?;
        pipeline.save_map(&path).context("saving map")?;
        println!("saved layer to {}", path.display());
    }
    Ok(())
}

fn inspect(input: &Path) -> Result<()> {
    let file = std::fs::File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut reader = std::io::BufReader::new(file);
    let message = tsdfmap_core::read_message(&mut reader).context("decoding saved layer")?;

    let voxel_count: usize = message.blocks.iter().map(|(_, b)| b.voxels().len()).sum();
    let observed: usize = message
        .blocks
        .iter()
        .flat_map(|(_, b)| b.voxels())
        .filter(|v| v.is_observed())
        .count();

    println!("voxel size:       {}", message.voxel_size);
    println!("voxels per side:  {}", message.voxels_per_side);
    println!("blocks:           {}", message.blocks.len());
    println!("voxels allocated: {voxel_count}");
    println!("voxels observed:  {observed}");
    Ok(())
}

fn generate_mesh(input: &Path) -> Result<()> {
    let file = std::fs::File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut reader = std::io::BufReader::new(file);
    let message = tsdfmap_core::read_message(&mut reader).context("decoding saved layer")?;

    let layer = tsdfmap_core::Layer::new(message.voxel_size, message.voxels_per_side);
    for (index, block) in message.blocks {
        layer.with_block_mut(index, |b| {
            *b = block;
            b.mark_updated(tsdfmap_core::UpdatedFlags::MESH);
        });
    }

    let mut tracker = MeshTracker::new();
    let update = tracker
        .update(&layer, &NullMeshExtractor)
        .context("mesh extraction pass")?;
    println!(
        "mesh pass: {} blocks handed to the extraction backend ({} removals)",
        update.blocks.len(),
        update.blocks.iter().filter(|m| m.is_removal()).count()
    );
    Ok(())
}

fn pose_graph_demo(odometry_error_m: f64) -> Result<()> {
    let mut graph = PoseGraph::new();
    let origin = NodeId(0);
    let second = NodeId(1);

    graph.add_submap_node(origin, Pose4Dof::identity());
    graph.add_submap_node(
        second,
        Pose4Dof {
            x: 2.0 + odometry_error_m,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
        },
    );

    let strong_information = Matrix4::identity() * 1e6;
    graph
        .add_absolute_pose_constraint(origin, Pose4Dof::identity(), strong_information)
        .context("adding the anchor constraint")?;

    let odometry_information = Matrix4::identity() * 1e3;
    graph
        .add_relative_pose_constraint(
            origin,
            second,
            Pose4Dof {
                x: 2.0,
                y: 0.0,
                z: 0.0,
                yaw: 0.0,
            },
            odometry_information,
        )
        .context("adding the relative odometry constraint")?;

    let summary = graph
        .optimize(true, 1e-9)
        .context("solving the pose graph")?;

    let resolved = graph
        .get_submap_pose(second)
        .context("solved graph is missing the second node")?;

    println!(
        "solver: {} iterations, converged={}, final cost={:.6}",
        summary.iterations, summary.converged, summary.final_cost
    );
    println!(
        "node {:?} resolved pose: x={:.4} y={:.4} z={:.4} yaw={:.4}",
        second, resolved.x, resolved.y, resolved.z, resolved.yaw
    );
    Ok(())
}

fn validate_config(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config = toml::from_str(&text).context("parsing configuration TOML")?;
    match config.validate() {
        Ok(()) => {
            println!("{} is valid", path.display());
            Ok(())
        }
        Err(err) => bail!("{} is invalid: {err}", path.display()),
    }
}
