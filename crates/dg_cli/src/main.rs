//! Command-line driver for the nodal DG / DFR Euler2D solver.
//!
//! Loads a mesh and a config document, runs the solver to `FinalTime`
//! or `MaxIterations`, and optionally writes a snapshot. Exit codes
//! follow spec.md sec 6: 0 on successful completion, non-zero on fatal
//! configuration, mesh, or arithmetic errors.

mod config_load;
mod driver;
mod mesh_reader;

use clap::Parser;
use dg_core::SolverError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dg_euler2d", about = "Nodal DG / Direct Flux Reconstruction solver for the 2D compressible Euler equations")]
struct Cli {
    /// Path to the plain-text mesh file.
    #[arg(long)]
    mesh: PathBuf,

    /// Path to the config document (YAML/JSON/TOML, sniffed from extension).
    #[arg(long)]
    config: PathBuf,

    /// Optional output path for the final-state snapshot.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Number of shards for the per-step worker pool.
    #[arg(long, default_value_t = default_shard_count())]
    shards: usize,

    /// Verbosity: repeat for more detail (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn default_shard_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("dg_cli={default_level},dg_core={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_load::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let mesh_source = mesh_reader::FileMeshSource::new(&cli.mesh);

    match driver::run(&config, &mesh_source, cli.shards, cli.snapshot.as_deref()) {
        Ok(outcome) => {
            info!(steps = outcome.steps_taken, t = outcome.final_time, "run complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<SolverError>())
                .map(|solver_err| match solver_err {
                    SolverError::Configuration(_) => 2,
                    SolverError::Mesh(_) => 3,
                    SolverError::Arithmetic { .. } => 4,
                    SolverError::SolverState(_) => 5,
                    SolverError::BoundaryCondition(_) => 6,
                })
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}
