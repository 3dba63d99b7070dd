//! The command line interface for the simulation.
use crate::log;
use crate::model::Model;
use crate::output::{create_output_directory, get_output_dir};
use crate::simulation;
use ::log::info;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// The command line interface for the simulation.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Commands,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a thermal risk analysis model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Directory for output files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run {
                model_dir,
                output_dir,
            } => handle_run_command(&model_dir, output_dir.as_deref()),
        }
    }
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    Cli::parse().command.execute()
}

/// Handle the `run` command.
pub fn handle_run_command(model_path: &Path, output_path: Option<&Path>) -> Result<()> {
    // Create output folder
    let output_path = match output_path {
        Some(p) => p.to_owned(),
        None => get_output_dir(model_path)?,
    };
    create_output_directory(&output_path).context("Failed to create output directory.")?;

    // Load the model to run
    let model = Model::from_path(model_path).context("Failed to load model.")?;

    // Initialise program logger
    log::init(model.parameters.log_level.as_deref(), &output_path)
        .context("Failed to initialise logging.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output data will be written to {}", output_path.display());

    // Run the simulation
    let cancel = AtomicBool::new(false);
    simulation::run(model, &output_path, &cancel)?;

    Ok(())
}
