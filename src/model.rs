//! The model represents the static input data provided by the user.
//!
//! Everything here is loaded once, validated, and then shared read-only with
//! the worker threads.
use crate::geodesy::{discretize_route, LinePoint};
use crate::input::current::{read_current_schedule, CurrentSchedule};
use crate::input::route::read_route;
use crate::input::station::{read_stations, StationSet};
use crate::settings::ModelFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Model definition
pub struct Model {
    /// Canonical path to the model directory
    pub model_path: PathBuf,
    /// Contents of the model file
    pub parameters: ModelFile,
    /// Discretized line points, progressive ascending
    pub line_points: Vec<LinePoint>,
    /// Stations and their hourly observations
    pub stations: StationSet,
    /// Current per analysis hour
    pub current: CurrentSchedule,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let model_dir = model_dir.as_ref();
        let parameters = ModelFile::from_path(model_dir)?;

        let vertices = read_route(model_dir)?;
        let line_points =
            discretize_route(&vertices, parameters.simulation.discretization_step_m)
                .context("Failed to discretize route")?;

        let stations = read_stations(model_dir)?;
        let current = read_current_schedule(model_dir, parameters.current.constant_a)?;

        let model_path = model_dir
            .canonicalize()
            .context("Could not parse path to model")?;

        Ok(Model {
            model_path,
            parameters,
            line_points,
            stations,
            current,
        })
    }
}
