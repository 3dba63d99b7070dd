//! Defines the `ModelFile` struct, which represents the contents of
//! `model.toml`.
//!
//! Every tunable of the analysis lives here; there is no module-level
//! mutable state anywhere in the crate.
use crate::input::{input_err_msg, read_toml};
use crate::kriging::VariogramModel;
use crate::risk::RiskBands;
use crate::thermal::ConductorParameters;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::Path;

const MODEL_FILE_NAME: &str = "model.toml";

/// EPSG code of the supported geographic CRS (SIRGAS 2000).
const SUPPORTED_SOURCE_CRS: u32 = 4674;
/// EPSG code of the supported projected CRS (Brazil Polyconic).
const SUPPORTED_TARGET_CRS: u32 = 5880;

fn default_step() -> f64 {
    1000.0
}
fn default_iterations() -> usize {
    10_000
}
fn default_percentile() -> f64 {
    90.0
}
fn default_solar_incidence() -> f64 {
    90.0
}
fn default_source_crs() -> u32 {
    SUPPORTED_SOURCE_CRS
}
fn default_target_crs() -> u32 {
    SUPPORTED_TARGET_CRS
}
fn default_constant_current() -> f64 {
    500.0
}

/// Represents the contents of the entire model file.
#[derive(Debug, PartialEq, Deserialize)]
pub struct ModelFile {
    /// Logging level, overridable with the `LINERISK_LOG_LEVEL` environment
    /// variable
    pub log_level: Option<String>,
    /// Simulation tunables
    #[serde(default)]
    pub simulation: SimulationParameters,
    /// Physical parameters of the conductor
    pub conductor: ConductorParameters,
    /// Current settings
    #[serde(default)]
    pub current: CurrentSettings,
    /// Thermal risk classification bands
    #[serde(default)]
    pub risk_bands: RiskBands,
}

/// Represents the "simulation" section of the model file.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Distance between discretized line points (m)
    pub discretization_step_m: f64,
    /// Monte Carlo draws per (point, hour)
    pub mc_iterations: usize,
    /// Percentile used for the confidence temperature and the ampacity
    /// inversion
    pub confidence_percentile: f64,
    /// Semivariogram model fitted each hour
    pub variogram_model: VariogramModel,
    /// Master seed from which every task seed is derived
    pub rng_master_seed: u64,
    /// Whether to also invert for the ampacity at every (point, hour)
    pub compute_ampacity: bool,
    /// Solar incidence angle applied to the irradiance (degrees)
    pub solar_incidence_deg: f64,
    /// EPSG code of the geographic input CRS
    pub source_crs: u32,
    /// EPSG code of the projected CRS
    pub target_crs: u32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            discretization_step_m: default_step(),
            mc_iterations: default_iterations(),
            confidence_percentile: default_percentile(),
            variogram_model: VariogramModel::default(),
            rng_master_seed: 0,
            compute_ampacity: false,
            solar_incidence_deg: default_solar_incidence(),
            source_crs: default_source_crs(),
            target_crs: default_target_crs(),
        }
    }
}

/// Represents the "current" section of the model file.
#[derive(Debug, PartialEq, Deserialize)]
pub struct CurrentSettings {
    /// Constant current applied when no schedule file is present (A)
    #[serde(default = "default_constant_current")]
    pub constant_a: f64,
}

impl Default for CurrentSettings {
    fn default() -> Self {
        Self {
            constant_a: default_constant_current(),
        }
    }
}

impl ModelFile {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelFile`] struct or an error if the
    /// file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelFile> {
        let file_path = model_dir.as_ref().join(MODEL_FILE_NAME);
        let model_file: ModelFile = read_toml(&file_path)?;
        model_file
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_file)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        let simulation = &self.simulation;
        ensure!(
            simulation.discretization_step_m > 0.0,
            "`discretization_step_m` must be positive"
        );
        ensure!(
            simulation.mc_iterations > 0,
            "`mc_iterations` must be positive"
        );
        ensure!(
            simulation.confidence_percentile > 0.0 && simulation.confidence_percentile < 100.0,
            "`confidence_percentile` must be in (0, 100)"
        );
        ensure!(
            (0.0..=90.0).contains(&simulation.solar_incidence_deg),
            "`solar_incidence_deg` must be in [0, 90]"
        );
        ensure!(
            simulation.source_crs == SUPPORTED_SOURCE_CRS
                && simulation.target_crs == SUPPORTED_TARGET_CRS,
            "Only the EPSG:{SUPPORTED_SOURCE_CRS} to EPSG:{SUPPORTED_TARGET_CRS} projection \
             is supported (got {} to {})",
            simulation.source_crs,
            simulation.target_crs
        );
        ensure!(
            self.current.constant_a.is_finite() && self.current.constant_a >= 0.0,
            "`constant_a` must be a non-negative current"
        );

        self.conductor
            .validate()
            .context("Invalid conductor parameters")?;
        self.risk_bands
            .validate()
            .context("Invalid risk bands")?;

        Ok(())
    }
}
