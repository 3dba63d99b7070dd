//! Functionality for running the thermal risk simulation.
//!
//! The orchestrator walks the analysis hours in order; per hour it builds
//! one kriging interpolator per variable (amortizing the variogram fit and
//! the matrix factorization across every line point) and then fans the
//! points out over the thread pool. Each (point, hour) task derives its own
//! RNG seed, so the result table is identical no matter how the work is
//! scheduled.
use crate::geodesy::LinePoint;
use crate::kriging::OrdinaryKriging;
use crate::model::Model;
use crate::montecarlo::{self, FieldEstimates, PropagationSettings};
use crate::output::DataWriter;
use crate::risk::{self, RiskBands};
use crate::thermal::CigreThermalModel;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// One row of the hourly result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyResult {
    /// Analysis hour (UTC-naive)
    pub timestamp: NaiveDateTime,
    /// Line point number
    pub point_id: u32,
    /// Arc length of the point along the route (m)
    pub progressive_m: f64,
    /// Mean conductor temperature over the draws (°C)
    pub t_c_mean: f64,
    /// 90th percentile conductor temperature (°C)
    pub t_c_p90: f64,
    /// 95th percentile conductor temperature (°C)
    pub t_c_p95: f64,
    /// Probability of exceeding the design temperature
    pub risk: f64,
    /// Qualitative risk class
    pub risk_class: String,
    /// True when more than 1% of draws were discarded
    pub degraded: bool,
    /// Interpolated mean air temperature (°C)
    pub t_a_mean: f64,
    /// Interpolated mean irradiance (W/m²)
    pub q_s_mean: f64,
    /// Mean sampled wind speed (m/s)
    pub w_s_mean: f64,
    /// Mean sampled attack angle (degrees)
    pub attack_angle_mean: f64,
    /// Current applied at this hour (A)
    pub current_a: f64,
    /// Number of valid draws behind the figures
    pub iterations_used: usize,
    /// Ampacity for the confidence percentile, when requested (A)
    pub ampacity_a: Option<f64>,
}

/// Counters for every error recovered during a run, surfaced alongside the
/// result table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunDiagnostics {
    /// Hours that produced result rows
    pub hours_analysed: usize,
    /// Hours discarded at load because some station record was missing
    pub hours_dropped_incomplete: usize,
    /// Hours not covered by the current schedule
    pub hours_dropped_no_current: usize,
    /// Hours dropped because a kriging system could not be solved
    pub hours_dropped_interpolation: usize,
    /// Monte Carlo draws discarded across all tasks
    pub draws_discarded: usize,
    /// Results flagged degraded (over 1% of draws discarded)
    pub degraded_results: usize,
    /// (point, hour) tasks that produced no result at all
    pub failed_point_hours: usize,
    /// Whether the run was cancelled before completing
    pub cancelled: bool,
}

/// Everything a per-point task needs, shared read-only across the pool.
struct HourContext<'a> {
    timestamp: NaiveDateTime,
    current: f64,
    air: OrdinaryKriging,
    sun: OrdinaryKriging,
    wind_u: OrdinaryKriging,
    wind_v: OrdinaryKriging,
    thermal: &'a CigreThermalModel,
    propagation: PropagationSettings,
    master_seed: u64,
}

/// What one (point, hour) task produced.
struct PointOutcome {
    row: Option<HourlyResult>,
    discarded: usize,
    degraded: bool,
    failed: bool,
}

impl PointOutcome {
    fn skipped() -> Self {
        Self {
            row: None,
            discarded: 0,
            degraded: false,
            failed: false,
        }
    }

    fn failed() -> Self {
        Self {
            failed: true,
            ..Self::skipped()
        }
    }
}

/// Run the simulation.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `cancel` - Cooperative cancellation flag, observed between hours and
///   between points
pub fn run(model: Model, output_path: &Path, cancel: &AtomicBool) -> Result<RunDiagnostics> {
    let mut writer = DataWriter::create(output_path)?;

    let parameters = &model.parameters;
    let thermal = CigreThermalModel::new(
        parameters.conductor.clone(),
        parameters.simulation.solar_incidence_deg,
    )?;
    let propagation = PropagationSettings {
        iterations: parameters.simulation.mc_iterations,
        compute_ampacity: parameters.simulation.compute_ampacity,
        confidence_percentile: parameters.simulation.confidence_percentile,
    };

    let mut diagnostics = RunDiagnostics {
        hours_dropped_incomplete: model.stations.hours_dropped,
        ..Default::default()
    };
    let coordinates = model.stations.coordinates();

    info!(
        "Analysing {} hours over {} line points",
        model.stations.observations.len(),
        model.line_points.len()
    );

    for (&timestamp, observations) in &model.stations.observations {
        if cancel.load(Ordering::Relaxed) {
            diagnostics.cancelled = true;
            break;
        }

        let Some(current) = model.current.current_at(timestamp) else {
            diagnostics.hours_dropped_no_current += 1;
            continue;
        };

        // One interpolator per variable, shared by every point this hour
        let interpolators = [
            &observations.air_temperature,
            &observations.solar_radiation,
            &observations.wind_u,
            &observations.wind_v,
        ]
        .map(|values| {
            OrdinaryKriging::build(parameters.simulation.variogram_model, &coordinates, values)
        });
        let [air, sun, wind_u, wind_v] = match interpolators {
            [Ok(air), Ok(sun), Ok(wind_u), Ok(wind_v)] => [air, sun, wind_u, wind_v],
            _ => {
                warn!("Dropping hour {timestamp}: kriging system could not be built");
                diagnostics.hours_dropped_interpolation += 1;
                continue;
            }
        };

        let context = HourContext {
            timestamp,
            current,
            air,
            sun,
            wind_u,
            wind_v,
            thermal: &thermal,
            propagation,
            master_seed: parameters.simulation.rng_master_seed,
        };

        let outcomes: Vec<PointOutcome> = model
            .line_points
            .par_iter()
            .map(|point| analyse_point(&context, point, &model.parameters.risk_bands, cancel))
            .collect();

        let mut produced = 0;
        for outcome in outcomes {
            diagnostics.draws_discarded += outcome.discarded;
            diagnostics.degraded_results += outcome.degraded as usize;
            diagnostics.failed_point_hours += outcome.failed as usize;
            if let Some(row) = outcome.row {
                writer.write_result(&row)?;
                produced += 1;
            }
        }
        if produced > 0 {
            diagnostics.hours_analysed += 1;
        }
    }

    writer.write_diagnostics(&diagnostics)?;
    writer.flush()?;

    if diagnostics.cancelled {
        info!("Run cancelled; remaining hours were not analysed");
    }
    info!(
        "Finished: {} hours analysed, {} dropped ({} incomplete, {} without current, \
         {} interpolation failures)",
        diagnostics.hours_analysed,
        diagnostics.hours_dropped_incomplete
            + diagnostics.hours_dropped_no_current
            + diagnostics.hours_dropped_interpolation,
        diagnostics.hours_dropped_incomplete,
        diagnostics.hours_dropped_no_current,
        diagnostics.hours_dropped_interpolation
    );
    if diagnostics.degraded_results > 0 || diagnostics.failed_point_hours > 0 {
        warn!(
            "{} degraded results, {} failed (point, hour) tasks, {} draws discarded",
            diagnostics.degraded_results,
            diagnostics.failed_point_hours,
            diagnostics.draws_discarded
        );
    }

    Ok(diagnostics)
}

/// Analyse one (point, hour): estimate the ambient fields, propagate the
/// uncertainty and reduce to risk figures.
fn analyse_point(
    context: &HourContext,
    point: &LinePoint,
    bands: &RiskBands,
    cancel: &AtomicBool,
) -> PointOutcome {
    if cancel.load(Ordering::Relaxed) {
        return PointOutcome::skipped();
    }

    let estimates = match estimate_fields(context, point.x, point.y) {
        Ok(estimates) => estimates,
        Err(error) => {
            warn!(
                "Point {} at {}: interpolation failed: {error:#}",
                point.id, context.timestamp
            );
            return PointOutcome::failed();
        }
    };

    let seed = montecarlo::derive_subseed(context.master_seed, context.timestamp, point.id);
    let propagation = match montecarlo::propagate(
        context.thermal,
        &estimates,
        point.azimuth,
        context.current,
        seed,
        &context.propagation,
    ) {
        Ok(propagation) => propagation,
        Err(error) => {
            warn!(
                "Point {} at {}: {error:#}",
                point.id, context.timestamp
            );
            return PointOutcome::failed();
        }
    };

    let discarded = propagation.discarded;
    let degraded = propagation.degraded;
    let iterations_used = propagation.temperatures.len();
    let assessment = match risk::assess(
        propagation.temperatures,
        context.thermal.conductor().max_temperature,
        bands,
    ) {
        Ok(assessment) => assessment,
        Err(error) => {
            warn!(
                "Point {} at {}: {error:#}",
                point.id, context.timestamp
            );
            return PointOutcome::failed();
        }
    };

    PointOutcome {
        row: Some(HourlyResult {
            timestamp: context.timestamp,
            point_id: point.id,
            progressive_m: point.progressive,
            t_c_mean: assessment.mean,
            t_c_p90: assessment.p90,
            t_c_p95: assessment.p95,
            risk: assessment.probability,
            risk_class: assessment.class,
            degraded,
            t_a_mean: estimates.air_temperature.mean,
            q_s_mean: estimates.solar_radiation.mean,
            w_s_mean: propagation.wind_speed_mean,
            attack_angle_mean: propagation.attack_angle_mean,
            current_a: context.current,
            iterations_used,
            ampacity_a: propagation.ampacity,
        }),
        discarded,
        degraded,
        failed: false,
    }
}

/// Estimate the four ambient fields at a target point.
fn estimate_fields(context: &HourContext, x: f64, y: f64) -> Result<FieldEstimates> {
    Ok(FieldEstimates {
        air_temperature: context
            .air
            .estimate(x, y)
            .context("air temperature")?,
        solar_radiation: context.sun.estimate(x, y).context("solar radiation")?,
        wind_u: context.wind_u.estimate(x, y).context("wind U component")?,
        wind_v: context.wind_v.estimate(x, y).context("wind V component")?,
    })
}
