//! Monte Carlo propagation of ambient uncertainty through the thermal model.
//!
//! For one (point, hour), each meteorological variable is drawn from the
//! kriging posterior, the wind is recomposed from its components, and the
//! thermal solver is evaluated per draw. Every task derives its own RNG seed
//! from the master seed and its (timestamp, point) coordinates, so results do
//! not depend on the order in which tasks execute.
use crate::kriging::Estimate;
use crate::numerics::{find_root_brent, percentile_sorted, RootFindError};
use crate::thermal::{AmbientConditions, CigreThermalModel};
use crate::wind;
use anyhow::{anyhow, ensure, Result};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Fraction of discarded draws above which a result is flagged degraded.
const DEGRADATION_THRESHOLD: f64 = 0.01;

/// Upper bracket for the ampacity inversion (A).
const AMPACITY_MAX_CURRENT: f64 = 10_000.0;

/// Kriging estimates for the four interpolated variables at one
/// (point, hour).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldEstimates {
    /// Air temperature (°C)
    pub air_temperature: Estimate,
    /// Global solar irradiance (W/m²)
    pub solar_radiation: Estimate,
    /// Wind U component (m/s)
    pub wind_u: Estimate,
    /// Wind V component (m/s)
    pub wind_v: Estimate,
}

/// What to compute for each (point, hour).
#[derive(Debug, Clone, Copy)]
pub struct PropagationSettings {
    /// Number of draws
    pub iterations: usize,
    /// Whether to invert for the ampacity as well
    pub compute_ampacity: bool,
    /// Confidence percentile used for the ampacity inversion
    pub confidence_percentile: f64,
}

/// The empirical temperature distribution for one (point, hour).
#[derive(Debug, Clone)]
pub struct Propagation {
    /// Valid conductor temperature realizations, unsorted
    pub temperatures: Vec<f64>,
    /// Draws discarded because the solver failed or produced non-finite
    /// values
    pub discarded: usize,
    /// True when more than 1% of draws were discarded
    pub degraded: bool,
    /// Mean sampled wind speed (m/s)
    pub wind_speed_mean: f64,
    /// Mean sampled attack angle (degrees)
    pub attack_angle_mean: f64,
    /// Current that puts the confidence percentile at the design
    /// temperature, when requested
    pub ampacity: Option<f64>,
}

/// Derive the per-task RNG seed from the master seed and the task's
/// (timestamp, point) coordinates.
///
/// SplitMix64 mixing; the same task always gets the same stream no matter
/// which thread runs it.
pub fn derive_subseed(master_seed: u64, timestamp: NaiveDateTime, point_id: u32) -> u64 {
    let hour = timestamp.and_utc().timestamp() as u64;
    splitmix64(master_seed ^ splitmix64(hour ^ splitmix64(point_id as u64)))
}

fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Propagate ambient uncertainty through the thermal model for one
/// (point, hour).
///
/// Draws that fail to solve or produce non-finite temperatures are dropped;
/// if more than 1% are dropped the outcome is flagged degraded.
///
/// # Errors
///
/// Fails when no draw at all produces a valid temperature, or when a kriging
/// standard deviation is not a valid normal scale (negative or NaN).
pub fn propagate(
    model: &CigreThermalModel,
    estimates: &FieldEstimates,
    line_azimuth: f64,
    current: f64,
    seed: u64,
    settings: &PropagationSettings,
) -> Result<Propagation> {
    ensure!(settings.iterations > 0, "Iteration count must be positive");

    let mut rng = StdRng::seed_from_u64(seed);
    let air = normal(&estimates.air_temperature)?;
    let sun = normal(&estimates.solar_radiation)?;
    let wind_u = normal(&estimates.wind_u)?;
    let wind_v = normal(&estimates.wind_v)?;

    let mut temperatures = Vec::with_capacity(settings.iterations);
    let mut ambients = settings
        .compute_ampacity
        .then(|| Vec::with_capacity(settings.iterations));
    let mut discarded = 0;
    let mut wind_speed_sum = 0.0;
    let mut attack_angle_sum = 0.0;

    for _ in 0..settings.iterations {
        let air_temperature = air.sample(&mut rng);
        // Negative irradiance draws are physically meaningless
        let solar_radiation = sun.sample(&mut rng).max(0.0);
        let u = wind_u.sample(&mut rng);
        let v = wind_v.sample(&mut rng);

        let (wind_speed, wind_direction) = wind::from_components(u, v);
        let attack_angle = wind::attack_angle(wind_direction, line_azimuth);
        let ambient = AmbientConditions {
            air_temperature,
            solar_radiation,
            wind_speed,
            attack_angle,
        };

        match model.conductor_temperature(current, &ambient) {
            Ok(temperature) if temperature.is_finite() => {
                temperatures.push(temperature);
                wind_speed_sum += wind_speed;
                attack_angle_sum += attack_angle;
                if let Some(ambients) = ambients.as_mut() {
                    ambients.push(ambient);
                }
            }
            _ => discarded += 1,
        }
    }

    if temperatures.is_empty() {
        return Err(anyhow!(
            "All {} draws failed to produce a conductor temperature",
            settings.iterations
        ));
    }

    let valid = temperatures.len();
    let degraded = discarded as f64 / settings.iterations as f64 > DEGRADATION_THRESHOLD;

    let ampacity = match ambients {
        Some(ambients) => Some(
            sampled_ampacity(
                model,
                &ambients,
                model.conductor().max_temperature,
                settings.confidence_percentile,
            )
            .map_err(|e| anyhow!("Ampacity inversion failed: {e}"))?,
        ),
        None => None,
    };

    Ok(Propagation {
        temperatures,
        discarded,
        degraded,
        wind_speed_mean: wind_speed_sum / valid as f64,
        attack_angle_mean: attack_angle_sum / valid as f64,
        ampacity,
    })
}

fn normal(estimate: &Estimate) -> Result<Normal<f64>> {
    Normal::new(estimate.mean, estimate.std)
        .map_err(|e| anyhow!("Invalid sampling distribution (mean {}, std {}): {e}", estimate.mean, estimate.std))
}

/// The current at which the confidence percentile of the sampled conductor
/// temperature reaches `max_temperature`.
///
/// Re-evaluates the thermal model over the same ambient draws for each
/// candidate current; the percentile is strictly increasing in current, so a
/// bracketing search converges.
fn sampled_ampacity(
    model: &CigreThermalModel,
    ambients: &[AmbientConditions],
    max_temperature: f64,
    confidence_percentile: f64,
) -> Result<f64, RootFindError> {
    let percentile_at = |current: f64| -> f64 {
        let mut temperatures: Vec<f64> = ambients
            .iter()
            .filter_map(|ambient| model.conductor_temperature(current, ambient).ok())
            .filter(|t| t.is_finite())
            .collect();
        if temperatures.is_empty() {
            // The whole batch went over the bracket: hotter than any
            // physical design limit
            return f64::MAX;
        }
        temperatures.sort_unstable_by(f64::total_cmp);
        percentile_sorted(&temperatures, confidence_percentile)
    };

    find_root_brent(
        |current| percentile_at(current) - max_temperature,
        0.0,
        AMPACITY_MAX_CURRENT,
        1e-3,
    )
}
