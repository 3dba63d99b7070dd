//! Ordinary kriging of hourly station observations onto the line points.
//!
//! For each hour and meteorological variable, an interpolator is built from
//! the station values: the experimental variogram is fitted, the ordinary
//! kriging system is assembled and LU-factored once, and every line point is
//! then estimated with a cheap solve. The estimation variance, not just the
//! mean, is carried forward so that the Monte Carlo stage can sample from the
//! kriging posterior.
use crate::numerics::LuFactorization;
use anyhow::{ensure, Context, Result};
use itertools::Itertools;
use serde_string_enum::DeserializeLabeledStringEnum;

/// Two station coordinates closer than this are considered the same site (m).
const COINCIDENCE_TOLERANCE: f64 = 1e-6;

/// Number of distance bins for the experimental variogram.
const VARIOGRAM_LAG_COUNT: usize = 6;

/// Semivariogram model fitted to the hour's station values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, DeserializeLabeledStringEnum)]
pub enum VariogramModel {
    /// γ(h) = nugget + slope·h
    #[default]
    #[string = "linear"]
    Linear,
    /// Spherical growth up to the range, flat sill beyond
    #[string = "spherical"]
    Spherical,
    /// Exponential approach to the sill with effective range `range`
    #[string = "exponential"]
    Exponential,
}

/// A fitted semivariogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Variogram {
    model: VariogramModel,
    /// Microscale variance at vanishing distance
    nugget: f64,
    /// Linear-model growth per metre
    slope: f64,
    /// Plateau variance for the bounded models
    sill: f64,
    /// Distance at which the bounded models reach the sill (m)
    range: f64,
}

impl Variogram {
    /// A linear variogram with the given nugget and slope.
    pub fn linear(nugget: f64, slope: f64) -> Self {
        Self {
            model: VariogramModel::Linear,
            nugget,
            slope,
            sill: 0.0,
            range: 0.0,
        }
    }

    /// Fit a variogram of the requested model to station values.
    ///
    /// The experimental variogram is computed from all station pairs, binned
    /// by distance, and fitted by ordinary least squares. A fit that fails or
    /// produces non-physical parameters falls back to a plain linear
    /// variogram with zero nugget and unit slope; kriging means are invariant
    /// to that rescaling, only the variance magnitude is affected.
    pub fn fit(model: VariogramModel, coordinates: &[(f64, f64)], values: &[f64]) -> Self {
        let pairs: Vec<(f64, f64)> = coordinates
            .iter()
            .zip(values)
            .tuple_combinations()
            .map(|((ca, za), (cb, zb))| {
                let h = distance(*ca, *cb);
                let semivariance = 0.5 * (za - zb).powi(2);
                (h, semivariance)
            })
            .collect();

        let Some(binned) = bin_semivariances(&pairs) else {
            return Self::linear(0.0, 1.0);
        };
        let Some((intercept, slope)) = fit_line(&binned) else {
            return Self::linear(0.0, 1.0);
        };

        if !slope.is_finite() || slope <= 0.0 {
            return Self::linear(0.0, 1.0);
        }
        let nugget = intercept.max(0.0);

        match model {
            VariogramModel::Linear => Self::linear(nugget, slope),
            VariogramModel::Spherical | VariogramModel::Exponential => {
                // Plateau from the top-third lags; range where the
                // experimental curve first reaches 95% of it
                let tail_start = binned.len() - binned.len().div_ceil(3);
                let sill = binned[tail_start..]
                    .iter()
                    .map(|&(_, gamma)| gamma)
                    .sum::<f64>()
                    / (binned.len() - tail_start) as f64;
                if !(sill > 0.0) {
                    return Self::linear(nugget, slope);
                }
                let range = binned
                    .iter()
                    .find(|&&(_, gamma)| gamma >= 0.95 * sill)
                    .map(|&(h, _)| h)
                    .unwrap_or(binned.last().unwrap().0);
                Self {
                    model,
                    nugget,
                    slope,
                    sill: (sill - nugget).max(0.0),
                    range,
                }
            }
        }
    }

    /// Evaluate the semivariogram at distance `h`.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        match self.model {
            VariogramModel::Linear => self.nugget + self.slope * h,
            VariogramModel::Spherical => {
                if h >= self.range {
                    self.nugget + self.sill
                } else {
                    let r = h / self.range;
                    self.nugget + self.sill * (1.5 * r - 0.5 * r.powi(3))
                }
            }
            VariogramModel::Exponential => {
                self.nugget + self.sill * (1.0 - (-3.0 * h / self.range).exp())
            }
        }
    }
}

/// Average pair semivariances into distance bins, dropping empty bins.
fn bin_semivariances(pairs: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
    let max_distance = pairs
        .iter()
        .map(|&(h, _)| h)
        .fold(0.0f64, f64::max);
    if !(max_distance > 0.0) {
        return None;
    }

    let width = max_distance / VARIOGRAM_LAG_COUNT as f64;
    let mut sums = vec![(0.0f64, 0.0f64, 0usize); VARIOGRAM_LAG_COUNT];
    for &(h, gamma) in pairs {
        let bin = ((h / width) as usize).min(VARIOGRAM_LAG_COUNT - 1);
        sums[bin].0 += h;
        sums[bin].1 += gamma;
        sums[bin].2 += 1;
    }

    let binned: Vec<(f64, f64)> = sums
        .into_iter()
        .filter(|&(_, _, count)| count > 0)
        .map(|(h_sum, g_sum, count)| (h_sum / count as f64, g_sum / count as f64))
        .collect();
    (!binned.is_empty()).then_some(binned)
}

/// Ordinary least squares line through (x, y) points; None for a single
/// point cloud with no spread (the caller then fits through the origin).
fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|&(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|&(_, y)| y).sum::<f64>() / n;
    let ss_xx: f64 = points.iter().map(|&(x, _)| (x - mean_x).powi(2)).sum();
    if ss_xx == 0.0 {
        // All pairs in one bin: a line through the origin is the only
        // defensible fit
        return (mean_x > 0.0).then_some((0.0, mean_y / mean_x));
    }
    let ss_xy: f64 = points
        .iter()
        .map(|&(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = ss_xy / ss_xx;
    Some((mean_y - slope * mean_x, slope))
}

/// Mean and standard deviation estimated at one target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Kriging mean
    pub mean: f64,
    /// Square root of the (clamped) kriging variance
    pub std: f64,
}

/// An ordinary kriging interpolator for one hour and one variable.
///
/// Holds the fitted variogram and the LU-factored kriging system so that
/// estimating every line point costs one triangular solve each.
pub struct OrdinaryKriging {
    coordinates: Vec<(f64, f64)>,
    values: Vec<f64>,
    variogram: Variogram,
    factorization: LuFactorization,
}

impl OrdinaryKriging {
    /// Build an interpolator by fitting a variogram to the station values.
    ///
    /// # Errors
    ///
    /// Fails when fewer than two stations are given, when two stations
    /// coincide, or when the kriging system is singular.
    pub fn build(
        model: VariogramModel,
        coordinates: &[(f64, f64)],
        values: &[f64],
    ) -> Result<Self> {
        let variogram = Variogram::fit(model, coordinates, values);
        Self::with_variogram(variogram, coordinates, values)
    }

    /// Build an interpolator from an already-fitted variogram.
    pub fn with_variogram(
        variogram: Variogram,
        coordinates: &[(f64, f64)],
        values: &[f64],
    ) -> Result<Self> {
        let n = coordinates.len();
        ensure!(
            n >= 2,
            "Kriging requires at least two stations ({n} given)"
        );
        ensure!(
            n == values.len(),
            "Mismatched station coordinates and values"
        );
        for ((i, a), (j, b)) in coordinates.iter().enumerate().tuple_combinations() {
            ensure!(
                distance(*a, *b) > COINCIDENCE_TOLERANCE,
                "Stations {i} and {j} coincide; kriging system is singular"
            );
        }

        // Augmented (n+1)x(n+1) system: station-to-station semivariances
        // bordered by the Lagrange row/column of ones
        let size = n + 1;
        let mut matrix = vec![0.0; size * size];
        for i in 0..n {
            for j in 0..n {
                matrix[i * size + j] = variogram.evaluate(distance(coordinates[i], coordinates[j]));
            }
            matrix[i * size + n] = 1.0;
            matrix[n * size + i] = 1.0;
        }

        let factorization = LuFactorization::new(matrix, size)
            .context("Kriging system is singular for this hour")?;

        Ok(Self {
            coordinates: coordinates.to_vec(),
            values: values.to_vec(),
            variogram,
            factorization,
        })
    }

    /// Kriging weights and Lagrange multiplier for a target point.
    fn solve_weights(&self, x: f64, y: f64) -> Result<(Vec<f64>, Vec<f64>)> {
        let n = self.coordinates.len();
        let mut rhs: Vec<f64> = self
            .coordinates
            .iter()
            .map(|&station| self.variogram.evaluate(distance(station, (x, y))))
            .chain(std::iter::once(1.0))
            .collect();
        let gammas = rhs[..n].to_vec();
        self.factorization.solve(&mut rhs)?;
        Ok((rhs, gammas))
    }

    /// Estimate mean and standard deviation at a target point.
    ///
    /// A target coinciding with a station reproduces that station's value
    /// exactly with zero variance.
    ///
    /// # Errors
    ///
    /// Fails only on a non-finite solve, which the caller treats as an
    /// interpolation failure for the hour.
    pub fn estimate(&self, x: f64, y: f64) -> Result<Estimate> {
        if let Some(station) = self
            .coordinates
            .iter()
            .position(|&s| distance(s, (x, y)) <= COINCIDENCE_TOLERANCE)
        {
            return Ok(Estimate {
                mean: self.values[station],
                std: 0.0,
            });
        }

        let n = self.coordinates.len();
        let (weights, gammas) = self.solve_weights(x, y)?;

        let mean: f64 = weights[..n]
            .iter()
            .zip(&self.values)
            .map(|(w, z)| w * z)
            .sum();
        let lagrange = weights[n];
        let variance: f64 = weights[..n]
            .iter()
            .zip(&gammas)
            .map(|(w, g)| w * g)
            .sum::<f64>()
            + lagrange;

        Ok(Estimate {
            mean,
            // Small negative variances are numerical noise
            std: variance.max(0.0).sqrt(),
        })
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn two_station_interpolator() -> OrdinaryKriging {
        OrdinaryKriging::with_variogram(
            Variogram::linear(0.0, 1.0),
            &[(0.0, 0.0), (1000.0, 0.0)],
            &[20.0, 30.0],
        )
        .unwrap()
    }

    #[test]
    fn test_estimate_at_station_is_exact() {
        let kriging = two_station_interpolator();
        let estimate = kriging.estimate(0.0, 0.0).unwrap();
        assert_approx_eq!(f64, estimate.mean, 20.0, epsilon = 1e-9);
        assert_approx_eq!(f64, estimate.std, 0.0, epsilon = 1e-9);

        let estimate = kriging.estimate(1000.0, 0.0).unwrap();
        assert_approx_eq!(f64, estimate.mean, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_estimate_at_midpoint() {
        let kriging = two_station_interpolator();
        let estimate = kriging.estimate(500.0, 0.0).unwrap();
        assert_approx_eq!(f64, estimate.mean, 25.0, epsilon = 1e-9);
        assert!(estimate.std > 0.0);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let kriging = OrdinaryKriging::with_variogram(
            Variogram::linear(0.0, 1.0),
            &[(0.0, 0.0), (1000.0, 0.0), (500.0, 800.0), (200.0, -300.0)],
            &[20.0, 30.0, 24.0, 28.0],
        )
        .unwrap();

        for target in [(123.0, 456.0), (-2000.0, 50.0), (700.0, 700.0)] {
            let (weights, _) = kriging.solve_weights(target.0, target.1).unwrap();
            let sum: f64 = weights[..4].iter().sum();
            assert_approx_eq!(f64, sum, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_variance_nonnegative_everywhere() {
        let kriging = OrdinaryKriging::build(
            VariogramModel::Linear,
            &[(0.0, 0.0), (1000.0, 0.0), (500.0, 800.0)],
            &[21.0, 29.0, 25.5],
        )
        .unwrap();

        for i in 0..20 {
            let x = -500.0 + 150.0 * i as f64;
            let estimate = kriging.estimate(x, 100.0).unwrap();
            assert!(estimate.std >= 0.0);
            assert!(estimate.std.is_finite());
        }
    }

    #[test]
    fn test_coincident_stations_rejected() {
        let result = OrdinaryKriging::build(
            VariogramModel::Linear,
            &[(0.0, 0.0), (0.0, 0.0)],
            &[20.0, 30.0],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_single_station_rejected() {
        let result =
            OrdinaryKriging::build(VariogramModel::Linear, &[(0.0, 0.0)], &[20.0]);
        assert!(result.is_err());
    }

    #[rstest]
    #[case(VariogramModel::Linear)]
    #[case(VariogramModel::Spherical)]
    #[case(VariogramModel::Exponential)]
    fn test_fit_produces_usable_variogram(#[case] model: VariogramModel) {
        let coordinates = [
            (0.0, 0.0),
            (1000.0, 0.0),
            (0.0, 1000.0),
            (1500.0, 1200.0),
            (800.0, 400.0),
        ];
        let values = [20.0, 24.0, 22.0, 27.0, 23.0];
        let variogram = Variogram::fit(model, &coordinates, &values);

        assert_eq!(variogram.evaluate(0.0), 0.0);
        // Monotone non-decreasing over a reasonable span
        let mut previous = 0.0;
        for i in 1..=10 {
            let gamma = variogram.evaluate(200.0 * i as f64);
            assert!(gamma.is_finite());
            assert!(gamma >= previous);
            previous = gamma;
        }
    }

    #[test]
    fn test_fit_falls_back_on_constant_field() {
        // Identical values at every station: zero semivariance everywhere,
        // the OLS slope is zero and the fallback takes over
        let coordinates = [(0.0, 0.0), (1000.0, 0.0), (0.0, 1000.0)];
        let values = [25.0, 25.0, 25.0];
        let variogram = Variogram::fit(VariogramModel::Linear, &coordinates, &values);
        assert_eq!(variogram, Variogram::linear(0.0, 1.0));
    }

    #[test]
    fn test_spherical_reaches_sill() {
        let variogram = Variogram {
            model: VariogramModel::Spherical,
            nugget: 0.5,
            slope: 0.0,
            sill: 2.0,
            range: 1000.0,
        };
        assert_approx_eq!(f64, variogram.evaluate(1000.0), 2.5, epsilon = 1e-12);
        assert_approx_eq!(f64, variogram.evaluate(5000.0), 2.5, epsilon = 1e-12);
        assert!(variogram.evaluate(500.0) < 2.5);
    }
}
