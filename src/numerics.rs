//! Small numerical kernel shared by the kriging and thermal modules.
//!
//! Station counts are in the tens and the thermal balance is a scalar
//! equation, so a dense solve with partial pivoting and a bracketing root
//! finder are all that is needed.
use anyhow::{bail, Result};
use std::fmt::Display;

/// Pivots smaller than this are treated as zero during elimination.
const SINGULARITY_TOLERANCE: f64 = 1e-10;

/// Default iteration cap for [`find_root_brent`].
pub const MAX_ROOT_ITERATIONS: u32 = 100;

/// LU factorization of a square matrix with partial pivoting.
///
/// Factorize once, then solve against many right-hand sides. This is what
/// lets the per-hour kriging system be factored a single time and reused for
/// every target point along the line.
#[derive(Debug, Clone)]
pub struct LuFactorization {
    /// Combined L (below diagonal, unit diagonal implied) and U (diagonal
    /// and above), row-major
    lu: Vec<f64>,
    /// Row permutation applied during pivoting
    pivots: Vec<usize>,
    n: usize,
}

impl LuFactorization {
    /// Factorize a row-major `n`×`n` matrix.
    ///
    /// # Errors
    ///
    /// Fails if the matrix is singular to working precision or the
    /// dimensions are inconsistent.
    pub fn new(mut matrix: Vec<f64>, n: usize) -> Result<Self> {
        if matrix.len() != n * n {
            bail!("Matrix has {} entries, expected {}", matrix.len(), n * n);
        }

        let mut pivots: Vec<usize> = (0..n).collect();
        for col in 0..n {
            let pivot_row = (col..n)
                .max_by(|&a, &b| {
                    matrix[a * n + col]
                        .abs()
                        .total_cmp(&matrix[b * n + col].abs())
                })
                .unwrap();
            if matrix[pivot_row * n + col].abs() < SINGULARITY_TOLERANCE {
                bail!("Singular matrix (pivot {col} below tolerance)");
            }
            if pivot_row != col {
                for k in 0..n {
                    matrix.swap(col * n + k, pivot_row * n + k);
                }
                pivots.swap(col, pivot_row);
            }

            let pivot = matrix[col * n + col];
            for row in col + 1..n {
                let factor = matrix[row * n + col] / pivot;
                matrix[row * n + col] = factor;
                for k in col + 1..n {
                    matrix[row * n + k] -= factor * matrix[col * n + k];
                }
            }
        }

        Ok(Self {
            lu: matrix,
            pivots,
            n,
        })
    }

    /// Solve `A * x = rhs` in place using the stored factorization.
    ///
    /// # Errors
    ///
    /// Fails if the right-hand side length does not match or the solution is
    /// non-finite.
    pub fn solve(&self, rhs: &mut [f64]) -> Result<()> {
        let n = self.n;
        if rhs.len() != n {
            bail!("Right-hand side has {} entries, expected {}", rhs.len(), n);
        }

        // Apply the row permutation
        let permuted: Vec<f64> = self.pivots.iter().map(|&p| rhs[p]).collect();
        rhs.copy_from_slice(&permuted);

        // Forward substitution with L (unit diagonal)
        for row in 1..n {
            let mut sum = rhs[row];
            for k in 0..row {
                sum -= self.lu[row * n + k] * rhs[k];
            }
            rhs[row] = sum;
        }

        // Back substitution with U
        for row in (0..n).rev() {
            let mut sum = rhs[row];
            for k in row + 1..n {
                sum -= self.lu[row * n + k] * rhs[k];
            }
            rhs[row] = sum / self.lu[row * n + row];
        }

        if rhs.iter().any(|x| !x.is_finite()) {
            bail!("Non-finite solution from linear solve");
        }

        Ok(())
    }
}

/// Why a bracketing root find could not produce a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootFindError {
    /// The function does not change sign over the requested interval.
    NoBracket,
    /// The iteration cap was reached before the tolerance was met.
    MaxIterations,
    /// The function produced a NaN or infinite value during iteration.
    NonFinite,
}

impl Display for RootFindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoBracket => write!(f, "function does not change sign over the interval"),
            Self::MaxIterations => write!(f, "iteration cap reached"),
            Self::NonFinite => write!(f, "function produced a non-finite value"),
        }
    }
}

impl std::error::Error for RootFindError {}

/// Find a root of `f` in `[a, b]` with Brent's method.
///
/// The interval must bracket a root (`f(a)` and `f(b)` of opposite sign).
/// Returns the root to within `tolerance` on the abscissa. Derivative-free
/// and guaranteed to converge for a valid bracket.
pub fn find_root_brent<F>(mut f: F, a: f64, b: f64, tolerance: f64) -> Result<f64, RootFindError>
where
    F: FnMut(f64) -> f64,
{
    let mut a = a;
    let mut b = b;
    let mut fa = f(a);
    let mut fb = f(b);

    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if !fa.is_finite() || !fb.is_finite() || fa.signum() == fb.signum() {
        return Err(RootFindError::NoBracket);
    }

    // Arrange so that b is the best estimate
    if fa.abs() < fb.abs() {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut bisected = true;

    for _ in 0..MAX_ROOT_ITERATIONS {
        let s = if fa != fc && fb != fc {
            // Inverse quadratic interpolation
            a * fb * fc / ((fa - fb) * (fa - fc))
                + b * fa * fc / ((fb - fa) * (fb - fc))
                + c * fa * fb / ((fc - fa) * (fc - fb))
        } else {
            // Secant step
            b - fb * (b - a) / (fb - fa)
        };

        let bound = (3.0 * a + b) / 4.0;
        let between = (bound < s && s < b) || (b < s && s < bound);
        let use_bisection = !between
            || (bisected && (s - b).abs() >= (b - c).abs() / 2.0)
            || (!bisected && (s - b).abs() >= (c - d).abs() / 2.0)
            || (bisected && (b - c).abs() < tolerance)
            || (!bisected && (c - d).abs() < tolerance);

        let s = if use_bisection {
            bisected = true;
            (a + b) / 2.0
        } else {
            bisected = false;
            s
        };

        let fs = f(s);
        if !fs.is_finite() {
            return Err(RootFindError::NonFinite);
        }
        d = c;
        c = b;
        fc = fb;
        if fa.signum() == fs.signum() {
            a = s;
            fa = fs;
        } else {
            b = s;
            fb = fs;
        }
        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }

        if fb == 0.0 || (b - a).abs() < tolerance {
            return Ok(b);
        }
    }

    Err(RootFindError::MaxIterations)
}

/// Linear-interpolated percentile of an ascending-sorted sample.
///
/// `p` is in percent. Matches the conventional definition where the sorted
/// values sit at ranks `i / (n - 1)`.
///
/// # Panics
///
/// Panics if the sample is empty or `p` is outside `[0, 100]`.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "percentile of empty sample");
    assert!((0.0..=100.0).contains(&p), "percentile out of range: {p}");

    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    if below + 1 == sorted.len() {
        return sorted[below];
    }
    let weight = rank - below as f64;
    sorted[below] * (1.0 - weight) + sorted[below + 1] * weight
}
