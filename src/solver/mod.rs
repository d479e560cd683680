//! Bounded one-dimensional root finding.
//!
//! Every search has a fixed iteration budget and reports
//! [`PKError::SolverDivergence`] instead of returning an unconverged value.
//! Residual functions are fallible so nested searches can propagate errors.

use crate::error::{PKError, PKResult};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Absolute tolerance on the root.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl SolverSettings {
    pub const fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self { tolerance, max_iterations }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self::new(1e-6, 200)
    }
}

fn check_finite(method: &str, x: f64, value: f64) -> PKResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PKError::SolverDivergence(
            format!("{}: residual is not finite at {}", method, x)
        ))
    }
}

/// Bisection on `[lo, hi]`; `f(lo)` and `f(hi)` must differ in sign.
pub fn bisect<F>(mut f: F, lo: f64, hi: f64, settings: SolverSettings) -> PKResult<f64>
where
    F: FnMut(f64) -> PKResult<f64>,
{
    let (mut lo, mut hi) = (lo, hi);
    let mut f_lo = check_finite("bisection", lo, f(lo)?)?;
    let f_hi = check_finite("bisection", hi, f(hi)?)?;

    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return Err(PKError::SolverDivergence(
            format!("bisection: no sign change on [{}, {}]", lo, hi)
        ));
    }

    for _ in 0..settings.max_iterations {
        let mid = 0.5 * (lo + hi);
        let f_mid = check_finite("bisection", mid, f(mid)?)?;
        if f_mid == 0.0 || 0.5 * (hi - lo).abs() < settings.tolerance {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(PKError::SolverDivergence(
        format!("bisection did not converge within {} iterations", settings.max_iterations)
    ))
}

/// Secant iteration seeded with `x0` and `x1`. Converges when successive
/// iterates differ by less than the tolerance (relative to `1 + |x|`).
pub fn secant<F>(mut f: F, x0: f64, x1: f64, settings: SolverSettings) -> PKResult<f64>
where
    F: FnMut(f64) -> PKResult<f64>,
{
    let (mut x0, mut x1) = (x0, x1);
    let mut f0 = check_finite("secant", x0, f(x0)?)?;
    let mut f1 = check_finite("secant", x1, f(x1)?)?;

    for iteration in 0..settings.max_iterations {
        if f1 == 0.0 {
            return Ok(x1);
        }
        let denominator = f1 - f0;
        if denominator == 0.0 {
            return Err(PKError::SolverDivergence(
                format!("secant: flat residual between {} and {}", x0, x1)
            ));
        }

        let x2 = x1 - f1 * (x1 - x0) / denominator;
        if !x2.is_finite() {
            return Err(PKError::SolverDivergence("secant: iterate is not finite".to_string()));
        }

        x0 = x1;
        f0 = f1;
        x1 = x2;
        f1 = check_finite("secant", x1, f(x1)?)?;

        if (x1 - x0).abs() <= settings.tolerance * (1.0 + x1.abs()) {
            debug!("secant converged to {} after {} iterations", x1, iteration + 1);
            return Ok(x1);
        }
    }

    Err(PKError::SolverDivergence(
        format!("secant did not converge within {} iterations", settings.max_iterations)
    ))
}

/// Walks upward from `lo` with a doubling step until `f` changes sign,
/// returning the bracketing pair. Fails once `limit` is passed.
pub fn expand_bracket<F>(mut f: F, lo: f64, first_step: f64, limit: f64) -> PKResult<(f64, f64)>
where
    F: FnMut(f64) -> PKResult<f64>,
{
    let sign = check_finite("bracket", lo, f(lo)?)?.signum();
    let mut lower = lo;
    let mut step = first_step;

    loop {
        let upper = (lower + step).min(limit);
        let value = check_finite("bracket", upper, f(upper)?)?;
        if value == 0.0 || value.signum() != sign {
            return Ok((lower, upper));
        }
        if upper >= limit {
            return Err(PKError::SolverDivergence(
                format!("no sign change between {} and {}", lo, limit)
            ));
        }
        lower = upper;
        step *= 2.0;
    }
}
