use crate::error::{PKError, PKResult};
use crate::models::ModelParameters;
use std::f64::consts::PI;

/// Rates closer than this (relative) are treated as coincident.
const COINCIDENT_RATES: f64 = 1e-9;

/// One term `coefficient * exp(-rate * t)` of an impulse response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    pub coefficient: f64,
    pub rate: f64,
}

/// Unit impulse response of a linear compartmental system, written as a sum
/// of decaying exponentials. Rates are per second.
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    terms: Vec<Exponential>,
}

/// `1 - exp(-x)` without cancellation for small `x`.
fn one_minus_exp(x: f64) -> f64 {
    -(-x).exp_m1()
}

impl Disposition {
    pub fn terms(&self) -> &[Exponential] {
        &self.terms
    }

    /// Plasma response to a unit bolus into the central compartment.
    pub fn plasma(params: &ModelParameters) -> PKResult<Self> {
        let k10 = params.k10 / 60.0;
        let k12 = params.k12 / 60.0;
        let k13 = params.k13 / 60.0;
        let k21 = params.k21 / 60.0;
        let k31 = params.k31 / 60.0;

        let terms = match params.compartments {
            1 => one_compartment(k10, params.v1),
            2 => two_compartment(k10, k12, k21, params.v1)?,
            3 => three_compartment(k10, k12, k13, k21, k31, params.v1)?,
            n => return Err(PKError::InvalidModel(
                format!("Unsupported number of compartments: {}", n)
            )),
        };

        Ok(Self { terms })
    }

    /// Effect-site response obtained by passing this plasma response through
    /// a first-order lag with rate `ke0` (per second).
    pub fn effect_site(&self, ke0: f64) -> Self {
        let mut ke0 = ke0;
        if self.terms.iter().any(|term| (ke0 - term.rate).abs() <= COINCIDENT_RATES * ke0) {
            ke0 *= 1.0 + 1e-6;
        }

        let mut terms: Vec<Exponential> = self.terms.iter()
            .map(|term| Exponential {
                coefficient: term.coefficient * ke0 / (ke0 - term.rate),
                rate: term.rate,
            })
            .collect();
        let lag = -terms.iter().map(|term| term.coefficient).sum::<f64>();
        terms.push(Exponential { coefficient: lag, rate: ke0 });

        Self { terms }
    }

    pub fn impulse(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        self.terms.iter()
            .map(|term| term.coefficient * (-term.rate * t).exp())
            .sum()
    }

    /// Response at `t` to a unit rate infusion started at 0: the integral of
    /// the impulse response over `[0, t]`.
    pub fn step(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        self.terms.iter()
            .map(|term| term.coefficient / term.rate * one_minus_exp(term.rate * t))
            .sum()
    }

    /// Response `elapsed` seconds after the start of a unit rate infusion
    /// lasting `duration` seconds.
    pub fn infusion(&self, elapsed: f64, duration: f64) -> f64 {
        if elapsed <= 0.0 || duration <= 0.0 {
            return 0.0;
        }
        if elapsed <= duration {
            return self.step(elapsed);
        }
        self.terms.iter()
            .map(|term| {
                term.coefficient / term.rate
                    * one_minus_exp(term.rate * duration)
                    * (-term.rate * (elapsed - duration)).exp()
            })
            .sum()
    }

    /// Integral of the impulse response over `[t0, t1]`.
    pub fn integral(&self, t0: f64, t1: f64) -> f64 {
        self.step(t1) - self.step(t0)
    }
}

fn one_compartment(k10: f64, v1: f64) -> Vec<Exponential> {
    vec![Exponential { coefficient: 1.0 / v1, rate: k10 }]
}

fn two_compartment(k10: f64, k12: f64, k21: f64, v1: f64) -> PKResult<Vec<Exponential>> {
    let a = k10 + k12 + k21;
    let b = k10 * k21;

    let discriminant = a * a - 4.0 * b;
    if discriminant <= 0.0 {
        return Err(PKError::InvalidModel(
            "Two-compartment rate constants give coincident eigenvalues".to_string()
        ));
    }
    let sqrt_disc = discriminant.sqrt();
    let alpha = (a + sqrt_disc) / 2.0;
    let beta = (a - sqrt_disc) / 2.0;

    Ok(vec![
        Exponential { coefficient: (k21 - alpha) / (beta - alpha) / v1, rate: alpha },
        Exponential { coefficient: (k21 - beta) / (alpha - beta) / v1, rate: beta },
    ])
}

fn three_compartment(k10: f64, k12: f64, k13: f64, k21: f64, k31: f64, v1: f64) -> PKResult<Vec<Exponential>> {
    let a = k10 + k12 + k13 + k21 + k31;
    let b = k10 * k21 + k10 * k31 + k12 * k31 + k13 * k21 + k21 * k31;
    let c = k10 * k21 * k31;

    // Roots of l^3 - a l^2 + b l - c, via the depressed cubic x^3 + p x + q
    // with l = x + a / 3.
    let p = (3.0 * b - a * a) / 3.0;
    let q = -(2.0 * a.powi(3) - 9.0 * a * b + 27.0 * c) / 27.0;
    if p >= 0.0 {
        return Err(PKError::InvalidModel(
            "Three-compartment rate constants do not give three distinct eigenvalues".to_string()
        ));
    }

    let radius = 2.0 * (-p / 3.0).sqrt();
    let cosine = ((3.0 * q / (2.0 * p)) * (-3.0 / p).sqrt()).clamp(-1.0, 1.0);
    let phi = cosine.acos() / 3.0;
    let mut roots: Vec<f64> = (0..3)
        .map(|k| a / 3.0 + radius * (phi - 2.0 * PI * k as f64 / 3.0).cos())
        .collect();
    roots.sort_by(|x, y| y.total_cmp(x));

    let distinct = roots.windows(2).all(|pair| (pair[0] - pair[1]).abs() > COINCIDENT_RATES * pair[0]);
    if !distinct || roots[2] <= 0.0 {
        return Err(PKError::InvalidModel(
            "Three-compartment rate constants give coincident eigenvalues".to_string()
        ));
    }

    let terms = (0..3)
        .map(|i| {
            let l = roots[i];
            let (lj, lk) = (roots[(i + 1) % 3], roots[(i + 2) % 3]);
            Exponential {
                coefficient: (k21 - l) * (k31 - l) / ((lj - l) * (lk - l)) / v1,
                rate: l,
            }
        })
        .collect();

    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn marsh() -> ModelParameters {
        ModelParameters {
            compartments: 3,
            v1: 15.96,
            v2: 32.41,
            v3: 202.51,
            k10: 0.119,
            k12: 0.112,
            k13: 0.0419,
            k21: 0.055,
            k31: 0.0033,
            ke0: 0.26,
        }
    }

    #[test]
    fn test_one_compartment_bolus() {
        let params = ModelParameters { compartments: 1, v1: 10.0, k10: 0.2 * 60.0, ke0: 1.0, ..Default::default() };
        let disposition = Disposition::plasma(&params).unwrap();

        assert_relative_eq!(disposition.impulse(0.0) * 100.0, 10.0, epsilon = 1e-12);
        assert_relative_eq!(disposition.impulse(5.0) * 100.0, 10.0 * (-0.2 * 5.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_two_compartment_matches_hybrid_constants() {
        let params = ModelParameters {
            compartments: 2, v1: 10.0, k10: 0.2, k12: 0.1, k21: 0.05, ke0: 1.0, ..Default::default()
        };
        let disposition = Disposition::plasma(&params).unwrap();
        let terms = disposition.terms();

        let (k10, k12, k21) = (0.2 / 60.0, 0.1 / 60.0, 0.05 / 60.0);
        assert_relative_eq!(terms[0].rate * terms[1].rate, k10 * k21, max_relative = 1e-12);
        assert_relative_eq!(terms[0].rate + terms[1].rate, k10 + k12 + k21, max_relative = 1e-12);
        assert_relative_eq!(disposition.impulse(0.0), 0.1, max_relative = 1e-12);
    }

    #[test]
    fn test_three_compartment_roots_satisfy_invariants() {
        let params = marsh();
        let disposition = Disposition::plasma(&params).unwrap();
        let rates: Vec<f64> = disposition.terms().iter().map(|t| t.rate).collect();

        let (k10, k12, k13, k21, k31) = (0.119 / 60.0, 0.112 / 60.0, 0.0419 / 60.0, 0.055 / 60.0, 0.0033 / 60.0);
        assert_relative_eq!(rates.iter().sum::<f64>(), k10 + k12 + k13 + k21 + k31, max_relative = 1e-10);
        assert_relative_eq!(rates.iter().product::<f64>(), k10 * k21 * k31, max_relative = 1e-10);
        assert!(rates.windows(2).all(|pair| pair[0] > pair[1]));

        // Bolus concentration at time zero is dose / V1.
        assert_relative_eq!(disposition.impulse(0.0), 1.0 / 15.96, max_relative = 1e-10);
    }

    #[test]
    fn test_step_approaches_steady_state() {
        // Steady state under a unit rate is 1 / CL = 1 / (k10 * V1).
        let params = marsh();
        let disposition = Disposition::plasma(&params).unwrap();
        let steady_state = 1.0 / (0.119 / 60.0 * 15.96);

        assert_relative_eq!(disposition.step(1.0e8), steady_state, max_relative = 1e-8);
        assert!(disposition.step(600.0) < steady_state);
    }

    #[test]
    fn test_infusion_continuity_at_end() {
        let disposition = Disposition::plasma(&marsh()).unwrap();
        let during = disposition.infusion(60.0, 60.0);
        let after = disposition.infusion(60.0 + 1e-9, 60.0);
        assert_relative_eq!(during, after, max_relative = 1e-9);
        assert_relative_eq!(disposition.integral(0.0, 60.0), during, max_relative = 1e-12);
    }

    #[test]
    fn test_effect_site_starts_at_zero() {
        let plasma = Disposition::plasma(&marsh()).unwrap();
        let effect = plasma.effect_site(0.26 / 60.0);
        assert_relative_eq!(effect.impulse(0.0), 0.0, epsilon = 1e-12);
        assert!(effect.impulse(60.0) > 0.0);
        // Same steady state as plasma under a constant infusion.
        assert_relative_eq!(effect.step(1.0e8), plasma.step(1.0e8), max_relative = 1e-6);
    }

    #[test]
    fn test_effect_site_handles_coincident_ke0() {
        let params = ModelParameters { compartments: 1, v1: 10.0, k10: 0.5, ke0: 0.5, ..Default::default() };
        let plasma = Disposition::plasma(&params).unwrap();
        let effect = plasma.effect_site(0.5 / 60.0);

        // Limit of ke0 -> k10: (ke0 / V1) * t * exp(-k10 t).
        let k = 0.5 / 60.0;
        let expected = k / 10.0 * 120.0 * (-k * 120.0_f64).exp();
        assert_relative_eq!(effect.impulse(120.0), expected, max_relative = 1e-4);
    }
}
