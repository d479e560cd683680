//! Closed-form concentration engine.
//!
//! Every evaluation is a sum over the dosing history of each segment's
//! multi-exponential response, so accuracy does not degrade with the length
//! of the horizon.

pub mod disposition;

use crate::dosing::InfusionSegment;
use crate::error::{PKError, PKResult};
use crate::models::DrugModel;
use crate::solver::{self, SolverSettings};
use serde::{Deserialize, Serialize};

pub use disposition::{Disposition, Exponential};

/// Where a concentration is read or targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[default]
    Plasma,
    Effect,
}

/// Plasma and effect-site concentration at one second of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationSample {
    pub time: f64,
    pub plasma: f64,
    pub effect: f64,
}

/// Search horizon when locating the effect-site peak after a bolus.
const PEAK_HORIZON: f64 = 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone)]
pub struct Engine {
    plasma: Disposition,
    effect: Disposition,
    ke0: f64,
}

impl Engine {
    pub fn new(model: &DrugModel) -> PKResult<Self> {
        let plasma = Disposition::plasma(&model.parameters)?;
        let ke0 = model.parameters.ke0 / 60.0;
        let effect = plasma.effect_site(ke0);
        Ok(Self { plasma, effect, ke0 })
    }

    /// Effect-site rate constant per second.
    pub fn ke0(&self) -> f64 {
        self.ke0
    }

    pub fn disposition(&self, site: Site) -> &Disposition {
        match site {
            Site::Plasma => &self.plasma,
            Site::Effect => &self.effect,
        }
    }

    pub fn concentration(&self, site: Site, segments: &[InfusionSegment], time: f64) -> f64 {
        let disposition = self.disposition(site);
        let concentration: f64 = segments.iter()
            .filter(|segment| segment.start < time && segment.dose_per_second != 0.0)
            .map(|segment| {
                segment.dose_per_second * disposition.infusion(time - segment.start, segment.duration)
            })
            .sum();

        concentration.max(0.0)
    }

    pub fn plasma_at(&self, segments: &[InfusionSegment], time: f64) -> f64 {
        self.concentration(Site::Plasma, segments, time)
    }

    /// Closed-form effect-site concentration; used by the solvers.
    pub fn effect_at(&self, segments: &[InfusionSegment], time: f64) -> f64 {
        self.concentration(Site::Effect, segments, time)
    }

    /// Plasma concentration at each whole second of `[0, end]`.
    pub fn plasma_series(&self, segments: &[InfusionSegment], end: usize) -> Vec<f64> {
        (0..=end).map(|t| self.plasma_at(segments, t as f64)).collect()
    }

    /// Integrates `dCe/dt = ke0 (Cp - Ce)` over a plasma series sampled once
    /// per second, starting from `Ce(0) = 0`.
    pub fn effect_series(&self, plasma: &[f64]) -> Vec<f64> {
        let mut effect = Vec::with_capacity(plasma.len());
        let mut ce = 0.0;
        for (n, &cp) in plasma.iter().enumerate() {
            if n > 0 {
                ce = self.effect_step(ce, plasma[n - 1], cp, 1.0);
            }
            effect.push(ce);
        }
        effect
    }

    /// Exact update over a step of `h` seconds with plasma varying linearly
    /// from `cp0` to `cp1`. The result is a non-negative combination of the
    /// inputs, so it never goes below zero.
    pub fn effect_step(&self, ce: f64, cp0: f64, cp1: f64, h: f64) -> f64 {
        let x = self.ke0 * h;
        let decay = (-x).exp();
        let gain = -(-x).exp_m1();
        let slope_weight = 1.0 - gain / x;
        (ce * decay + cp0 * (gain - slope_weight) + cp1 * slope_weight).max(0.0)
    }

    /// Integral over `[t0, t1]` of the plasma impulse response; equivalently
    /// the plasma concentration produced by a unit dose rate over `t1` seconds
    /// when `t0 = 0`.
    pub fn integral_of_decline(&self, t0: f64, t1: f64) -> f64 {
        self.plasma.integral(t0, t1)
    }

    /// Concentration at `site` after `duration` seconds of a unit dose rate.
    pub fn unit_response(&self, site: Site, duration: f64) -> f64 {
        self.disposition(site).step(duration)
    }

    /// Time of the effect-site maximum at or after `from`, assuming the
    /// segments contain no dosing after `from`.
    pub fn effect_peak_time(&self, segments: &[InfusionSegment], from: f64, settings: SolverSettings) -> PKResult<f64> {
        let gradient = |t: f64| -> PKResult<f64> { Ok(self.plasma_at(segments, t) - self.effect_at(segments, t)) };
        if gradient(from)? <= 0.0 {
            return Ok(from);
        }
        let (lo, hi) = solver::expand_bracket(gradient, from, 30.0, from + PEAK_HORIZON)?;
        solver::bisect(gradient, lo, hi, settings)
    }
}

/// Solves the ke0 (per minute) for which the effect-site concentration after
/// an instantaneous bolus peaks `tpeak` seconds later.
pub fn ke0_from_tpeak(model: &DrugModel, tpeak: f64) -> PKResult<f64> {
    if !tpeak.is_finite() || tpeak <= 0.0 {
        return Err(PKError::InvalidParameter(
            format!("time to peak effect must be greater than 0 (got {})", tpeak)
        ));
    }
    let settings = SolverSettings::new(1e-9, 200);

    // Peak time falls as ke0 rises.
    let residual = |ke0: f64| -> PKResult<f64> {
        let engine = Engine::new(&model.with_ke0(ke0)?)?;
        let bolus_gradient = |t: f64| -> PKResult<f64> { Ok(engine.plasma.impulse(t) - engine.effect.impulse(t)) };
        let (lo, hi) = solver::expand_bracket(bolus_gradient, 1e-3, 1.0, PEAK_HORIZON)?;
        let peak = solver::bisect(bolus_gradient, lo, hi, SolverSettings::new(1e-6, 200))?;
        Ok(peak - tpeak)
    };

    solver::bisect(residual, 0.01, 100.0, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{propofol, ModelParameters, Patient, Sex, ValidityBounds};
    use approx::assert_relative_eq;

    fn one_compartment_model() -> DrugModel {
        let patient = Patient::new(Sex::Male, 40.0, 70.0, 170.0).unwrap();
        let params = ModelParameters { compartments: 1, v1: 10.0, k10: 0.1, ke0: 0.5, ..Default::default() };
        DrugModel::new("test", patient, params, ValidityBounds::default()).unwrap()
    }

    fn marsh_engine() -> Engine {
        let patient = Patient::new(Sex::Male, 30.0, 70.0, 170.0).unwrap();
        Engine::new(&propofol::marsh_diprifusor(patient).unwrap()).unwrap()
    }

    #[test]
    fn test_zero_before_first_segment() {
        let engine = marsh_engine();
        let segments = vec![InfusionSegment::new(30.0, 1.0, 10.0)];
        assert_eq!(engine.plasma_at(&segments, 0.0), 0.0);
        assert_eq!(engine.plasma_at(&segments, 30.0), 0.0);
        assert!(engine.plasma_at(&segments, 31.0) > 0.0);
    }

    #[test]
    fn test_one_compartment_infusion_closed_form() {
        let engine = Engine::new(&one_compartment_model()).unwrap();
        let k = 0.1 / 60.0;
        let segments = vec![InfusionSegment::new(0.0, 2.0, 60.0)];

        let during = 2.0 / (k * 10.0) * (1.0 - (-k * 30.0_f64).exp());
        assert_relative_eq!(engine.plasma_at(&segments, 30.0), during, max_relative = 1e-12);

        let at_end = 2.0 / (k * 10.0) * (1.0 - (-k * 60.0_f64).exp());
        let after = at_end * (-k * 40.0_f64).exp();
        assert_relative_eq!(engine.plasma_at(&segments, 100.0), after, max_relative = 1e-12);
    }

    #[test]
    fn test_segments_superpose() {
        let engine = marsh_engine();
        let first = InfusionSegment::new(0.0, 1.0, 20.0);
        let second = InfusionSegment::new(10.0, 0.5, 200.0);
        let both = engine.plasma_at(&[first, second], 150.0);
        let separate = engine.plasma_at(&[first], 150.0) + engine.plasma_at(&[second], 150.0);
        assert_relative_eq!(both, separate, max_relative = 1e-12);
    }

    #[test]
    fn test_decline_after_dosing_stops() {
        let engine = marsh_engine();
        let segments = vec![InfusionSegment::new(0.0, 1.0, 600.0)];
        let plasma = engine.plasma_series(&segments, 7200);
        let effect = engine.effect_series(&plasma);

        // Effect keeps rising briefly after the infusion stops; once it has
        // peaked both curves only fall.
        let peak = engine.effect_peak_time(&segments, 600.0, SolverSettings::default()).unwrap().ceil() as usize;
        for t in 601..7200 {
            assert!(plasma[t + 1] <= plasma[t]);
        }
        for t in (peak + 30)..7200 {
            assert!(effect[t + 1] <= effect[t] + 1e-12);
            assert!(effect[t] >= 0.0);
        }
    }

    #[test]
    fn test_effect_series_matches_closed_form() {
        let engine = marsh_engine();
        let segments = vec![InfusionSegment::new(0.0, 2.0, 10.0), InfusionSegment::new(10.0, 0.1, 590.0)];
        let plasma = engine.plasma_series(&segments, 900);
        let effect = engine.effect_series(&plasma);

        for t in [60usize, 300, 600, 900] {
            assert_relative_eq!(effect[t], engine.effect_at(&segments, t as f64), max_relative = 2e-3);
        }
    }

    #[test]
    fn test_effect_converges_to_constant_plasma() {
        let engine = Engine::new(&one_compartment_model()).unwrap();
        let plasma = vec![3.0; 3600];
        let effect = engine.effect_series(&plasma);
        assert_eq!(effect[0], 0.0);
        assert!(effect.windows(2).all(|w| w[1] >= w[0]));
        assert_relative_eq!(effect[3599], 3.0, max_relative = 1e-6);
    }

    #[test]
    fn test_integral_of_decline_inverts_plasma_delta() {
        let engine = Engine::new(&one_compartment_model()).unwrap();
        let dose = 4.0 / engine.integral_of_decline(0.0, 60.0);
        let segments = vec![InfusionSegment::new(0.0, dose, 60.0)];
        assert_relative_eq!(engine.plasma_at(&segments, 60.0), 4.0, max_relative = 1e-12);
        assert_relative_eq!(engine.unit_response(Site::Plasma, 60.0), engine.integral_of_decline(0.0, 60.0));
    }

    #[test]
    fn test_ke0_from_tpeak_recovers_model_ke0() {
        let patient = Patient::new(Sex::Male, 30.0, 70.0, 170.0).unwrap();
        let model = propofol::marsh_diprifusor(patient).unwrap();
        let engine = Engine::new(&model).unwrap();

        let bolus = |t: f64| -> PKResult<f64> { Ok(engine.plasma.impulse(t) - engine.effect.impulse(t)) };
        let (lo, hi) = solver::expand_bracket(bolus, 1e-3, 1.0, PEAK_HORIZON).unwrap();
        let tpeak = solver::bisect(bolus, lo, hi, SolverSettings::new(1e-9, 200)).unwrap();

        let ke0 = ke0_from_tpeak(&model, tpeak).unwrap();
        assert_relative_eq!(ke0, 0.26, max_relative = 1e-4);
        assert!(ke0_from_tpeak(&model, -1.0).is_err());
    }
}
