use crate::dosing::InfusionSegment;
use crate::engine::{Engine, Site};
use crate::error::{PKError, PKResult};
use crate::solver::{self, SolverSettings};
use log::debug;

/// Decrement searches give up after a week.
const HORIZON: f64 = 7.0 * 24.0 * 60.0 * 60.0;
const FIRST_STEP: f64 = 60.0;
const SEARCH: SolverSettings = SolverSettings::new(1e-6, 200);

/// Whole seconds after `from` until the `site` concentration falls to
/// `level`, assuming no dosing after `from`. Segments extending past `from`
/// must already have been truncated.
pub fn time_to_reach(
    engine: &Engine,
    segments: &[InfusionSegment],
    from: f64,
    site: Site,
    level: f64,
) -> PKResult<f64> {
    let current = engine.concentration(site, segments, from);
    if !level.is_finite() || level <= 0.0 || level >= current {
        return Err(PKError::UnreachableTarget(format!(
            "{:?} concentration {:.4} at {} s never decays to {}",
            site, current, from, level
        )));
    }

    let residual = |elapsed: f64| -> PKResult<f64> {
        Ok(engine.concentration(site, segments, from + elapsed) - level)
    };
    let (lo, hi) = solver::expand_bracket(residual, 0.0, FIRST_STEP, HORIZON)?;
    let elapsed = solver::bisect(residual, lo, hi, SEARCH)?;
    debug!("{:?} decays from {:.4} to {} in {:.3} s", site, current, level, elapsed);

    Ok(round_up(elapsed))
}

/// Rounds up to whole seconds, ignoring bisection noise just above an
/// integer.
fn round_up(seconds: f64) -> f64 {
    (seconds - 1e-3).ceil().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{marsh, one_compartment};
    use super::*;
    use crate::dosing::truncate_at;

    #[test]
    fn test_one_compartment_half_life() {
        let k10 = 60.0 * std::f64::consts::LN_2 / 40.0;
        let engine = Engine::new(&one_compartment(k10)).unwrap();
        let segments = vec![InfusionSegment::new(0.0, 1.0, 10.0)];

        let time = time_to_reach(&engine, &segments, 10.0, Site::Plasma, engine.plasma_at(&segments, 10.0) / 4.0).unwrap();
        assert_eq!(time, 80.0);
    }

    #[test]
    fn test_level_at_or_above_current_is_unreachable() {
        let engine = Engine::new(&marsh()).unwrap();
        let segments = vec![InfusionSegment::new(0.0, 1.0, 60.0)];
        let current = engine.plasma_at(&segments, 60.0);

        for level in [current, current * 2.0, 0.0, -1.0] {
            let result = time_to_reach(&engine, &segments, 60.0, Site::Plasma, level);
            assert!(matches!(result, Err(PKError::UnreachableTarget(_))));
        }
    }

    #[test]
    fn test_ignores_dosing_after_start() {
        let engine = Engine::new(&marsh()).unwrap();
        let mut segments = vec![InfusionSegment::new(0.0, 0.5, 1200.0)];
        truncate_at(&mut segments, 600.0);
        let level = engine.plasma_at(&segments, 600.0) / 2.0;

        let time = time_to_reach(&engine, &segments, 600.0, Site::Plasma, level).unwrap();
        assert!(engine.plasma_at(&segments, 600.0 + time) <= level * (1.0 + 1e-5));
        assert!(engine.plasma_at(&segments, 600.0 + time - 1.0) > level);
    }

    #[test]
    fn test_effect_decrement_longer_than_plasma() {
        let engine = Engine::new(&marsh()).unwrap();
        let segments = vec![InfusionSegment::new(0.0, 0.5, 1800.0)];
        let level = engine.effect_at(&segments, 1800.0) * 0.8;

        let plasma = time_to_reach(&engine, &segments, 1800.0, Site::Plasma, level).unwrap();
        let effect = time_to_reach(&engine, &segments, 1800.0, Site::Effect, level).unwrap();
        assert!(effect > plasma);
    }

    #[test]
    fn test_beyond_horizon_diverges() {
        let params = crate::models::ModelParameters { compartments: 1, v1: 10.0, k10: 1e-6, ke0: 0.5, ..Default::default() };
        let patient = crate::models::Patient::new(crate::models::Sex::Male, 40.0, 70.0, 170.0).unwrap();
        let model = crate::models::DrugModel::new("slow", patient, params, Default::default()).unwrap();
        let engine = Engine::new(&model).unwrap();
        let segments = vec![InfusionSegment::new(0.0, 1.0, 10.0)];

        let result = time_to_reach(&engine, &segments, 10.0, Site::Plasma, 0.01);
        assert!(matches!(result, Err(PKError::SolverDivergence(_))));
    }
}
