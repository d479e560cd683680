//! Loading doses for increasing targets and offsetting doses for decreasing
//! ones. Each routine appends to the working segment list and returns the
//! time at which dosing for the target settles.

use super::{decrement, Pump, Target};
use crate::dosing::InfusionSegment;
use crate::engine::Site;
use crate::error::{PKError, PKResult};
use crate::solver::{self, SolverSettings};
use log::{debug, warn};

/// Longest a plasma loading phase is stretched to respect the rate limit.
const MAX_LOADING_DURATION: f64 = 100.0;
const MAX_EFFECT_ATTEMPTS: usize = 3;
const MULTIPLIER_SEEDS: (f64, f64) = (1.0, 10.0);
/// Upper bound on the plasma hold of the revised effect-site method.
const MAX_HOLD: f64 = 6.0 * 60.0 * 60.0;

const PEAK_SEARCH: SolverSettings = SolverSettings::new(1e-6, 200);
const MULTIPLIER_SEARCH: SolverSettings = SolverSettings::new(1e-8, 50);
const HOLD_SEARCH: SolverSettings = SolverSettings::new(1e-3, 100);

/// Effect-site dosing for one target, not yet committed to the schedule.
#[derive(Debug, Clone)]
struct EffectPlan {
    segments: Vec<InfusionSegment>,
    /// Time the effect-site peak is reached.
    target_time: f64,
}

impl EffectPlan {
    fn dosing_end(&self, start: f64) -> f64 {
        self.segments.iter().map(InfusionSegment::end).fold(start, f64::max)
    }
}

fn extended(history: &[InfusionSegment], plan: &[InfusionSegment]) -> Vec<InfusionSegment> {
    let mut segments = history.to_vec();
    segments.extend_from_slice(plan);
    segments
}

impl Pump {
    pub(super) fn plasma_increase(&self, work: &mut Vec<InfusionSegment>, target: &Target) -> PKResult<f64> {
        let max_dose_rate = self.settings.max_dose_rate();
        let mut duration = target.duration;

        let dose = loop {
            let residual = self.engine.plasma_at(work, target.start + duration);
            let dose = ((target.level - residual) / self.engine.integral_of_decline(0.0, duration)).max(0.0);

            match max_dose_rate {
                Some(max) if duration > self.settings.bolus_time && dose > max => {
                    if duration >= MAX_LOADING_DURATION {
                        warn!(
                            "Plasma target {} at {} s needs more than the pump limit over {} s; delivering at the limit",
                            target.level, target.start, duration
                        );
                        break max;
                    }
                    duration += 1.0;
                }
                _ => break dose,
            }
        };

        if duration > target.duration {
            debug!("Loading phase at {} s extended to {} s", target.start, duration);
        }
        work.push(InfusionSegment::new(target.start, dose, duration));
        Ok(target.start + duration)
    }

    /// Effect-site increase. Tries the configured method, then falls back to
    /// a bolus stretched over the whole requested duration when the peak
    /// would come early.
    pub(super) fn effect_increase(&self, work: &mut Vec<InfusionSegment>, target: &Target) -> PKResult<f64> {
        let requested = target.start + target.duration;
        let mut bolus_only = target.bolus_only;
        let mut ramp = target.cp_limit_duration;
        let mut best: Option<EffectPlan> = None;

        for _ in 0..MAX_EFFECT_ATTEMPTS {
            let plan = if bolus_only {
                self.bolus_only_plan(work, target, ramp)?
            } else {
                self.revised_plan(work, target, ramp)?
            };

            if plan.target_time >= requested {
                best = Some(plan);
                break;
            }
            // Every attempt so far peaks early; keep the latest peak.
            let closer = best.as_ref().map_or(true, |kept| plan.target_time > kept.target_time);
            if closer {
                best = Some(plan);
            }
            if bolus_only && ramp == target.duration {
                warn!("Effect target {} peaks before {} s even as a bolus over {} s", target.level, requested, target.duration);
                break;
            }

            debug!("Effect target {} peaks before {} s; retrying as a bolus over {} s", target.level, requested, target.duration);
            bolus_only = true;
            ramp = target.duration;
        }

        let plan = best.ok_or_else(|| PKError::SolverDivergence(
            format!("no effect-site plan for target {} at {} s", target.level, target.start)
        ))?;
        let plan = self.limit_plan(work, target, plan)?;

        let target_time = plan.target_time.ceil();
        let dosing_end = plan.dosing_end(target.start);
        work.extend(plan.segments);
        if target_time > dosing_end {
            work.push(InfusionSegment::zero(dosing_end, target_time - dosing_end));
        }
        Ok(target_time.max(dosing_end))
    }

    /// Segment that brings plasma to `level` at `start + duration`.
    fn ramp(&self, history: &[InfusionSegment], start: f64, level: f64, duration: f64) -> InfusionSegment {
        let residual = self.engine.plasma_at(history, start + duration);
        let dose = (level - residual) / self.engine.integral_of_decline(0.0, duration);
        InfusionSegment::new(start, dose, duration)
    }

    fn peak_of(&self, history: &[InfusionSegment], plan: Vec<InfusionSegment>, from: f64) -> PKResult<EffectPlan> {
        let target_time = self.engine.effect_peak_time(&extended(history, &plan), from, PEAK_SEARCH)?;
        Ok(EffectPlan { segments: plan, target_time })
    }

    fn peak_effect(&self, history: &[InfusionSegment], plan: &EffectPlan) -> f64 {
        self.engine.effect_at(&extended(history, &plan.segments), plan.target_time)
    }

    /// Plasma ramps to `m * level` over `ramp` seconds and then decays; `m`
    /// is chosen so that the effect-site peak equals the level.
    fn bolus_only_plan(&self, history: &[InfusionSegment], target: &Target, ramp: f64) -> PKResult<EffectPlan> {
        let plan_for = |multiplier: f64| -> PKResult<EffectPlan> {
            let segment = self.ramp(history, target.start, multiplier * target.level, ramp);
            self.peak_of(history, vec![segment], target.start + ramp)
        };
        let residual = |multiplier: f64| -> PKResult<f64> {
            Ok(self.peak_effect(history, &plan_for(multiplier)?) - target.level)
        };

        let multiplier = solver::secant(residual, MULTIPLIER_SEEDS.0, MULTIPLIER_SEEDS.1, MULTIPLIER_SEARCH)?;
        debug!("Effect target {} at {} s: plasma multiplier {:.4}", target.level, target.start, multiplier);

        self.without_negative_doses(history, plan_for(multiplier)?, target.start + ramp)
    }

    /// A pump cannot withdraw drug: negative doses become pauses and the
    /// peak is searched again from `from`.
    fn without_negative_doses(&self, history: &[InfusionSegment], plan: EffectPlan, from: f64) -> PKResult<EffectPlan> {
        if plan.segments.iter().all(|segment| segment.dose_per_second >= 0.0) {
            return Ok(plan);
        }
        let segments = plan.segments.iter()
            .map(|segment| InfusionSegment { dose_per_second: segment.dose_per_second.max(0.0), ..*segment })
            .collect();
        self.peak_of(history, segments, from)
    }

    /// Plasma ramps to `cp_limit * level`, is held there for a solved time
    /// and then allowed to decay while the effect site rises to the level.
    fn revised_plan(&self, history: &[InfusionSegment], target: &Target, ramp: f64) -> PKResult<EffectPlan> {
        if target.cp_limit <= 1.0 {
            warn!("cp limit {} cannot raise the effect site above plasma; using a single bolus", target.cp_limit);
            return self.bolus_only_plan(history, target, ramp);
        }

        let ceiling = target.cp_limit * target.level;
        let loading = self.ramp(history, target.start, ceiling, ramp);
        if loading.dose_per_second < 0.0 {
            debug!("Plasma already above {} at {} s; using a single bolus", ceiling, target.start);
            return self.bolus_only_plan(history, target, ramp);
        }
        let plan_for = |hold: f64| -> PKResult<EffectPlan> {
            let mut segments = vec![loading];
            if hold > 0.0 {
                let held = self.ramp(&extended(history, &segments), loading.end(), ceiling, hold);
                segments.push(held);
            }
            self.peak_of(history, segments, loading.end() + hold.max(0.0))
        };
        let residual = |hold: f64| -> PKResult<f64> {
            Ok(self.peak_effect(history, &plan_for(hold)?) - target.level)
        };

        if residual(0.0)? >= 0.0 {
            debug!("Loading to {} already overshoots effect target {}; using a single bolus", ceiling, target.level);
            return self.bolus_only_plan(history, target, ramp);
        }

        let (lo, hi) = solver::expand_bracket(residual, 0.0, 30.0, MAX_HOLD)?;
        let hold = solver::bisect(residual, lo, hi, HOLD_SEARCH)?;
        debug!("Effect target {} at {} s: plasma held at {} for {:.1} s", target.level, target.start, ceiling, hold);
        let plan = plan_for(hold)?;
        let from = plan.dosing_end(target.start);
        self.without_negative_doses(history, plan, from)
    }

    /// Applies the device limit to a chosen plan and, if anything was
    /// limited, recomputes when the effect-site peak occurs.
    fn limit_plan(&self, history: &[InfusionSegment], target: &Target, plan: EffectPlan) -> PKResult<EffectPlan> {
        let limited: Vec<InfusionSegment> = plan.segments.iter()
            .map(|segment| InfusionSegment {
                dose_per_second: self.limit_rate(segment.dose_per_second, segment.duration),
                ..*segment
            })
            .collect();

        if limited == plan.segments {
            return Ok(plan);
        }
        let from = plan.dosing_end(target.start);
        self.peak_of(history, limited, from)
    }

    /// Decreasing target: waits for natural decline, or offsets it with a
    /// constant dose when decline alone is faster than requested.
    pub(super) fn decrease(&self, work: &mut Vec<InfusionSegment>, target: &Target, site: Site) -> PKResult<f64> {
        let current = self.engine.concentration(site, work, target.start);
        let natural = if current <= target.level {
            0.0
        } else {
            decrement::time_to_reach(&self.engine, work, target.start, site, target.level)?
        };

        if natural > target.duration {
            debug!("Target {} at {} s: natural decline takes {} s", target.level, target.start, natural);
            work.push(InfusionSegment::zero(target.start, natural));
            return Ok(target.start + natural);
        }

        let projected = self.engine.concentration(site, work, target.start + target.duration);
        let dose = ((target.level - projected) / self.engine.unit_response(site, target.duration)).max(0.0);
        let dose = self.limit_rate(dose, target.duration);
        work.push(InfusionSegment::new(target.start, dose, target.duration));
        Ok(target.start + target.duration)
    }
}
