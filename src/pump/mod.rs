//! Target-controlled infusion scheduling.
//!
//! A [`Pump`] owns an ordered list of concentration targets and turns them
//! into a schedule of constant-rate segments: a loading phase per target
//! (see [`dose`]), natural decline for decreases, and maintenance infusions
//! until the next target starts.

pub mod decrement;
pub mod dose;
pub mod maintenance;
pub mod target;

use crate::dosing::{truncate_at, InfusionSegment, Schedule};
use crate::engine::{ConcentrationSample, Engine, Site};
use crate::error::{require_non_negative, require_positive, PKError, PKResult};
use crate::models::DrugModel;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub use target::{Target, TargetLevel, TargetOptions, TargetOutcome};

/// Device and scheduling settings. Times in seconds, rates in ml/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PumpSettings {
    /// Dose units per ml of the drug in the syringe.
    pub drug_concentration: f64,
    pub end_time: f64,
    /// Plasma ceiling for effect-site targeting, as a multiple of the target.
    pub cp_limit: f64,
    pub cp_limit_duration: f64,
    pub maintenance_duration: f64,
    /// Growth factor applied to each successive maintenance window; at
    /// least 1.
    pub maintenance_multiplier: f64,
    /// `None` disables the rate limit.
    pub max_infusion_rate: Option<f64>,
    /// Segments at or under this length are boluses and exempt from the
    /// rate limit.
    pub bolus_time: f64,
}

impl PumpSettings {
    pub fn new(drug_concentration: f64, end_time: f64) -> PKResult<Self> {
        let settings = Self {
            drug_concentration,
            end_time,
            cp_limit: 1.2,
            cp_limit_duration: 10.0,
            maintenance_duration: 300.0,
            maintenance_multiplier: 2.0,
            max_infusion_rate: Some(1200.0),
            bolus_time: 20.0,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> PKResult<()> {
        require_positive("drug concentration", self.drug_concentration)?;
        require_positive("end time", self.end_time)?;
        require_positive("cp limit", self.cp_limit)?;
        require_positive("cp limit duration", self.cp_limit_duration)?;
        require_positive("maintenance infusion duration", self.maintenance_duration)?;
        require_positive("maintenance infusion multiplier", self.maintenance_multiplier)?;
        if self.maintenance_multiplier < 1.0 {
            return Err(PKError::InvalidParameter(format!(
                "maintenance infusion multiplier must be at least 1 (got {})",
                self.maintenance_multiplier
            )));
        }
        require_positive("bolus time", self.bolus_time)?;
        if let Some(rate) = self.max_infusion_rate {
            require_positive("max infusion rate", rate)?;
        }
        Ok(())
    }

    /// Device limit expressed as dose per second.
    pub fn max_dose_rate(&self) -> Option<f64> {
        self.max_infusion_rate.map(|rate| rate * self.drug_concentration / 3600.0)
    }
}

/// Time unit for infusion rows of [`Pump::dose_by_weight`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseInterval {
    #[default]
    Minute,
    Hour,
}

impl DoseInterval {
    pub fn seconds(&self) -> f64 {
        match self {
            DoseInterval::Minute => 60.0,
            DoseInterval::Hour => 3600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateChange {
    pub time: f64,
    pub ml_per_hour: f64,
}

/// Boluses are reported as dose/weight, infusions as dose/weight/interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoseWeight {
    pub time: f64,
    pub dose_per_weight: f64,
    pub bolus: bool,
}

#[derive(Debug, Clone)]
pub struct Pump {
    model: DrugModel,
    engine: Engine,
    settings: PumpSettings,
    targets: Vec<Target>,
    user_infusions: Vec<InfusionSegment>,
    schedule: Schedule,
    outcomes: Vec<TargetOutcome>,
}

impl Pump {
    pub fn new(model: DrugModel, settings: PumpSettings) -> PKResult<Self> {
        settings.validate()?;
        let engine = Engine::new(&model)?;
        Ok(Self {
            model,
            engine,
            settings,
            targets: Vec::new(),
            user_infusions: Vec::new(),
            schedule: Schedule::default(),
            outcomes: Vec::new(),
        })
    }

    pub fn model(&self) -> &DrugModel {
        &self.model
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn settings(&self) -> &PumpSettings {
        &self.settings
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// The schedule from the last successful [`Pump::generate`].
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn outcomes(&self) -> &[TargetOutcome] {
        &self.outcomes
    }

    pub fn add_target(
        &mut self,
        start: f64,
        level: f64,
        duration: f64,
        site: Site,
        options: TargetOptions,
    ) -> PKResult<()> {
        require_non_negative("target start", start)?;
        if start >= self.settings.end_time {
            return Err(PKError::InvalidParameter(
                format!("target start {} s is not before the end time of {} s", start, self.settings.end_time)
            ));
        }

        let target = Target {
            start,
            level: require_positive("target level", level)?,
            duration: require_positive("target duration", duration)?,
            end: self.settings.end_time,
            site,
            cp_limit: require_positive("cp limit", options.cp_limit.unwrap_or(self.settings.cp_limit))?,
            cp_limit_duration: require_positive(
                "cp limit duration",
                options.cp_limit_duration.unwrap_or(self.settings.cp_limit_duration),
            )?,
            bolus_only: options.bolus_only,
            maintain: options.maintain,
        };

        target::insert(&mut self.targets, target, self.settings.end_time)?;
        debug!("Added {:?} target of {} at {} s", site, level, start);
        Ok(())
    }

    /// Adds a user infusion. It bypasses the solvers, is delivered on top of
    /// the generated schedule and is left out of [`Pump::rates_by_time`].
    pub fn add_infusion(&mut self, start: f64, dose_per_second: f64, duration: f64) -> PKResult<()> {
        self.user_infusions.push(InfusionSegment::checked(start, dose_per_second, duration)?);
        Ok(())
    }

    /// Rebuilds the schedule from the targets. On error the previous schedule
    /// is kept.
    pub fn generate(&mut self) -> PKResult<&Schedule> {
        info!("Generating infusions for {} targets", self.targets.len());
        let mut work: Vec<InfusionSegment> = Vec::new();
        let mut outcomes = Vec::with_capacity(self.targets.len());

        if let Some(first) = self.targets.first() {
            if first.start > 0.0 {
                work.push(InfusionSegment::zero(0.0, first.start));
            }
        }

        for (n, target) in self.targets.iter().enumerate() {
            truncate_at(&mut work, target.start);
            let fill_until = self.targets.get(n + 1).map_or(self.settings.end_time, |next| next.start);
            let increasing = n == 0 || target.level > self.targets[n - 1].level;

            let reached = match (increasing, target.site) {
                (true, Site::Plasma) => self.plasma_increase(&mut work, target)?,
                (true, Site::Effect) => self.effect_increase(&mut work, target)?,
                (false, site) => self.decrease(&mut work, target, site)?,
            };
            debug!("Target {} at {} s settles at {} s", target.level, target.start, reached);

            if reached < fill_until {
                if target.maintain {
                    self.maintain(&mut work, reached, fill_until, target.level)?;
                } else {
                    work.push(InfusionSegment::zero(reached, fill_until - reached));
                }
            }

            outcomes.push(TargetOutcome { start: target.start, level: target.level, site: target.site, reached });
        }
        truncate_at(&mut work, self.settings.end_time);

        self.schedule = Schedule::new(work, &self.user_infusions);
        self.outcomes = outcomes;
        info!(
            "Generated {} segments ({} user)",
            self.schedule.segments().len(),
            self.schedule.user().len()
        );
        Ok(&self.schedule)
    }

    /// Generates the schedule and returns plasma and effect-site
    /// concentrations for every second from 0 to the end time. A fractional
    /// end time gets a closing sample of its own.
    pub fn run(&mut self) -> PKResult<Vec<ConcentrationSample>> {
        self.generate()?;

        let segments = self.schedule.segments();
        let end = self.settings.end_time.floor();
        let plasma = self.engine.plasma_series(segments, end as usize);
        let effect = self.engine.effect_series(&plasma);

        let mut samples: Vec<ConcentrationSample> = plasma.iter()
            .zip(effect.iter())
            .enumerate()
            .map(|(t, (&plasma, &effect))| ConcentrationSample { time: t as f64, plasma, effect })
            .collect();

        let partial = self.settings.end_time - end;
        if let Some(last) = samples.last().copied().filter(|_| partial > 0.0) {
            let plasma = self.engine.plasma_at(segments, self.settings.end_time);
            let effect = self.engine.effect_step(last.effect, last.plasma, plasma, partial);
            samples.push(ConcentrationSample { time: self.settings.end_time, plasma, effect });
        }
        Ok(samples)
    }

    /// Concentrations at `time` under the current schedule.
    pub fn concentration_at(&self, time: f64) -> PKResult<ConcentrationSample> {
        require_non_negative("time", time)?;
        let segments = self.schedule.segments();
        let whole = time.floor();

        let plasma = self.engine.plasma_series(segments, whole as usize);
        let mut effect = self.engine.effect_series(&plasma).last().copied().unwrap_or(0.0);

        let partial = time - whole;
        if partial > 0.0 {
            let cp0 = plasma.last().copied().unwrap_or(0.0);
            let cp1 = self.engine.plasma_at(segments, time);
            effect = self.engine.effect_step(effect, cp0, cp1, partial);
        }

        Ok(ConcentrationSample { time, plasma: self.engine.plasma_at(segments, time), effect })
    }

    /// Seconds from `from` until the `site` concentration decays to `level`
    /// if all dosing stops at `from`.
    pub fn decrement_time(&self, from: f64, site: Site, level: f64) -> PKResult<f64> {
        require_non_negative("decrement start", from)?;
        let segments = self.schedule.truncated_at(from);
        decrement::time_to_reach(&self.engine, &segments, from, site, level)
    }

    /// Device view of the generated segments in ml/h. User infusions are not
    /// included. The last rate is repeated at the end time.
    pub fn rates_by_time(&self) -> Vec<RateChange> {
        let generated = self.schedule.generated();
        let mut rates: Vec<RateChange> = generated.iter()
            .map(|segment| RateChange {
                time: segment.start,
                ml_per_hour: segment.rate_ml_per_hour(self.settings.drug_concentration),
            })
            .collect();

        if let Some(last) = rates.last().copied() {
            rates.push(RateChange { time: self.settings.end_time, ..last });
        }
        rates
    }

    /// Generated segments per kg of body weight. User infusions are not
    /// included.
    pub fn dose_by_weight(&self, interval: DoseInterval) -> Vec<DoseWeight> {
        let weight = self.model.weight();
        let mut rows: Vec<DoseWeight> = self.schedule.generated().iter()
            .map(|segment| {
                let bolus = segment.duration <= self.settings.bolus_time
                    && segment.duration < self.settings.maintenance_duration;
                let dose_per_weight = if bolus {
                    segment.total_dose() / weight
                } else {
                    segment.dose_per_second / weight * interval.seconds()
                };
                DoseWeight { time: segment.start, dose_per_weight, bolus }
            })
            .collect();

        if let Some(last) = rows.last().copied() {
            rows.push(DoseWeight { time: self.settings.end_time, ..last });
        }
        rows
    }

    pub fn targets_by_time(&self) -> Vec<TargetLevel> {
        let mut levels: Vec<TargetLevel> = self.targets.iter()
            .map(|target| TargetLevel { time: target.start, level: target.level })
            .collect();

        if let Some(last) = levels.last().copied() {
            levels.push(TargetLevel { time: self.settings.end_time, ..last });
        }
        levels
    }

    /// Clamps a dose rate to the device limit unless the segment is a bolus.
    fn limit_rate(&self, dose_per_second: f64, duration: f64) -> f64 {
        match self.settings.max_dose_rate() {
            Some(max) if duration > self.settings.bolus_time && dose_per_second > max => {
                warn!(
                    "Dose rate {:.4}/s over {} s exceeds the pump limit; limited to {:.4}/s",
                    dose_per_second, duration, max
                );
                max
            }
            _ => dose_per_second,
        }
    }
}
