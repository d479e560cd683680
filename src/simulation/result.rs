use crate::dosing::InfusionSegment;
use crate::engine::ConcentrationSample;
use crate::pump::{DoseInterval, DoseWeight, Pump, RateChange, TargetLevel, TargetOutcome};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfusionSource {
    Target,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfusionRecord {
    pub segment: InfusionSegment,
    pub source: InfusionSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub model: String,
    pub concentration_unit: String,
    pub target_unit: String,
    pub warnings: Vec<String>,
    pub samples: Vec<ConcentrationSample>,
    pub infusions: Vec<InfusionRecord>,
    pub rates: Vec<RateChange>,
    pub dose_interval: DoseInterval,
    pub dose_weight: Vec<DoseWeight>,
    pub targets: Vec<TargetLevel>,
    pub outcomes: Vec<TargetOutcome>,
}

impl SimulationResult {
    pub fn from_pump(pump: &Pump, samples: Vec<ConcentrationSample>, dose_interval: DoseInterval) -> Self {
        let schedule = pump.schedule();
        let generated = schedule.generated().iter()
            .map(|segment| InfusionRecord { segment: *segment, source: InfusionSource::Target });
        let user = schedule.user().iter()
            .map(|segment| InfusionRecord { segment: *segment, source: InfusionSource::User });

        let model = pump.model();
        Self {
            model: model.name.clone(),
            concentration_unit: model.concentration_unit.clone(),
            target_unit: model.target_unit.clone(),
            warnings: model.warnings().to_vec(),
            samples,
            infusions: generated.chain(user).collect(),
            rates: pump.rates_by_time(),
            dose_interval,
            dose_weight: pump.dose_by_weight(dose_interval),
            targets: pump.targets_by_time(),
            outcomes: pump.outcomes().to_vec(),
        }
    }

    pub fn max_plasma(&self) -> f64 {
        self.samples.iter()
            .map(|sample| sample.plasma)
            .fold(0.0, f64::max)
    }

    pub fn max_effect(&self) -> f64 {
        self.samples.iter()
            .map(|sample| sample.effect)
            .fold(0.0, f64::max)
    }

    pub fn time_to_max_plasma(&self) -> Option<f64> {
        self.samples.iter()
            .max_by(|a, b| a.plasma.total_cmp(&b.plasma))
            .map(|sample| sample.time)
    }

    pub fn time_to_max_effect(&self) -> Option<f64> {
        self.samples.iter()
            .max_by(|a, b| a.effect.total_cmp(&b.effect))
            .map(|sample| sample.time)
    }

    /// Plasma area under the curve by the trapezoidal rule, in
    /// concentration-seconds.
    pub fn plasma_auc(&self) -> f64 {
        self.samples.windows(2)
            .map(|window| {
                let dt = window[1].time - window[0].time;
                dt * (window[0].plasma + window[1].plasma) / 2.0
            })
            .sum()
    }

    /// Total dose delivered within the simulated period.
    pub fn total_dose(&self) -> f64 {
        let end = self.samples.last().map_or(0.0, |sample| sample.time);
        self.infusions.iter()
            .map(|record| {
                let segment = record.segment;
                let delivered = (segment.end().min(end) - segment.start).max(0.0);
                segment.dose_per_second * delivered
            })
            .sum()
    }
}
