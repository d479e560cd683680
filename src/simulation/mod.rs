pub mod result;

use crate::config::ScenarioConfig;
use crate::error::PKResult;
use log::{debug, info, warn};

pub use result::*;

pub struct Simulator {
    config: ScenarioConfig,
}

impl Simulator {
    pub fn new(config: ScenarioConfig) -> PKResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Builds the pump, generates its schedule and replays it over the whole
    /// simulation period.
    pub fn simulate(&self) -> PKResult<SimulationResult> {
        let mut pump = self.config.build_pump()?;
        info!(
            "Simulating {} targets and {} user infusions with the {} model over {} s",
            self.config.targets.len(),
            self.config.infusions.len(),
            pump.model().name,
            pump.settings().end_time
        );

        for warning in pump.model().warnings() {
            warn!("{}: {}; calculations may be unreliable", pump.model().name, warning);
        }

        let samples = pump.run()?;
        debug!("Replayed {} segments into {} samples", pump.schedule().segments().len(), samples.len());

        let result = SimulationResult::from_pump(&pump, samples, self.config.dose_interval);
        info!(
            "Peak plasma {:.4} at {} s, peak effect {:.4} at {} s",
            result.max_plasma(),
            result.time_to_max_plasma().unwrap_or(0.0),
            result.max_effect(),
            result.time_to_max_effect().unwrap_or(0.0)
        );
        Ok(result)
    }
}
