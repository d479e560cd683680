use super::Pump;
use crate::dosing::InfusionSegment;
use crate::error::PKResult;
use log::debug;

impl Pump {
    /// Fills `[from, until)` with constant-rate windows that return plasma to
    /// `level` at the end of each window. Window lengths start at the
    /// maintenance duration and grow by the maintenance multiplier.
    pub(super) fn maintain(
        &self,
        work: &mut Vec<InfusionSegment>,
        from: f64,
        until: f64,
        level: f64,
    ) -> PKResult<()> {
        let mut window = self.settings.maintenance_duration;
        let mut time = from;
        let mut count = 0;

        while time < until {
            let length = window.min(until - time);
            let projected = self.engine.plasma_at(work, time + length);
            let dose = ((level - projected) / self.engine.integral_of_decline(0.0, length)).max(0.0);
            let dose = self.limit_rate(dose, length);

            work.push(InfusionSegment::new(time, dose, length));
            time += length;
            window = (window * self.settings.maintenance_multiplier).round().max(1.0);
            count += 1;
        }

        debug!("Maintenance of {} from {} s to {} s in {} windows", level, from, until, count);
        Ok(())
    }
}
