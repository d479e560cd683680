use crate::error::{require_non_negative, PKResult};
use serde::{Deserialize, Serialize};

/// Constant-rate delivery of `dose_per_second` over `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfusionSegment {
    pub start: f64,
    pub dose_per_second: f64,
    pub duration: f64,
}

impl InfusionSegment {
    pub fn new(start: f64, dose_per_second: f64, duration: f64) -> Self {
        Self { start, dose_per_second, duration }
    }

    /// A zero-dose placeholder that only partitions time.
    pub fn zero(start: f64, duration: f64) -> Self {
        Self::new(start, 0.0, duration)
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn total_dose(&self) -> f64 {
        self.dose_per_second * self.duration
    }

    /// Pump rate in ml/h for a drug of `drug_concentration` dose units per ml.
    pub fn rate_ml_per_hour(&self, drug_concentration: f64) -> f64 {
        self.dose_per_second / drug_concentration * 3600.0
    }

    /// Validated constructor for segments supplied from outside the scheduler.
    pub fn checked(start: f64, dose_per_second: f64, duration: f64) -> PKResult<Self> {
        Ok(Self::new(
            require_non_negative("infusion start", start)?,
            require_non_negative("dose per second", dose_per_second)?,
            require_non_negative("infusion duration", duration)?,
        ))
    }
}

/// Clips every segment that runs past `time` so that it ends there, and
/// drops segments that would start at or after it.
pub fn truncate_at(segments: &mut Vec<InfusionSegment>, time: f64) {
    segments.retain(|segment| segment.start < time);
    for segment in segments.iter_mut() {
        if segment.end() > time {
            segment.duration = time - segment.start;
        }
    }
}

/// Generated segments followed by user segments, in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    segments: Vec<InfusionSegment>,
    generated: usize,
}

impl Schedule {
    pub fn new(generated: Vec<InfusionSegment>, user: &[InfusionSegment]) -> Self {
        let count = generated.len();
        let mut segments = generated;
        segments.extend_from_slice(user);
        Self { segments, generated: count }
    }

    pub fn segments(&self) -> &[InfusionSegment] {
        &self.segments
    }

    /// Segments derived from targets.
    pub fn generated(&self) -> &[InfusionSegment] {
        &self.segments[..self.generated]
    }

    pub fn user(&self) -> &[InfusionSegment] {
        &self.segments[self.generated..]
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segments with dosing after `time` removed.
    pub fn truncated_at(&self, time: f64) -> Vec<InfusionSegment> {
        let mut segments = self.segments.clone();
        truncate_at(&mut segments, time);
        segments
    }

    pub fn total_dose(&self) -> f64 {
        self.segments.iter().map(InfusionSegment::total_dose).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_end_and_rate() {
        let segment = InfusionSegment::new(10.0, 0.05, 30.0);
        assert_eq!(segment.end(), 40.0);
        assert!((segment.total_dose() - 1.5).abs() < 1e-12);
        // 0.05 mg/s of a 10 mg/ml drug is 18 ml/h.
        assert!((segment.rate_ml_per_hour(10.0) - 18.0).abs() < 1e-12);
    }

    #[test]
    fn test_checked_rejects_negative_dose() {
        assert!(InfusionSegment::checked(0.0, -1.0, 10.0).is_err());
        assert!(InfusionSegment::checked(-5.0, 1.0, 10.0).is_err());
        assert!(InfusionSegment::checked(0.0, 1.0, 10.0).is_ok());
    }

    #[test]
    fn test_truncate_clips_and_drops() {
        let mut segments = vec![
            InfusionSegment::new(0.0, 1.0, 10.0),
            InfusionSegment::new(10.0, 0.5, 100.0),
            InfusionSegment::new(120.0, 0.2, 60.0),
        ];
        truncate_at(&mut segments, 50.0);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].duration, 10.0);
        assert_eq!(segments[1].duration, 40.0);
    }

    #[test]
    fn test_schedule_separates_user_segments() {
        let generated = vec![InfusionSegment::new(0.0, 1.0, 10.0), InfusionSegment::zero(10.0, 50.0)];
        let user = [InfusionSegment::new(30.0, 0.1, 5.0)];
        let schedule = Schedule::new(generated, &user);

        assert_eq!(schedule.segments().len(), 3);
        assert_eq!(schedule.generated().len(), 2);
        assert_eq!(schedule.user(), &user);
        assert!((schedule.total_dose() - 10.5).abs() < 1e-12);
        assert_eq!(schedule.truncated_at(32.0).len(), 3);
    }
}
