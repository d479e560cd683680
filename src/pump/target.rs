use crate::engine::Site;
use crate::error::{PKError, PKResult};
use serde::{Deserialize, Serialize};

/// Per-target overrides. Unset limits fall back to the pump settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetOptions {
    #[serde(default)]
    pub cp_limit: Option<f64>,
    #[serde(default)]
    pub cp_limit_duration: Option<f64>,
    /// Effect-site targets only: reach the target with a single bolus.
    #[serde(default = "enabled")]
    pub bolus_only: bool,
    /// Hold the level with maintenance infusions until the next target.
    #[serde(default = "enabled")]
    pub maintain: bool,
}

fn enabled() -> bool {
    true
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self { cp_limit: None, cp_limit_duration: None, bolus_only: true, maintain: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    pub start: f64,
    pub level: f64,
    /// Time allowed to reach `level`, in seconds.
    pub duration: f64,
    /// Last second of this target's window: the next start minus one, or
    /// the simulation end for the final target.
    pub end: f64,
    pub site: Site,
    pub cp_limit: f64,
    pub cp_limit_duration: f64,
    pub bolus_only: bool,
    pub maintain: bool,
}

/// What generation achieved for one target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetOutcome {
    pub start: f64,
    pub level: f64,
    pub site: Site,
    /// Time at which dosing for this target settles; for effect-site
    /// increases, the time the effect-site peak meets the level.
    pub reached: f64,
}

/// Level change at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetLevel {
    pub time: f64,
    pub level: f64,
}

/// Adds `target` keeping the list ordered by start, then recomputes every
/// window end.
pub(crate) fn insert(targets: &mut Vec<Target>, target: Target, end_time: f64) -> PKResult<()> {
    if targets.iter().any(|existing| existing.start == target.start) {
        return Err(PKError::InvalidParameter(
            format!("a target already starts at {} s", target.start)
        ));
    }

    targets.push(target);
    targets.sort_by(|a, b| a.start.total_cmp(&b.start));

    let starts: Vec<f64> = targets.iter().map(|t| t.start).collect();
    for (n, target) in targets.iter_mut().enumerate() {
        target.end = starts.get(n + 1).map_or(end_time, |next| next - 1.0);
    }
    Ok(())
}
