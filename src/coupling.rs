//! Cross-coupling correction stage (§9.5, supplemented feature).
//!
//! Sits between the Trajectory Generator and the PDO Codec. Only
//! engages once every configured axis is simultaneously mid-trajectory
//! and no fault is raised — a single axis finishing early, or any fault
//! condition, disengages it for that cycle so it can never fight the
//! Fault Supervisor's freeze.

/// Runtime-tunable coupling gain, `[0.0, 1.0]` by convention (unenforced
/// above 0.5 — only warned, per the open question's resolution).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingGain(f64);

/// Gain values above this are accepted but outside the analyzed
/// stability margin.
pub const WARN_ABOVE: f64 = 0.5;

impl CouplingGain {
    pub fn new(gain: f64) -> Self {
        if gain > WARN_ABOVE {
            tracing::warn!(gain, "coupling gain above analyzed stability margin");
        }
        Self(gain)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for CouplingGain {
    fn default() -> Self {
        Self(0.10)
    }
}

/// One axis's interpolated target pulse before correction, paired with
/// its trajectory's total travel so progress can be compared fairly
/// across axes of different distances.
#[derive(Debug, Clone, Copy)]
pub struct AxisProgress {
    pub axis: usize,
    pub interpolated_pulse: i64,
    pub start_pulse: i64,
    pub end_pulse: i64,
}

impl AxisProgress {
    fn progress_pulses(&self) -> f64 {
        (self.interpolated_pulse - self.start_pulse) as f64
    }

    fn span(&self) -> f64 {
        (self.end_pulse - self.start_pulse) as f64
    }
}

/// Apply cross-coupling correction to every axis's interpolated target.
///
/// `entries` must contain one [`AxisProgress`] per axis *currently
/// mid-trajectory*; the caller is responsible for only calling this
/// when that set equals the full configured axis set (§9.5: "all
/// configured axes simultaneously in an active trajectory").
///
/// Returns corrected target pulses in the same order as `entries`.
pub fn correct(entries: &[AxisProgress], gain: CouplingGain) -> Vec<i64> {
    if entries.is_empty() {
        return Vec::new();
    }
    let mean_fraction: f64 = entries
        .iter()
        .map(|e| {
            let span = e.span();
            if span.abs() < 1.0 {
                0.0
            } else {
                e.progress_pulses() / span
            }
        })
        .sum::<f64>()
        / entries.len() as f64;

    entries
        .iter()
        .map(|e| {
            let span = e.span();
            let own_fraction = if span.abs() < 1.0 {
                0.0
            } else {
                e.progress_pulses() / span
            };
            let correction = gain.value() * (own_fraction - mean_fraction) * span;
            e.interpolated_pulse - correction.round() as i64
        })
        .collect()
}

/// Whether the correction stage should engage this cycle: every
/// configured axis is mid-trajectory and no fault is raised (§9.5).
pub fn should_engage(active_trajectory_count: usize, configured_axis_count: usize, fault_raised: bool) -> bool {
    !fault_raised && active_trajectory_count == configured_axis_count && configured_axis_count > 0
}
