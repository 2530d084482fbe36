//! Fault Supervisor (§4.5) and the position-difference emergency stop
//! that feeds into it (§9.5, supplemented feature).
//!
//! Partial stops in coordinated motion are more dangerous than a full
//! freeze, so any trip — a real statusword fault bit or a divergence
//! trip — cancels every axis's trajectory in the same cycle, not just
//! the offending one.

use crate::cia402::Statusword;

#[inline]
fn statusword_has_fault(statusword: u16) -> bool {
    Statusword::from_bits_truncate(statusword).contains(Statusword::FAULT)
}

/// Tracks, per axis, how many consecutive cycles its measured actual
/// position has sat further than `threshold_pulses` from the target the
/// Control Loop last commanded, and trips like a statusword fault once
/// any axis holds that for `trip_cycles` consecutive cycles (§9.5).
///
/// This is deliberately *not* a raw cross-axis position comparison:
/// two axes in the same coordinated move are routinely commanded to
/// different absolute targets (§8 S2 moves one axis -50mm and another
/// -30mm in the same batch), so comparing their raw positions would
/// trip on ordinary, correctly-executing motion. Measuring each axis
/// against its own commanded target instead catches the failure this
/// supplement is meant to catch — a slave that has stopped tracking
/// its command, e.g. stalled or mechanically disconnected — without
/// being fooled by axes that are simply going different distances.
#[derive(Debug, Clone)]
pub struct DivergenceMonitor {
    threshold_pulses: i64,
    trip_cycles: u32,
    consecutive: Vec<u32>,
}

impl DivergenceMonitor {
    pub fn new(threshold_pulses: i64, trip_cycles: u32, axis_count: usize) -> Self {
        Self {
            threshold_pulses,
            trip_cycles: trip_cycles.max(1),
            consecutive: vec![0; axis_count],
        }
    }

    /// Feed this cycle's `(target_pulse, actual_pulse)` per axis and
    /// report whether any axis's divergence has tripped.
    pub fn tick(&mut self, targets_and_actuals: &[(i64, i64)]) -> bool {
        let mut tripped = false;
        for (axis, &(target, actual)) in targets_and_actuals.iter().enumerate() {
            let diverging = (target - actual).abs() > self.threshold_pulses;
            if diverging {
                self.consecutive[axis] = self.consecutive[axis].saturating_add(1);
            } else {
                self.consecutive[axis] = 0;
            }
            if self.consecutive[axis] >= self.trip_cycles {
                tripped = true;
            }
        }
        tripped
    }

    /// Clear all consecutive-divergence counters (called once the
    /// Fault Supervisor's fault condition is fully cleared).
    pub fn reset(&mut self) {
        self.consecutive.iter_mut().for_each(|c| *c = 0);
    }
}

/// One axis's measured state going into the supervisor this cycle.
#[derive(Debug, Clone, Copy)]
pub struct AxisSample {
    pub statusword: u16,
    pub actual_pulse: i64,
    /// Most recently commanded target, for the divergence check.
    pub target_pulse: i64,
}

/// Outcome of running the supervisor for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultDecision {
    /// Whether any axis tripped (statusword bit or divergence).
    pub fault_raised: bool,
}

/// Scan this cycle's samples and the divergence monitor; decide
/// whether to raise `fault_raised` (§4.5, §9.5).
///
/// Callers clear every axis's trajectory and pin `target_pulse :=
/// actual_pulse` whenever `fault_raised` is true, regardless of which
/// axis triggered it.
pub fn supervise(samples: &[AxisSample], divergence: &mut DivergenceMonitor) -> FaultDecision {
    let statusword_fault = samples.iter().any(|s| statusword_has_fault(s.statusword));
    let targets_and_actuals: Vec<(i64, i64)> = samples.iter().map(|s| (s.target_pulse, s.actual_pulse)).collect();
    let divergence_trip = divergence.tick(&targets_and_actuals);

    if statusword_fault {
        tracing::warn!("drive fault bit set, freezing all axes");
    }
    if divergence_trip {
        tracing::warn!("axis target/actual divergence exceeded threshold, freezing all axes");
    }

    FaultDecision {
        fault_raised: statusword_fault || divergence_trip,
    }
}
