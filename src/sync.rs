//! Synchronizer (§4.4): batches pending moves into one simultaneous-finish
//! trajectory per axis.
//!
//! Runs once per cycle, after the command channel is drained and before
//! `receive_processdata`. All axes touched by the same batch share one
//! `start_time` and one `duration` (the slowest mover's), so a shorter
//! move simply spends more of its travel on the slow, low-acceleration
//! shoulders of the half-cosine profile rather than finishing early.

use crate::trajectory::{duration_for_distance, Segment};
use crate::units::AxisKind;

/// One move request collected from the command channel this cycle.
#[derive(Debug, Clone, Copy)]
pub struct PendingMove {
    pub axis: usize,
    pub kind: AxisKind,
    pub target_mm: f64,
    pub profile_velocity_rpm: f64,
    pub current_actual_pulse: i64,
    pub offset_pulse: i64,
}

/// A trajectory to install on one axis, produced by [`synchronize`].
#[derive(Debug, Clone, Copy)]
pub struct Installation {
    pub axis: usize,
    pub segment: Segment,
}

/// Batch `moves` into one or more [`Installation`]s sharing a common
/// start time and the maximum per-axis duration (§4.4).
///
/// `now` is the cycle's single `now_monotonic()` sample, taken once by
/// the caller so every installed segment in the batch starts from the
/// same instant.
pub fn synchronize(moves: &[PendingMove], now: f64, pulses_per_rev_driver: i64) -> Vec<Installation> {
    if moves.is_empty() {
        return Vec::new();
    }

    struct Resolved {
        axis: usize,
        start_pulse: i64,
        end_pulse: i64,
        duration_s: f64,
    }

    let resolved: Vec<Resolved> = moves
        .iter()
        .map(|m| {
            let rel = m.kind.mm_to_pulses(m.target_mm);
            let end_pulse = rel + m.offset_pulse;
            let distance = (end_pulse - m.current_actual_pulse).abs();
            let duration_s = duration_for_distance(distance, m.profile_velocity_rpm, pulses_per_rev_driver);
            Resolved {
                axis: m.axis,
                start_pulse: m.current_actual_pulse,
                end_pulse,
                duration_s,
            }
        })
        .collect();

    let common_duration = resolved
        .iter()
        .map(|r| r.duration_s)
        .fold(crate::trajectory::MIN_DURATION_S, f64::max);

    resolved
        .into_iter()
        .map(|r| Installation {
            axis: r.axis,
            segment: Segment::new(r.start_pulse, r.end_pulse, common_duration, now),
        })
        .collect()
}
