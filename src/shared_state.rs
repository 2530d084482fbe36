//! Shared-State Publisher (§4.7): lock-guarded snapshot for outside readers.
//!
//! Mirrors the teacher's SHM outbound-segment pattern (§9.1 of the
//! original codebase: short-held lock, readers take the same lock for a
//! consistent copy) but in-process: the "memory region" is a
//! `parking_lot::Mutex`-guarded fixed array rather than a cross-process
//! mapping, since the core's only declared reader is another thread in
//! the same process (§5).

use parking_lot::Mutex;

/// One axis's published 4-tuple (§3: statusword, moving, actual, offset).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisSnapshot {
    pub statusword: u16,
    pub moving: bool,
    pub actual_pulse: i64,
    pub offset_pulse: i64,
}

/// Shared, lock-guarded published state for up to `N` axes.
///
/// Cloneable handle: every clone refers to the same underlying lock via
/// `Arc`, matching §5's "writer-exclusive behind a single lock" model.
#[derive(Clone)]
pub struct SharedState {
    inner: std::sync::Arc<Mutex<Vec<AxisSnapshot>>>,
}

impl SharedState {
    /// Create a new published-state region for `axis_count` axes, zeroed.
    pub fn new(axis_count: usize) -> Self {
        Self {
            inner: std::sync::Arc::new(Mutex::new(vec![AxisSnapshot::default(); axis_count])),
        }
    }

    /// Publish the full set of axis snapshots under one short-held lock
    /// (§4.7: atomic relative to other publishers and readers).
    pub fn publish(&self, snapshots: &[AxisSnapshot]) {
        let mut guard = self.inner.lock();
        guard.clear();
        guard.extend_from_slice(snapshots);
    }

    /// Read one axis's snapshot under the lock (§4.7: consistent 4-tuple).
    pub fn snapshot(&self, axis: usize) -> Option<AxisSnapshot> {
        self.inner.lock().get(axis).copied()
    }

    /// Number of axes currently published.
    pub fn axis_count(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Derived helper: current position in mm from a snapshot and axis kind.
pub fn current_position_mm(snapshot: &AxisSnapshot, kind: crate::units::AxisKind) -> f64 {
    kind.pulses_to_mm(snapshot.actual_pulse - snapshot.offset_pulse)
}

/// Derived helper: whether the axis is currently executing a trajectory.
#[inline]
pub fn is_moving(snapshot: &AxisSnapshot) -> bool {
    snapshot.moving
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::AxisKind;

    #[test]
    fn publish_then_snapshot_round_trips() {
        let shared = SharedState::new(2);
        let snaps = [
            AxisSnapshot {
                statusword: 0x0027,
                moving: true,
                actual_pulse: 1000,
                offset_pulse: 0,
            },
            AxisSnapshot::default(),
        ];
        shared.publish(&snaps);
        assert_eq!(shared.snapshot(0), Some(snaps[0]));
        assert_eq!(shared.snapshot(1), Some(snaps[1]));
        assert_eq!(shared.snapshot(2), None);
    }

    #[test]
    fn clones_observe_the_same_published_state() {
        let shared = SharedState::new(1);
        let reader = shared.clone();
        shared.publish(&[AxisSnapshot {
            statusword: 0x0000,
            moving: false,
            actual_pulse: 555,
            offset_pulse: 5,
        }]);
        assert_eq!(reader.snapshot(0).unwrap().actual_pulse, 555);
    }

    #[test]
    fn current_position_mm_subtracts_origin_offset() {
        let snap = AxisSnapshot {
            statusword: 0,
            moving: false,
            actual_pulse: AxisKind::Z.mm_to_pulses(10.0) + 12_345,
            offset_pulse: 12_345,
        };
        let mm = current_position_mm(&snap, AxisKind::Z);
        assert!((mm - 10.0).abs() < 0.01);
    }

    #[test]
    fn is_moving_matches_moving_flag() {
        let snap = AxisSnapshot {
            moving: true,
            ..Default::default()
        };
        assert!(is_moving(&snap));
    }
}
