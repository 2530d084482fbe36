//! Shared integration-test harness: a manual [`Clock`] and a thin
//! wrapper for ticking a [`CycleRunner`] a bounded number of times
//! without relying on wall-clock sleep (§9.4).

use csp_motion_core::command::{channel, CommandSender};
use csp_motion_core::cycle::{AxisRuntimeState, Clock, CycleRunner};
use csp_motion_core::shared_state::SharedState;
use csp_motion_core::sim::SimMaster;
use csp_motion_core::units::AxisKind;

#[allow(unused)]
pub use csp_motion_core::shared_state::{current_position_mm, is_moving};

/// Manually-advanced clock: `now()` only moves when `sleep` is called,
/// by exactly the amount requested, so a test controls wall time.
pub struct ManualClock {
    now: std::cell::Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::cell::Cell::new(0.0),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn sleep(&self, duration_s: f64) {
        self.now.set(self.now.get() + duration_s.max(0.0));
    }
}

pub const CYCLE_TIME_S: f64 = 0.01;

/// Build a ready-to-tick harness for `axis_count` axes, all Z-axis,
/// statusword pre-set to Operation Enabled so trajectories can start
/// immediately. Returns the runner, the command sender, and a clone of
/// the shared-state handle so the test can read published snapshots.
pub fn harness(axis_count: usize) -> (CycleRunner<SimMaster, ManualClock>, CommandSender, SharedState) {
    let (tx, rx) = channel();
    let shared = SharedState::new(axis_count);
    let shared_for_test = shared.clone();
    let axes: Vec<AxisRuntimeState> = (0..axis_count).map(|_| AxisRuntimeState::new(AxisKind::Z)).collect();
    let mut master = SimMaster::new(axis_count);
    for slave in 0..axis_count {
        master.set_statusword(slave, 0x0027);
    }
    let runner = CycleRunner::new(
        master,
        ManualClock::new(),
        rx,
        shared,
        axes,
        2_000_000,
        5,
        0.10,
        CYCLE_TIME_S,
    );
    (runner, tx, shared_for_test)
}

/// Tick `runner` up to `max_cycles` times, stopping early if `tick`
/// reports the loop should stop.
pub fn run_cycles(runner: &mut CycleRunner<SimMaster, ManualClock>, max_cycles: u32) {
    for _ in 0..max_cycles {
        if runner.tick().expect("tick should not fail in test harness") {
            break;
        }
    }
}
