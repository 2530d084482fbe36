//! Control Loop (§4.6): the fixed-period orchestrator.
//!
//! One tick: drain commands → Synchronizer → `receive_processdata` →
//! Fault Supervisor → per-axis CiA 402 + Trajectory + coupling →
//! `send_processdata` → publish shared state → sleep. RT setup
//! (`mlockall`/`SCHED_FIFO`) mirrors the teacher's sequence but is only
//! compiled in behind the `rt` feature; without it the loop runs on
//! `std::thread::sleep` for development and the test suite.

use crate::cia402::Cia402Driver;
use crate::codec::{decode_txpdo, encode_rxpdo};
use crate::command::{Command, CommandReceiver};
use crate::coupling::{self, AxisProgress, CouplingGain};
use crate::error::CoreError;
use crate::fault::{self, AxisSample, DivergenceMonitor};
use crate::lifecycle;
use crate::master::EcMaster;
use crate::shared_state::{AxisSnapshot, SharedState};
use crate::sync::{self, PendingMove};
use crate::trajectory::Segment;
use crate::units::{AxisKind, PULSES_PER_REV_DRIVER};

/// Per-cycle timing statistics, recorded with no allocation (mirrors
/// the teacher's `CycleStats`, trimmed to the fields this loop needs).
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub cycle_count: u64,
    pub last_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub overruns: u64,
}

impl CycleStats {
    #[inline]
    fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
    }
}

/// Per-axis mutable state owned exclusively by the Control Loop (§3).
#[derive(Debug, Clone)]
pub struct AxisRuntimeState {
    pub kind: AxisKind,
    pub profile_velocity_rpm: f64,
    pub offset_pulse: i64,
    pub target_pulse: i64,
    pub trajectory: Option<Segment>,
    pub last_status: u16,
    pub last_controlword: u16,
    driver: Cia402Driver,
}

impl AxisRuntimeState {
    pub fn new(kind: AxisKind) -> Self {
        Self {
            kind,
            profile_velocity_rpm: 60.0,
            offset_pulse: 0,
            target_pulse: 0,
            trajectory: None,
            last_status: 0,
            last_controlword: 0,
            driver: Cia402Driver::new(),
        }
    }

    #[inline]
    pub fn moving(&self) -> bool {
        self.trajectory.is_some()
    }
}

/// A clock abstraction so the loop can be ticked deterministically in
/// tests (§9.4: "cycle time is injected and now is supplied by a test
/// clock") without depending on wall-clock sleeps.
pub trait Clock {
    /// Monotonic seconds, arbitrary epoch, strictly non-decreasing.
    fn now(&self) -> f64;
    /// Block for approximately `duration_s` seconds (no-op is valid
    /// for a test clock; real clocks should actually sleep).
    fn sleep(&self, duration_s: f64);
}

/// Wall-clock [`Clock`] backed by `std::time::Instant`.
pub struct SystemClock {
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration_s: f64) {
        if duration_s > 0.0 {
            std::thread::sleep(std::time::Duration::from_secs_f64(duration_s));
        }
    }
}

/// The main deterministic cycle runner. Owns the master, every axis's
/// runtime state, the command channel receive side, and the published
/// shared-state handle.
pub struct CycleRunner<M: EcMaster, C: Clock> {
    master: M,
    clock: C,
    cmd_rx: CommandReceiver,
    shared: SharedState,
    axes: Vec<AxisRuntimeState>,
    divergence: DivergenceMonitor,
    fault_latched: bool,
    coupling_gain: CouplingGain,
    cycle_time_s: f64,
    last_actual_pulses: Vec<i64>,
    pub stats: CycleStats,
}

impl<M: EcMaster, C: Clock> CycleRunner<M, C> {
    pub fn new(
        master: M,
        clock: C,
        cmd_rx: CommandReceiver,
        shared: SharedState,
        axes: Vec<AxisRuntimeState>,
        divergence_threshold_pulses: i64,
        divergence_trip_cycles: u32,
        coupling_gain: f64,
        cycle_time_s: f64,
    ) -> Self {
        let divergence = DivergenceMonitor::new(divergence_threshold_pulses, divergence_trip_cycles, axes.len());
        let last_actual_pulses = vec![0i64; axes.len()];
        Self {
            master,
            clock,
            cmd_rx,
            shared,
            axes,
            divergence,
            fault_latched: false,
            coupling_gain: CouplingGain::new(coupling_gain),
            cycle_time_s,
            last_actual_pulses,
            stats: CycleStats::default(),
        }
    }

    /// Enter the steady-state loop. Returns only on `StopAll` or a
    /// fatal [`CoreError`] (§7: propagation policy).
    pub fn run(&mut self) -> Result<(), CoreError> {
        loop {
            let cycle_start = self.clock.now();
            let stop = self.tick()?;
            let duration_s = self.clock.now() - cycle_start;
            self.stats.record((duration_s * 1e9) as i64);

            if duration_s * 1e9 > (self.cycle_time_s * 1e9) {
                self.stats.overruns += 1;
                tracing::warn!(
                    actual_ns = (duration_s * 1e9) as i64,
                    budget_ns = (self.cycle_time_s * 1e9) as i64,
                    "cycle overrun"
                );
            }

            if stop {
                tracing::info!("stop requested, running shutdown sequence");
                lifecycle::shutdown(&mut self.master, &self.last_actual_pulses)?;
                self.shared.publish(&self.terminal_snapshots());
                return Ok(());
            }

            let remaining = self.cycle_time_s - duration_s;
            self.clock.sleep(remaining.max(0.0));
        }
    }

    /// Terminal snapshot published once the shutdown sequence completes
    /// (§7): every axis held, not moving, at its last measured position.
    fn terminal_snapshots(&self) -> Vec<AxisSnapshot> {
        self.axes
            .iter()
            .zip(self.last_actual_pulses.iter())
            .map(|(axis, &actual_pulse)| AxisSnapshot {
                statusword: axis.last_status,
                moving: false,
                actual_pulse,
                offset_pulse: axis.offset_pulse,
            })
            .collect()
    }

    /// Mutable access to the underlying master, for tests that need to
    /// inject faults or stalls between ticks.
    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    /// One cycle, per §4.6 steps 1–7. Returns `Ok(true)` when the loop
    /// should stop after this cycle (a `StopAll` was drained).
    ///
    /// Exposed (not just used internally by `run`) so tests and
    /// benchmarks can step the loop deterministically without relying
    /// on wall-clock sleeps.
    pub fn tick(&mut self) -> Result<bool, CoreError> {
        let now = self.clock.now();

        // Step 1: drain commands.
        let mut pending_moves: Vec<PendingMove> = Vec::new();
        let mut stop_requested = false;
        for cmd in self.cmd_rx.drain() {
            match cmd {
                Command::SetAxis { axis, kind } => {
                    if let Some(a) = self.axes.get_mut(axis) {
                        a.kind = kind;
                    }
                }
                Command::SetVelocity { axis, rpm } => {
                    if let Some(a) = self.axes.get_mut(axis) {
                        a.profile_velocity_rpm = rpm;
                    }
                }
                Command::SetAccel { .. } => {
                    // Diagnostic/SDO-only in the current feature set; the CSP
                    // loop itself rides a fixed time profile, not a ramp limiter.
                }
                Command::SetCouplingGain { gain } => {
                    self.coupling_gain = CouplingGain::new(gain);
                }
                Command::SetOrigin { axis } => {
                    if let Some(a) = self.axes.get_mut(axis) {
                        a.offset_pulse = a.target_pulse;
                    }
                }
                Command::MoveToMm { axis, target_mm } => {
                    if let Some(a) = self.axes.get(axis) {
                        pending_moves.push(PendingMove {
                            axis,
                            kind: a.kind,
                            target_mm,
                            profile_velocity_rpm: a.profile_velocity_rpm,
                            current_actual_pulse: a.target_pulse,
                            offset_pulse: a.offset_pulse,
                        });
                    }
                }
                Command::StopAll => stop_requested = true,
            }
        }

        // Step 2: Synchronizer.
        for install in sync::synchronize(&pending_moves, now, PULSES_PER_REV_DRIVER) {
            if let Some(a) = self.axes.get_mut(install.axis) {
                a.trajectory = Some(install.segment);
            }
        }

        // Step 3: receive_processdata, decode inputs.
        self.master
            .receive_processdata()
            .map_err(|e| CoreError::MasterIo(e.to_string()))?;
        let mut actual_pulses = vec![0i64; self.axes.len()];
        let mut statuswords = vec![0u16; self.axes.len()];
        for (slave, axis) in self.axes.iter_mut().enumerate() {
            let input = self.master.input(slave);
            let buf: [u8; crate::codec::PDO_LEN] = input
                .try_into()
                .map_err(|_| CoreError::MasterIo("short TxPDO buffer".into()))?;
            let (statusword, actual) = decode_txpdo(&buf);
            axis.last_status = statusword;
            actual_pulses[slave] = actual as i64;
            statuswords[slave] = statusword;
        }
        self.last_actual_pulses.copy_from_slice(&actual_pulses);

        // Step 4: Fault Supervisor. `target_pulse` here is still last
        // cycle's commanded value (Step 5 below has not yet overwritten
        // it), i.e. exactly what was sent on the wire before this
        // cycle's feedback arrived.
        let samples: Vec<AxisSample> = self
            .axes
            .iter()
            .zip(statuswords.iter())
            .zip(actual_pulses.iter())
            .map(|((axis, &statusword), &actual_pulse)| AxisSample {
                statusword,
                actual_pulse,
                target_pulse: axis.target_pulse,
            })
            .collect();
        let decision = fault::supervise(&samples, &mut self.divergence);
        if decision.fault_raised {
            for axis in self.axes.iter_mut() {
                axis.trajectory = None;
            }
            self.fault_latched = true;
        } else if self.fault_latched {
            // Only wipe the per-axis consecutive-divergence counters on the
            // cycle the fault condition actually clears, not on every clean
            // cycle — `DivergenceMonitor::tick` already resets an axis's own
            // counter whenever that axis isn't diverging, so resetting here
            // too would mean no axis could ever accumulate past 1 consecutive
            // cycle and `divergence_trip_cycles` could never be reached.
            self.divergence.reset();
            self.fault_latched = false;
        }

        // Step 5: per-axis trajectory eval, completion, CiA402, output.
        let mut interpolated: Vec<i64> = Vec::with_capacity(self.axes.len());
        for (slave, axis) in self.axes.iter_mut().enumerate() {
            axis.target_pulse = actual_pulses[slave];
            if let Some(seg) = axis.trajectory {
                let target = seg.target_at(now);
                if seg.is_complete(actual_pulses[slave]) {
                    axis.trajectory = None;
                    axis.target_pulse = actual_pulses[slave];
                } else {
                    axis.target_pulse = target;
                }
            }
            interpolated.push(axis.target_pulse);
        }

        // Cross-coupling correction (§9.5): only when every axis is
        // simultaneously mid-trajectory and no fault is raised.
        let active_count = self.axes.iter().filter(|a| a.moving()).count();
        if coupling::should_engage(active_count, self.axes.len(), decision.fault_raised) {
            let progress: Vec<AxisProgress> = self
                .axes
                .iter()
                .enumerate()
                .map(|(slave, axis)| {
                    let seg = axis.trajectory.expect("should_engage guarantees all axes moving");
                    AxisProgress {
                        axis: slave,
                        interpolated_pulse: interpolated[slave],
                        start_pulse: seg.start_pulse,
                        end_pulse: seg.end_pulse,
                    }
                })
                .collect();
            let corrected = coupling::correct(&progress, self.coupling_gain);
            for (slave, value) in corrected.into_iter().enumerate() {
                self.axes[slave].target_pulse = value;
            }
        }

        let mut snapshots = Vec::with_capacity(self.axes.len());
        for (slave, axis) in self.axes.iter_mut().enumerate() {
            let (controlword, _may_update) = axis.driver.next_controlword(axis.last_status);
            axis.last_controlword = controlword;
            let frame = encode_rxpdo(controlword, axis.target_pulse as i32);
            self.master.output(slave).copy_from_slice(&frame);
            snapshots.push(AxisSnapshot {
                statusword: axis.last_status,
                moving: axis.moving(),
                actual_pulse: actual_pulses[slave],
                offset_pulse: axis.offset_pulse,
            });
        }

        // Step 6: send_processdata.
        self.master
            .send_processdata()
            .map_err(|e| CoreError::MasterIo(e.to_string()))?;

        // Step 7: publish shared state.
        self.shared.publish(&snapshots);

        Ok(stop_requested)
    }
}

/// RT setup sequence (§4.6/§5): lock memory, pin affinity, raise to
/// `SCHED_FIFO`. No-op outside the `rt` feature.
#[cfg(feature = "rt")]
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CoreError> {
    unsafe {
        if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
            return Err(CoreError::InitFailure {
                attempts: 1,
                reason: format!("mlockall failed: {}", std::io::Error::last_os_error()),
            });
        }
    }

    let mut cpu_set = nix::sched::CpuSet::new();
    cpu_set
        .set(cpu_core)
        .map_err(|e| CoreError::InitFailure {
            attempts: 1,
            reason: format!("invalid cpu core {cpu_core}: {e}"),
        })?;
    nix::sched::sched_setaffinity(nix::unistd::Pid::from_raw(0), &cpu_set).map_err(|e| CoreError::InitFailure {
        attempts: 1,
        reason: format!("sched_setaffinity failed: {e}"),
    })?;

    let param = libc::sched_param {
        sched_priority: rt_priority,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        return Err(CoreError::InitFailure {
            attempts: 1,
            reason: format!("sched_setscheduler failed: {}", std::io::Error::last_os_error()),
        });
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
pub fn rt_setup(_cpu_core: usize, _rt_priority: i32) -> Result<(), CoreError> {
    Ok(())
}
