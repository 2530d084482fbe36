//! Public controller surface (§6): what the user-facing API collaborator
//! is given to work with. Everything else in this crate is private to
//! the control core.

use crate::command::{self, Command, CommandSender};
use crate::config::MachineConfig;
use crate::cycle::{AxisRuntimeState, CycleRunner, SystemClock};
use crate::error::CoreError;
use crate::lifecycle;
use crate::master::EcMaster;
use crate::shared_state::{self, AxisSnapshot, SharedState};
use crate::units::AxisKind;

/// A running control core: owns the command channel's send side and a
/// handle to the published shared state, and joins the loop's thread
/// on [`Controller::stop`].
pub struct Controller {
    cmd_tx: CommandSender,
    shared: SharedState,
    join: Option<std::thread::JoinHandle<Result<(), CoreError>>>,
}

impl Controller {
    /// Bring the bus to OP and fork the Control Loop onto a dedicated
    /// thread (§4.8 Init, §5 scheduling model).
    ///
    /// `master` must already be constructed (e.g. a [`crate::sim::SimMaster`]
    /// for the demo binary and tests); this crate never opens a real
    /// fieldbus adapter itself.
    pub fn start<M: EcMaster + Send + 'static>(mut master: M, config: MachineConfig) -> Result<Self, CoreError> {
        crate::cycle::rt_setup(0, 80)?;
        lifecycle::init(&mut master, &config)?;
        let seeded = lifecycle::seed_targets_from_actual(&mut master, config.axes.len())?;

        let mut axes: Vec<AxisRuntimeState> = config
            .axes
            .iter()
            .map(|a| {
                let mut state = AxisRuntimeState::new(a.kind);
                state.profile_velocity_rpm = a.profile_velocity_rpm;
                state
            })
            .collect();
        for (axis, &target) in axes.iter_mut().zip(seeded.iter()) {
            axis.target_pulse = target;
        }

        let shared = SharedState::new(axes.len());
        let (cmd_tx, cmd_rx) = command::channel();

        let cycle_time_s = config.cycle_time_us as f64 / 1_000_000.0;
        let divergence_threshold_pulses = config.divergence_threshold_pulses;
        let divergence_trip_cycles = config.divergence_trip_cycles;
        let coupling_gain = config.coupling_gain;
        let shared_for_thread = shared.clone();

        let join = std::thread::spawn(move || {
            let mut runner = CycleRunner::new(
                master,
                SystemClock::default(),
                cmd_rx,
                shared_for_thread,
                axes,
                divergence_threshold_pulses,
                divergence_trip_cycles,
                coupling_gain,
                cycle_time_s,
            );
            runner.run()
        });

        Ok(Self {
            cmd_tx,
            shared,
            join: Some(join),
        })
    }

    /// Submit a command to the loop (§6). Non-blocking.
    pub fn enqueue(&self, cmd: Command) -> Result<(), Command> {
        self.cmd_tx.enqueue(cmd)
    }

    /// Read one axis's published snapshot under the shared-state lock.
    pub fn snapshot(&self, axis: usize) -> Option<AxisSnapshot> {
        self.shared.snapshot(axis)
    }

    /// Derived helper: current position in mm, relative to the axis's origin.
    pub fn current_position_mm(&self, axis: usize, kind: AxisKind) -> Option<f64> {
        self.shared.snapshot(axis).map(|s| shared_state::current_position_mm(&s, kind))
    }

    /// Derived helper: whether the axis is currently executing a trajectory.
    pub fn is_moving(&self, axis: usize) -> Option<bool> {
        self.shared.snapshot(axis).map(|s| shared_state::is_moving(&s))
    }

    /// Push `StopAll` and join the loop's thread (§6, §4.8 Shutdown).
    pub fn stop(mut self) -> Result<(), CoreError> {
        let _ = self.cmd_tx.enqueue(Command::StopAll);
        if let Some(join) = self.join.take() {
            join.join().unwrap_or_else(|_| {
                Err(CoreError::MasterIo("control loop thread panicked".into()))
            })
        } else {
            Ok(())
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.cmd_tx.enqueue(Command::StopAll);
        }
    }
}
