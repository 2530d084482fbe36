//! Error taxonomy (§7): one variant per recognized error kind.
//!
//! `InitFailure` and `StateTransitionTimeout` are fatal and surfaced to the
//! caller; `DriveFault`, `CycleOverrun`, and `UnknownCommand` are handled
//! locally and only ever logged.

use thiserror::Error;

/// All error kinds the control core recognizes.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Adapter open or slave count mismatch after the retry budget (§4.8 Init).
    #[error("init failed after {attempts} attempt(s): {reason}")]
    InitFailure {
        /// Number of init attempts made before giving up.
        attempts: u32,
        /// Human-readable cause.
        reason: String,
    },

    /// A slave failed to reach Operation Enabled within the expected window.
    #[error("axis {axis} failed to reach OP: {reason}")]
    StateTransitionTimeout {
        /// Axis index (0-based).
        axis: usize,
        /// Human-readable cause.
        reason: String,
    },

    /// Statusword bit 3 observed on an axis. Non-fatal; handled by the
    /// Fault Supervisor + CiA 402 Driver within the same cycle.
    #[error("axis {axis} reported a drive fault (statusword=0x{statusword:04X})")]
    DriveFault {
        /// Axis index (0-based).
        axis: usize,
        /// Raw statusword observed.
        statusword: u16,
    },

    /// Wall-clock cycle time exceeded the configured budget. Logged, never
    /// fatal; the loop does not skip cycles or attempt to catch up.
    #[error("cycle overrun: {actual_ns}ns > {budget_ns}ns budget")]
    CycleOverrun {
        /// Actual cycle duration, nanoseconds.
        actual_ns: i64,
        /// Configured cycle budget, nanoseconds.
        budget_ns: i64,
    },

    /// A command was received that the core does not recognize. Ignored
    /// with a log entry.
    #[error("unknown command ignored: {detail}")]
    UnknownCommand {
        /// Diagnostic detail about the unrecognized command.
        detail: String,
    },

    /// An SDO or bus-level I/O error surfaced by the `EcMaster` collaborator.
    #[error("EtherCAT master I/O error: {0}")]
    MasterIo(String),
}

impl CoreError {
    /// Whether this error, per §7's propagation policy, must abort the
    /// control loop rather than being handled locally.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InitFailure { .. } | Self::StateTransitionTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_failure_and_timeout_are_fatal() {
        assert!(CoreError::InitFailure {
            attempts: 3,
            reason: "no slaves found".into()
        }
        .is_fatal());
        assert!(CoreError::StateTransitionTimeout {
            axis: 0,
            reason: "stuck in SafeOp".into()
        }
        .is_fatal());
    }

    #[test]
    fn drive_fault_and_overrun_and_unknown_command_are_non_fatal() {
        assert!(!CoreError::DriveFault {
            axis: 1,
            statusword: 0x0008
        }
        .is_fatal());
        assert!(!CoreError::CycleOverrun {
            actual_ns: 12_000_000,
            budget_ns: 10_000_000
        }
        .is_fatal());
        assert!(!CoreError::UnknownCommand {
            detail: "bad tag".into()
        }
        .is_fatal());
    }

    #[test]
    fn cycle_overrun_display_contains_both_values() {
        let err = CoreError::CycleOverrun {
            actual_ns: 12_000_000,
            budget_ns: 10_000_000,
        };
        let msg = format!("{err}");
        assert!(msg.contains("12000000"));
        assert!(msg.contains("10000000"));
    }
}
