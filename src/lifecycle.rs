//! Lifecycle Manager (§4.8): init retries, PREOP→SAFEOP→OP bring-up,
//! and the ordered shutdown sequence.
//!
//! Mirrors the teacher's staged bring-up/teardown style (`state/power.rs`'s
//! `PowerOnStep`/`PowerOffStep` sequence trackers) but specialized to the
//! CiA 402/EtherCAT object-dictionary sequence this core actually drives.

use std::time::Duration;

use crate::codec::{encode_rxpdo, PDO_LEN};
use crate::config::MachineConfig;
use crate::error::CoreError;
use crate::master::{EcMaster, EcState};

/// CSP mode of operation, 0x6060 sub 0.
const MODE_CSP: u8 = 8;

/// Held for several cycles during shutdown so drives latch the command.
const SHUTDOWN_PDO_REPEATS: u32 = 5;
const SHUTDOWN_PDO_PERIOD_MS: u64 = 20;

const CW_DISABLE_OPERATION: u16 = 0x0007;
const CW_SHUTDOWN: u16 = 0x0006;
const CW_DISABLE_VOLTAGE: u16 = 0x0000;

/// Bring `master` up through PREOP→SAFEOP→OP, configuring every slave's
/// CiA 402 CSP PDO mapping and safety parameters along the way (§4.8 Init).
///
/// Retries up to `config.init_attempts` times with `config.init_backoff_ms`
/// between attempts, as the distributed-clock handshake and slave startup
/// can transiently fail on a cold bus.
pub fn init<M: EcMaster>(master: &mut M, config: &MachineConfig) -> Result<(), CoreError> {
    let mut last_err = None;
    for attempt in 1..=config.init_attempts {
        match try_init(master, config) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(attempt, error = %e, "init attempt failed");
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(config.init_backoff_ms));
            }
        }
    }
    Err(CoreError::InitFailure {
        attempts: config.init_attempts,
        reason: last_err.map(|e| e.to_string()).unwrap_or_else(|| "unknown".into()),
    })
}

fn try_init<M: EcMaster>(master: &mut M, config: &MachineConfig) -> Result<(), CoreError> {
    let found = master
        .open(&config.adapter)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    let expected = config.axes.len();
    if found != expected {
        return Err(CoreError::MasterIo(format!(
            "expected {expected} slaves, found {found}"
        )));
    }

    for (slave, axis) in config.axes.iter().enumerate() {
        configure_slave(master, slave, axis, config.following_error_window)?;
    }

    master
        .state_write(EcState::PreOp)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    master
        .state_write(EcState::SafeOp)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    master
        .state_write(EcState::Op)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    master
        .dc_sync(true, config.cycle_time_us as u64 * 1_000)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;

    tracing::info!("bus reached OP");
    Ok(())
}

fn configure_slave<M: EcMaster>(
    master: &mut M,
    slave: usize,
    axis: &crate::config::AxisConfig,
    following_error_window: u32,
) -> Result<(), CoreError> {
    let sdo = |master: &mut M, index: u16, sub: u8, data: &[u8]| {
        master
            .sdo_write(slave, index, sub, data)
            .map_err(|e| CoreError::MasterIo(e.to_string()))
    };

    // Reset fault, then set CSP mode of operation (§4.8 step 2).
    sdo(master, 0x6040, 0x00, &0x0080u16.to_le_bytes())?;
    sdo(master, 0x6060, 0x00, &[MODE_CSP])?;

    // RxPDO mapping 0x1600: Controlword(0x6040:00:16), TargetPosition(0x607A:00:32).
    sdo(master, 0x1600, 0x01, &0x6040_0010u32.to_le_bytes())?;
    sdo(master, 0x1600, 0x02, &0x607A_0020u32.to_le_bytes())?;
    // TxPDO mapping 0x1A00: Statusword(0x6041:00:16), PositionActual(0x6064:00:32).
    sdo(master, 0x1A00, 0x01, &0x6041_0010u32.to_le_bytes())?;
    sdo(master, 0x1A00, 0x02, &0x6064_0020u32.to_le_bytes())?;
    // Assignment.
    sdo(master, 0x1C12, 0x01, &0x1600u16.to_le_bytes())?;
    sdo(master, 0x1C13, 0x01, &0x1A00u16.to_le_bytes())?;

    sdo(master, 0x6065, 0x00, &following_error_window.to_le_bytes())?;
    sdo(master, 0x6081, 0x00, &(axis.profile_velocity_rpm as u32).to_le_bytes())?;
    sdo(master, 0x6083, 0x00, &(axis.profile_acc_rpm_per_s as u32).to_le_bytes())?;
    sdo(master, 0x6084, 0x00, &(axis.profile_dec_rpm_per_s as u32).to_le_bytes())?;

    Ok(())
}

/// On OP entry, seed every axis's `target_pulse` from its measured
/// actual position so there is no initial following error (§4.8 step 4).
pub fn seed_targets_from_actual<M: EcMaster>(master: &mut M, axis_count: usize) -> Result<Vec<i64>, CoreError> {
    master
        .receive_processdata()
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    let mut targets = Vec::with_capacity(axis_count);
    for slave in 0..axis_count {
        let input = master.input(slave);
        let buf: [u8; PDO_LEN] = input
            .try_into()
            .map_err(|_| CoreError::MasterIo("short TxPDO buffer during seed".into()))?;
        let (_statusword, actual) = crate::codec::decode_txpdo(&buf);
        targets.push(actual as i64);
    }
    Ok(targets)
}

/// Ordered shutdown (§4.8): hold position, ramp the controlword down
/// through Disable Operation → Shutdown → Disable Voltage, then drop
/// the bus back to INIT.
pub fn shutdown<M: EcMaster>(master: &mut M, actual_pulses: &[i64]) -> Result<(), CoreError> {
    tracing::info!("beginning shutdown sequence");

    for _ in 0..SHUTDOWN_PDO_REPEATS {
        for (slave, &actual) in actual_pulses.iter().enumerate() {
            let frame = encode_rxpdo(CW_DISABLE_OPERATION, actual as i32);
            master.output(slave).copy_from_slice(&frame);
        }
        master
            .send_processdata()
            .map_err(|e| CoreError::MasterIo(e.to_string()))?;
        std::thread::sleep(Duration::from_millis(SHUTDOWN_PDO_PERIOD_MS));
    }

    for controlword in [CW_DISABLE_OPERATION, CW_SHUTDOWN, CW_DISABLE_VOLTAGE] {
        for (slave, &actual) in actual_pulses.iter().enumerate() {
            let frame = encode_rxpdo(controlword, actual as i32);
            master.output(slave).copy_from_slice(&frame);
        }
        master
            .send_processdata()
            .map_err(|e| CoreError::MasterIo(e.to_string()))?;
        std::thread::sleep(Duration::from_millis(SHUTDOWN_PDO_PERIOD_MS));
    }

    master
        .state_write(EcState::SafeOp)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    master
        .state_write(EcState::PreOp)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    master
        .state_write(EcState::Init)
        .map_err(|e| CoreError::MasterIo(e.to_string()))?;
    master.close().map_err(|e| CoreError::MasterIo(e.to_string()))?;

    tracing::info!("shutdown complete, bus closed");
    Ok(())
}
