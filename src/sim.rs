//! In-memory [`EcMaster`] simulator (§9.4).
//!
//! Ships with the crate (not just the test suite) because the demo
//! binary has nowhere else to get slave behavior from: there is no
//! real fieldbus driver in scope (§1). Each simulated slave integrates
//! whatever target the loop last wrote, at a bounded slew rate, and
//! reports it back as the actual position next cycle — close enough to
//! a real CSP drive's tracking behavior to exercise the loop honestly.

use crate::codec::{decode_rxpdo, encode_txpdo, PDO_LEN};
use crate::master::{EcMaster, EcState, MasterError};

/// One simulated slave's internal state.
#[derive(Debug, Clone, Copy)]
struct SimSlave {
    statusword: u16,
    actual_pulse: i32,
    last_target: i32,
    /// Pulses per cycle the simulated drive can slew toward its target;
    /// `None` means it snaps instantly (useful for hold-position tests).
    slew_per_cycle: Option<i32>,
    stalled: bool,
}

impl SimSlave {
    fn new() -> Self {
        Self {
            statusword: 0x0021, // Ready to Switch On
            actual_pulse: 0,
            last_target: 0,
            slew_per_cycle: None,
            stalled: false,
        }
    }

    fn step(&mut self) {
        if self.stalled {
            return;
        }
        match self.slew_per_cycle {
            None => self.actual_pulse = self.last_target,
            Some(max_step) => {
                let delta = self.last_target - self.actual_pulse;
                let step = delta.clamp(-max_step, max_step);
                self.actual_pulse += step;
            }
        }
    }
}

/// In-memory [`EcMaster`]: no adapter, no wire, every slave simulated.
pub struct SimMaster {
    slaves: Vec<SimSlave>,
    outputs: Vec<[u8; PDO_LEN]>,
    inputs: Vec<[u8; PDO_LEN]>,
    state: EcState,
}

impl SimMaster {
    pub fn new(axis_count: usize) -> Self {
        Self {
            slaves: vec![SimSlave::new(); axis_count],
            outputs: vec![[0u8; PDO_LEN]; axis_count],
            inputs: vec![[0u8; PDO_LEN]; axis_count],
            state: EcState::Init,
        }
    }

    /// Force a slave's statusword, e.g. to inject a fault bit (§8 S4).
    pub fn set_statusword(&mut self, slave: usize, statusword: u16) {
        self.slaves[slave].statusword = statusword;
    }

    /// Seed a slave's actual position directly (e.g. after OP entry).
    pub fn set_actual_pulse(&mut self, slave: usize, actual_pulse: i32) {
        self.slaves[slave].actual_pulse = actual_pulse;
        self.slaves[slave].last_target = actual_pulse;
    }

    /// Bound how fast a slave can track its commanded target, pulses
    /// per `receive_processdata` call.
    pub fn set_slew_per_cycle(&mut self, slave: usize, pulses: i32) {
        self.slaves[slave].slew_per_cycle = Some(pulses);
    }

    /// Freeze a slave so it never moves regardless of target (§9.4
    /// "stall a slave").
    pub fn set_stalled(&mut self, slave: usize, stalled: bool) {
        self.slaves[slave].stalled = stalled;
    }

    pub fn actual_pulse(&self, slave: usize) -> i32 {
        self.slaves[slave].actual_pulse
    }

    /// Current EtherCAT application-layer state, e.g. to confirm a
    /// shutdown sequence actually dropped the bus back to `Init`.
    pub fn state(&self) -> EcState {
        self.state
    }
}

impl EcMaster for SimMaster {
    fn open(&mut self, _adapter: &str) -> Result<usize, MasterError> {
        self.state = EcState::PreOp;
        Ok(self.slaves.len())
    }

    fn sdo_read(&mut self, slave: usize, _index: u16, _sub: u8, buf: &mut [u8]) -> Result<usize, MasterError> {
        let n = buf.len().min(4);
        buf[..n].fill(0);
        Ok(n.min(self.slaves.len().saturating_sub(slave)))
    }

    fn sdo_write(&mut self, _slave: usize, _index: u16, _sub: u8, _data: &[u8]) -> Result<(), MasterError> {
        Ok(())
    }

    fn state_write(&mut self, state: EcState) -> Result<(), MasterError> {
        self.state = state;
        Ok(())
    }

    fn dc_sync(&mut self, _enable: bool, _period_ns: u64) -> Result<(), MasterError> {
        Ok(())
    }

    fn send_processdata(&mut self) -> Result<(), MasterError> {
        for (slave, output) in self.outputs.iter().enumerate() {
            let (_controlword, target) = decode_rxpdo(output);
            self.slaves[slave].last_target = target;
        }
        Ok(())
    }

    fn receive_processdata(&mut self) -> Result<(), MasterError> {
        for (slave, sim) in self.slaves.iter_mut().enumerate() {
            sim.step();
            self.inputs[slave] = encode_txpdo(sim.statusword, sim.actual_pulse);
        }
        Ok(())
    }

    fn output(&mut self, slave: usize) -> &mut [u8] {
        &mut self.outputs[slave]
    }

    fn input(&self, slave: usize) -> &[u8] {
        &self.inputs[slave]
    }

    fn slave_count(&self) -> usize {
        self.slaves.len()
    }

    fn close(&mut self) -> Result<(), MasterError> {
        self.state = EcState::Init;
        Ok(())
    }
}
