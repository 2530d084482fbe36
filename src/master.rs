//! `EcMaster`: the trait boundary standing in for the out-of-scope
//! EtherCAT master I/O collaborator (§6).
//!
//! The core never opens a NIC or speaks raw EtherCAT; it only calls
//! through this trait. A real master driver is wired in by whoever calls
//! [`crate::lifecycle::init`] and [`crate::lifecycle::shutdown`] (via
//! [`crate::api::Controller::start`]); this crate ships only the
//! in-memory [`crate::sim::SimMaster`] used by its own demo binary and
//! test suite.

/// EtherCAT application-layer slave state (ETG.1000 SOEM-style machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcState {
    Init,
    PreOp,
    SafeOp,
    Op,
}

/// Errors surfaced by an `EcMaster` implementation.
#[derive(Debug, thiserror::Error)]
pub enum MasterError {
    #[error("adapter open failed: {0}")]
    AdapterOpen(String),
    #[error("expected {expected} slaves, found {found}")]
    SlaveCountMismatch { expected: usize, found: usize },
    #[error("SDO access failed (slave={slave}, index=0x{index:04X}:{sub:02X}): {reason}")]
    SdoError {
        slave: usize,
        index: u16,
        sub: u8,
        reason: String,
    },
    #[error("state transition to {0:?} failed or timed out")]
    StateTransition(EcState),
    #[error("process data exchange failed: {0}")]
    ProcessData(String),
}

/// Out-of-scope EtherCAT master collaborator (§6): adapter lifecycle,
/// SDO access, and the cyclic `send`/`receive` process-data exchange.
pub trait EcMaster {
    /// Open the network adapter and enumerate slaves, returning the count
    /// found.
    fn open(&mut self, adapter: &str) -> Result<usize, MasterError>;

    /// Read an SDO entry into `buf`, returning the number of bytes read.
    fn sdo_read(&mut self, slave: usize, index: u16, sub: u8, buf: &mut [u8]) -> Result<usize, MasterError>;

    /// Write an SDO entry.
    fn sdo_write(&mut self, slave: usize, index: u16, sub: u8, data: &[u8]) -> Result<(), MasterError>;

    /// Request a bus state transition for all slaves (blocks until
    /// reached or failed, per the master's own timeout policy).
    fn state_write(&mut self, state: EcState) -> Result<(), MasterError>;

    /// Enable/disable Distributed Clock sync at the given period.
    fn dc_sync(&mut self, enable: bool, period_ns: u64) -> Result<(), MasterError>;

    /// Exchange one cycle's worth of process data: the master pulls the
    /// mutable output buffer for `slave` and pushes it to the wire.
    fn send_processdata(&mut self) -> Result<(), MasterError>;

    /// Latch and return the most recently received input buffer for
    /// `slave`, filling `buf`.
    fn receive_processdata(&mut self) -> Result<(), MasterError>;

    /// Mutable RxPDO output buffer for `slave` (§4.1 encode target).
    fn output(&mut self, slave: usize) -> &mut [u8];

    /// Readable TxPDO input buffer for `slave` (§4.1 decode target).
    fn input(&self, slave: usize) -> &[u8];

    /// Number of slaves the master knows about.
    fn slave_count(&self) -> usize;

    /// Close the adapter.
    fn close(&mut self) -> Result<(), MasterError>;
}
