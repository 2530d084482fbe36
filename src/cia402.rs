//! CiA 402 Driver (§4.2): statusword → controlword selection.
//!
//! Stateless beyond `last_controlword`, which exists only for
//! change-detection logging in the Control Loop.

use bitflags::bitflags;

bitflags! {
    /// Controlword bits (CiA 402 object 0x6040).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Controlword: u16 {
        const SWITCH_ON        = 0x0001;
        const ENABLE_VOLTAGE   = 0x0002;
        const QUICK_STOP       = 0x0004;
        const ENABLE_OPERATION = 0x0008;
        const FAULT_RESET      = 0x0080;
    }
}

/// Controlword: Shutdown (Ready to Switch On).
pub const CW_SHUTDOWN: u16 = Controlword::ENABLE_VOLTAGE.bits() | Controlword::QUICK_STOP.bits();
/// Controlword: Switch On (Switched On).
pub const CW_SWITCH_ON: u16 = CW_SHUTDOWN | Controlword::SWITCH_ON.bits();
/// Controlword: Enable Operation.
pub const CW_ENABLE_OPERATION: u16 = CW_SWITCH_ON | Controlword::ENABLE_OPERATION.bits();
/// Controlword: Fault Reset.
pub const CW_FAULT_RESET: u16 = Controlword::FAULT_RESET.bits();
/// Controlword: Disable Voltage.
pub const CW_DISABLE_VOLTAGE: u16 = 0x0000;

bitflags! {
    /// Statusword bits (CiA 402 object 0x6041) relevant to this core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Statusword: u16 {
        const READY_TO_SWITCH_ON = 0x0001;
        const SWITCHED_ON        = 0x0002;
        const OPERATION_ENABLED  = 0x0004;
        const FAULT              = 0x0008;
        const SWITCH_ON_DISABLED = 0x0040;
    }
}

const SW_FAULT_BIT: u16 = Statusword::FAULT.bits();
const SW_SWITCH_ON_DISABLED_MASK: u16 = 0x004F;
const SW_SWITCH_ON_DISABLED_VAL: u16 = Statusword::SWITCH_ON_DISABLED.bits();
const SW_POWER_MASK: u16 = 0x006F;
const SW_READY_VAL: u16 = Statusword::READY_TO_SWITCH_ON.bits();
const SW_SWITCHED_ON_VAL: u16 = Statusword::READY_TO_SWITCH_ON.bits() | Statusword::SWITCHED_ON.bits();
const SW_OP_ENABLED_VAL: u16 =
    Statusword::READY_TO_SWITCH_ON.bits() | Statusword::SWITCHED_ON.bits() | Statusword::OPERATION_ENABLED.bits();

/// Drive power state as decoded from the statusword mask (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    OperationEnabled,
    Fault,
    Other,
}

/// Classify a raw statusword into a [`DriveState`] (§4.2 mask table).
///
/// Fault takes priority: a statusword can show a stale power-state mask
/// while bit 3 is set, and the controller must still see `Fault`.
pub fn classify(statusword: u16) -> DriveState {
    if statusword & SW_FAULT_BIT != 0 {
        return DriveState::Fault;
    }
    if statusword & SW_SWITCH_ON_DISABLED_MASK == SW_SWITCH_ON_DISABLED_VAL {
        DriveState::SwitchOnDisabled
    } else if statusword & SW_POWER_MASK == SW_READY_VAL {
        DriveState::ReadyToSwitchOn
    } else if statusword & SW_POWER_MASK == SW_SWITCHED_ON_VAL {
        DriveState::SwitchedOn
    } else if statusword & SW_POWER_MASK == SW_OP_ENABLED_VAL {
        DriveState::OperationEnabled
    } else {
        DriveState::Other
    }
}

/// Per-slave CiA 402 driver. Holds nothing but the last emitted
/// controlword, kept for change-detection logging by the Control Loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cia402Driver {
    last_controlword: u16,
}

impl Cia402Driver {
    /// Create a new driver with no prior controlword.
    pub const fn new() -> Self {
        Self {
            last_controlword: 0,
        }
    }

    /// Select the controlword for the next cycle from the observed
    /// statusword (§4.2). Returns `(controlword, may_update_trajectory)`;
    /// the latter is `true` only in `OperationEnabled`.
    pub fn next_controlword(&mut self, statusword: u16) -> (u16, bool) {
        let (cw, may_move) = match classify(statusword) {
            DriveState::Fault => (CW_FAULT_RESET, false),
            DriveState::SwitchOnDisabled => (CW_SHUTDOWN, false),
            DriveState::ReadyToSwitchOn => (CW_SWITCH_ON, false),
            DriveState::SwitchedOn => (CW_ENABLE_OPERATION, false),
            DriveState::OperationEnabled => (CW_ENABLE_OPERATION, true),
            DriveState::Other => (CW_SHUTDOWN, false),
        };
        self.last_controlword = cw;
        (cw, may_move)
    }

    /// Last controlword emitted by this driver.
    #[inline]
    pub const fn last_controlword(&self) -> u16 {
        self.last_controlword
    }
}
