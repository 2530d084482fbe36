//! Real-time CiA 402 CSP control core for multi-axis EtherCAT motion.
//!
//! The [`api::Controller`] is the only surface a user-facing collaborator
//! needs: `Controller::start` brings the bus to OP and forks the Control
//! Loop onto a dedicated thread; `enqueue`/`snapshot` talk to it from
//! any other thread. Everything else in this crate is the loop's own
//! internals — CiA 402 state driving, trajectory generation, multi-axis
//! synchronization, fault supervision, and the EtherCAT lifecycle.

pub mod api;
pub mod cia402;
pub mod codec;
pub mod command;
pub mod config;
pub mod coupling;
pub mod cycle;
pub mod error;
pub mod fault;
pub mod lifecycle;
pub mod master;
pub mod shared_state;
pub mod sim;
pub mod sync;
pub mod trajectory;
pub mod units;

pub use api::Controller;
pub use command::Command;
pub use config::MachineConfig;
pub use error::CoreError;
