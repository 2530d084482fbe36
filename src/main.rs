//! CSP motion control core — demo entry point.
//!
//! Loads a [`MachineConfig`], wires an in-memory [`SimMaster`] (there is
//! no real fieldbus driver in this crate's scope), brings the bus to
//! OP, and runs a short scripted move so the control loop can be
//! observed end to end without real hardware attached.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use csp_motion_core::command::Command;
use csp_motion_core::config::MachineConfig;
use csp_motion_core::sim::SimMaster;
use csp_motion_core::Controller;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "CiA 402 CSP motion control core (simulated EtherCAT master)")]
struct Cli {
    /// Path to the TOML machine configuration.
    #[arg(long, default_value = "machine.toml")]
    config: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match MachineConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(adapter = %config.adapter, axes = config.axes.len(), "starting control core");

    let master = SimMaster::new(config.axes.len());
    let controller = match Controller::start(master, config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to start control core");
            std::process::exit(1);
        }
    };

    info!("moving axis 0 to -50.00 mm");
    let _ = controller.enqueue(Command::MoveToMm {
        axis: 0,
        target_mm: -50.0,
    });

    std::thread::sleep(Duration::from_secs(2));
    if let Some(pos) = controller.current_position_mm(0, csp_motion_core::units::AxisKind::Z) {
        info!(position_mm = pos, "current position");
    }

    if let Err(e) = controller.stop() {
        tracing::error!(error = %e, "shutdown reported an error");
    }
}
