//! TOML configuration loading and validation (§9.3, §3 Axis configuration).
//!
//! Loads a [`MachineConfig`] from disk and validates it once, up front,
//! the way the teacher's `config.rs` validates `CuMachineConfig` before
//! the cycle loop ever sees it: parameter bounds, axis id uniqueness,
//! cycle-time sanity.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::units::AxisKind;

/// Maximum number of axes this core will drive (compile-time bound,
/// matching the teacher's fixed-array RT-safety convention).
pub const MAX_AXES: usize = 8;

/// Per-axis configuration (§3), immutable once the loop has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis id, used for logging and SDO addressing (0-based slave index).
    pub axis_id: usize,
    /// Physical axis geometry.
    pub kind: AxisKind,
    /// Profile velocity, RPM (default 60).
    #[serde(default = "default_profile_velocity_rpm")]
    pub profile_velocity_rpm: f64,
    /// Profile acceleration, RPM/s.
    #[serde(default = "default_profile_acc_rpm_per_s")]
    pub profile_acc_rpm_per_s: f64,
    /// Profile deceleration, RPM/s.
    #[serde(default = "default_profile_dec_rpm_per_s")]
    pub profile_dec_rpm_per_s: f64,
}

fn default_profile_velocity_rpm() -> f64 {
    60.0
}
fn default_profile_acc_rpm_per_s() -> f64 {
    600.0
}
fn default_profile_dec_rpm_per_s() -> f64 {
    600.0
}

/// Top-level machine configuration (§2, §4.8 Lifecycle Manager inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Network adapter name passed to `EcMaster::open`.
    pub adapter: String,
    /// Configured axes, in slave order.
    pub axes: Vec<AxisConfig>,
    /// Cycle period, microseconds (default 10_000 = 10ms, §1).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,
    /// Init retry budget (§4.8: up to 3 attempts).
    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,
    /// Backoff between init attempts, milliseconds (§4.8: 1s).
    #[serde(default = "default_init_backoff_ms")]
    pub init_backoff_ms: u64,
    /// Following Error Window written to 0x6065 at init (§4.8).
    #[serde(default = "default_following_error_window")]
    pub following_error_window: u32,
    /// Default cross-coupling gain (§9.5), `[0.0, 1.0]`.
    #[serde(default = "default_coupling_gain")]
    pub coupling_gain: f64,
    /// Position-difference emergency-stop threshold, pulses (§9.5).
    #[serde(default = "default_divergence_threshold_pulses")]
    pub divergence_threshold_pulses: i64,
    /// Consecutive cycles of divergence before tripping (§9.5).
    #[serde(default = "default_divergence_trip_cycles")]
    pub divergence_trip_cycles: u32,
}

fn default_cycle_time_us() -> u32 {
    10_000
}
fn default_init_attempts() -> u32 {
    3
}
fn default_init_backoff_ms() -> u64 {
    1_000
}
fn default_following_error_window() -> u32 {
    200_000_000
}
fn default_coupling_gain() -> f64 {
    0.10
}
fn default_divergence_threshold_pulses() -> i64 {
    2_000_000
}
fn default_divergence_trip_cycles() -> u32 {
    5
}

/// Configuration loading/validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config validation failed: {0}")]
    Validation(String),
}

impl MachineConfig {
    /// Load and validate a [`MachineConfig`] from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter bounds, axis id uniqueness, and cycle-time
    /// sanity. Called once at load time (§9.3).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.axes.is_empty() {
            return Err(ConfigError::Validation("at least one axis is required".into()));
        }
        if self.axes.len() > MAX_AXES {
            return Err(ConfigError::Validation(format!(
                "at most {MAX_AXES} axes supported, got {}",
                self.axes.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.axis_id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate axis_id {}",
                    axis.axis_id
                )));
            }
            if axis.profile_velocity_rpm <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "axis {} profile_velocity_rpm must be positive",
                    axis.axis_id
                )));
            }
            if axis.profile_acc_rpm_per_s <= 0.0 || axis.profile_dec_rpm_per_s <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "axis {} acceleration/deceleration must be positive",
                    axis.axis_id
                )));
            }
        }
        if self.cycle_time_us == 0 || self.cycle_time_us > 1_000_000 {
            return Err(ConfigError::Validation(
                "cycle_time_us must be in (0, 1_000_000]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.coupling_gain) {
            return Err(ConfigError::Validation(
                "coupling_gain must be within [0.0, 1.0]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_reads_and_validates_a_file_on_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_toml().as_bytes()).unwrap();
        let config = MachineConfig::load(file.path()).unwrap();
        assert_eq!(config.axes.len(), 2);
    }

    #[test]
    fn load_surfaces_io_error_for_missing_file() {
        let err = MachineConfig::load(Path::new("/nonexistent/machine.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    fn sample_toml() -> &'static str {
        r#"
            adapter = "eth0"

            [[axes]]
            axis_id = 0
            kind = "Z"

            [[axes]]
            axis_id = 1
            kind = "Z"
            profile_velocity_rpm = 80
        "#
    }

    #[test]
    fn loads_defaults_and_explicit_overrides() {
        let config: MachineConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(config.cycle_time_us, 10_000);
        assert_eq!(config.axes[0].profile_velocity_rpm, 60.0);
        assert_eq!(config.axes[1].profile_velocity_rpm, 80.0);
        assert_eq!(config.following_error_window, 200_000_000);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_duplicate_axis_ids() {
        let mut config: MachineConfig = toml::from_str(sample_toml()).unwrap();
        config.axes[1].axis_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_axis_list() {
        let config = MachineConfig {
            adapter: "eth0".into(),
            axes: vec![],
            cycle_time_us: 10_000,
            init_attempts: 3,
            init_backoff_ms: 1_000,
            following_error_window: 200_000_000,
            coupling_gain: 0.1,
            divergence_threshold_pulses: 2_000_000,
            divergence_trip_cycles: 5,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_coupling_gain_out_of_range() {
        let mut config: MachineConfig = toml::from_str(sample_toml()).unwrap();
        config.coupling_gain = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_nonpositive_velocity() {
        let mut config: MachineConfig = toml::from_str(sample_toml()).unwrap();
        config.axes[0].profile_velocity_rpm = 0.0;
        assert!(config.validate().is_err());
    }
}
