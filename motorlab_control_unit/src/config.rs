//! TOML configuration loader with validation.
//!
//! One file, five tables plus an optional simulation table:
//!
//! ```toml
//! [shared]   # log level, service name
//! [loop]     # period, overrun policy, escalation, telemetry decimation
//! [motor]    # pole pairs, voltage limits, velocity limit
//! [sensor]   # address, axis, range, DLPF, trim
//! [control]  # mode, reference, pid / lqr gains
//! [sim]      # simulated plant (binary only)
//! ```
//!
//! Validation runs per table, then across tables (sensor range vs velocity
//! limit, reference vs limits).

use std::path::Path;

use motorlab_common::config::{ConfigError, ConfigLoader, SharedConfig};
use motorlab_common::control::{ControlConfig, ControlMode, ReferenceProfile};
use motorlab_common::profile::MotorProfile;
use motorlab_common::sensor::SensorCalibration;
use motorlab_common::timing::LoopConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sim::SimConfig;

/// Whole control-unit configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControlUnitConfig {
    /// `[shared]`: service name and log level.
    #[serde(default)]
    pub shared: SharedConfig,
    /// `[loop]`: period, overrun policy, escalation.
    #[serde(rename = "loop", default)]
    pub loop_cfg: LoopConfig,
    /// `[motor]`: motor profile.
    #[serde(default)]
    pub motor: MotorProfile,
    /// `[sensor]`: gyro address, axis and range.
    #[serde(default)]
    pub sensor: SensorCalibration,
    /// `[control]`: mode, reference and gains.
    #[serde(default)]
    pub control: ControlConfig,
    /// `[sim]`: simulated rig.
    #[serde(default)]
    pub sim: SimConfig,
}

impl ControlUnitConfig {
    /// Per-table checks, then cross-table ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.loop_cfg.validate()?;
        self.motor.validate()?;
        self.sensor.validate()?;
        self.control.validate()?;
        self.sim.validate()?;
        self.validate_cross()
    }

    fn validate_cross(&self) -> Result<(), ConfigError> {
        let full_scale = self.sensor.range.full_scale_dps().to_radians();
        if full_scale < self.motor.velocity_limit {
            return Err(ConfigError::ValidationError(format!(
                "sensor.range ±{} °/s saturates below motor.velocity_limit {:.1} °/s",
                self.sensor.range.full_scale_dps(),
                self.motor.velocity_limit.to_degrees()
            )));
        }

        let (limit, unit) = match self.control.mode {
            ControlMode::OpenLoop => (self.motor.voltage_ceiling(), "V"),
            ControlMode::Pid | ControlMode::Lqr => (self.motor.velocity_limit, "rad/s"),
        };
        let peak = match self.control.reference {
            ReferenceProfile::Constant { value } => value.abs(),
            ReferenceProfile::Step { initial, value, .. } => initial.abs().max(value.abs()),
        };
        if peak > limit {
            warn!(peak, limit, unit, "reference exceeds limit and will be clamped");
        }
        Ok(())
    }
}

/// Load and validate the control unit configuration.
pub fn load_config(path: &Path) -> Result<ControlUnitConfig, ConfigError> {
    let cfg = ControlUnitConfig::load(path)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Parse and validate from a TOML string.
pub fn load_config_from_str(toml: &str) -> Result<ControlUnitConfig, ConfigError> {
    let cfg = ControlUnitConfig::from_toml(toml)?;
    cfg.validate()?;
    Ok(cfg)
}
