//! Motor profile: pole-pair geometry and voltage limits.
//!
//! Immutable after startup. Every voltage the controller produces is bounded
//! by [`MotorProfile::voltage_ceiling`].

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::{
    GB2208_MAX_VOLTAGE, GB2208_POLE_PAIRS, GB2208_SUPPLY_VOLTAGE, GB2208_VELOCITY_LIMIT,
};

/// Highest supply voltage accepted by validation [V].
pub const SUPPLY_VOLTAGE_MAX: f64 = 60.0;

/// Electrical and mechanical limits of one motor (`[motor]` table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorProfile {
    /// Magnetic pole pairs.
    #[serde(default = "default_pole_pairs")]
    pub pole_pairs: u8,
    /// Maximum commanded q-axis voltage [V].
    #[serde(default = "default_max_voltage")]
    pub max_voltage: f64,
    /// Driver supply voltage [V].
    #[serde(default = "default_supply_voltage")]
    pub supply_voltage: f64,
    /// Velocity limit [rad/s]. References are clamped to ±this value.
    #[serde(default = "default_velocity_limit")]
    pub velocity_limit: f64,
}

fn default_pole_pairs() -> u8 {
    GB2208_POLE_PAIRS
}
fn default_max_voltage() -> f64 {
    GB2208_MAX_VOLTAGE
}
fn default_supply_voltage() -> f64 {
    GB2208_SUPPLY_VOLTAGE
}
fn default_velocity_limit() -> f64 {
    GB2208_VELOCITY_LIMIT
}

impl Default for MotorProfile {
    fn default() -> Self {
        Self::gb2208()
    }
}

impl MotorProfile {
    /// T-Motor GB2208 on a 7.5 V driver.
    pub const fn gb2208() -> Self {
        Self {
            pole_pairs: GB2208_POLE_PAIRS,
            max_voltage: GB2208_MAX_VOLTAGE,
            supply_voltage: GB2208_SUPPLY_VOLTAGE,
            velocity_limit: GB2208_VELOCITY_LIMIT,
        }
    }

    /// Electrical-per-mechanical angle multiplier (pole pairs / 2).
    #[inline]
    pub fn pole_pair_factor(&self) -> f64 {
        f64::from(self.pole_pairs) / 2.0
    }

    /// Largest voltage magnitude any command may carry.
    #[inline]
    pub fn voltage_ceiling(&self) -> f64 {
        self.max_voltage.min(self.supply_voltage)
    }

    /// Electrical angle for a mechanical shaft angle [rad].
    #[inline]
    pub fn electrical_angle(&self, mechanical: f64) -> f64 {
        mechanical * self.pole_pair_factor()
    }

    /// Bound checks; warns when `max_voltage` exceeds the supply.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pole_pairs == 0 {
            return Err(ConfigError::ValidationError(
                "motor.pole_pairs must be > 0".to_string(),
            ));
        }
        if !(self.supply_voltage > 0.0 && self.supply_voltage <= SUPPLY_VOLTAGE_MAX) {
            return Err(ConfigError::ValidationError(format!(
                "motor.supply_voltage {} out of range (0, {}]",
                self.supply_voltage, SUPPLY_VOLTAGE_MAX
            )));
        }
        if !(self.max_voltage > 0.0 && self.max_voltage.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "motor.max_voltage {} must be positive",
                self.max_voltage
            )));
        }
        if !(self.velocity_limit > 0.0 && self.velocity_limit.is_finite()) {
            return Err(ConfigError::ValidationError(format!(
                "motor.velocity_limit {} must be positive",
                self.velocity_limit
            )));
        }
        if self.max_voltage > self.supply_voltage {
            tracing::warn!(
                max_voltage = self.max_voltage,
                supply_voltage = self.supply_voltage,
                "max_voltage above supply, commands limited to supply"
            );
        }
        Ok(())
    }
}
