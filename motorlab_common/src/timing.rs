//! `[loop]` table: period, overrun policy and fault escalation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::consts::{
    CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN, FAULT_ESCALATION_THRESHOLD_DEFAULT,
    FAULT_ESCALATION_THRESHOLD_MAX, TELEMETRY_INTERVAL_DEFAULT,
};
use crate::state::OverrunPolicy;

/// Loop pacing and fault tolerance (`[loop]` table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Control period [µs] (default: 1000 = 1 kHz).
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// What happens after a tick misses its deadline (default: skip).
    #[serde(default)]
    pub overrun_policy: OverrunPolicy,

    /// Consecutive faulty ticks that trigger a fatal stop (default: 3).
    #[serde(default = "default_escalation")]
    pub fault_escalation_threshold: u32,

    /// Emit telemetry every N ticks (default: 1).
    #[serde(default = "default_telemetry_interval")]
    pub telemetry_interval: u32,
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}
fn default_escalation() -> u32 {
    FAULT_ESCALATION_THRESHOLD_DEFAULT
}
fn default_telemetry_interval() -> u32 {
    TELEMETRY_INTERVAL_DEFAULT
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            overrun_policy: OverrunPolicy::default(),
            fault_escalation_threshold: FAULT_ESCALATION_THRESHOLD_DEFAULT,
            telemetry_interval: TELEMETRY_INTERVAL_DEFAULT,
        }
    }
}

impl LoopConfig {
    /// Control period as a `Duration`.
    #[inline]
    pub fn period(&self) -> Duration {
        Duration::from_micros(u64::from(self.cycle_time_us))
    }

    /// Period in seconds.
    #[inline]
    pub fn dt(&self) -> f64 {
        f64::from(self.cycle_time_us) * 1e-6
    }

    /// Bound checks against the `CYCLE_TIME_US_*` and threshold limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_time_us < CYCLE_TIME_US_MIN || self.cycle_time_us > CYCLE_TIME_US_MAX {
            return Err(ConfigError::ValidationError(format!(
                "loop.cycle_time_us {} out of range [{}, {}]",
                self.cycle_time_us, CYCLE_TIME_US_MIN, CYCLE_TIME_US_MAX
            )));
        }
        if self.fault_escalation_threshold == 0
            || self.fault_escalation_threshold > FAULT_ESCALATION_THRESHOLD_MAX
        {
            return Err(ConfigError::ValidationError(format!(
                "loop.fault_escalation_threshold {} out of range [1, {}]",
                self.fault_escalation_threshold, FAULT_ESCALATION_THRESHOLD_MAX
            )));
        }
        if self.telemetry_interval == 0 {
            return Err(ConfigError::ValidationError(
                "loop.telemetry_interval must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
