//! Control law parameters and the per-tick command value.
//!
//! A zero gain disables the corresponding term, the same convention the
//! PID and LQR stages follow at runtime.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Which control law drives the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Velocity PID on the raw gyro rate.
    #[default]
    Pid,
    /// State feedback on the observer estimate.
    Lqr,
    /// Reference is applied directly as a q-axis voltage.
    OpenLoop,
}

/// PID gains for the velocity loop [V per rad/s].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PidParams {
    /// Proportional gain [V/(rad/s)].
    #[serde(default)]
    pub kp: f64,
    /// Integral gain [V/rad] (0 = off).
    #[serde(default)]
    pub ki: f64,
    /// Derivative gain [V·s²/rad] (0 = off).
    #[serde(default)]
    pub kd: f64,
    /// Derivative low-pass time constant [s] (0 = unfiltered).
    #[serde(default)]
    pub tf: f64,
}

/// First-order motor model used by the observer.
///
/// ω̇ = (gain · u − ω) / time_constant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlantModel {
    /// Mechanical time constant [s].
    pub time_constant: f64,
    /// Steady-state velocity per volt [rad/s / V].
    pub gain: f64,
}

impl Default for PlantModel {
    fn default() -> Self {
        Self {
            time_constant: 0.05,
            gain: 4.0,
        }
    }
}

/// LQR feedback row and observer gains, tuned offline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LqrParams {
    /// Feedback gain K = [k_angle, k_velocity].
    pub k: [f64; 2],
    /// Observer gain L = [l_angle, l_velocity].
    pub observer: [f64; 2],
    /// Plant model used by the observer prediction.
    #[serde(default)]
    pub model: PlantModel,
}

impl Default for LqrParams {
    fn default() -> Self {
        Self {
            k: [0.0, 0.0],
            observer: [0.02, 0.3],
            model: PlantModel::default(),
        }
    }
}

/// Reference signal fed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceProfile {
    Constant { value: f64 },
    /// `initial` until `at_s`, `value` afterwards (step-response runs).
    Step { initial: f64, value: f64, at_s: f64 },
}

impl Default for ReferenceProfile {
    fn default() -> Self {
        Self::Constant { value: 0.0 }
    }
}

impl ReferenceProfile {
    /// Reference at `t` seconds since loop start.
    #[inline]
    pub fn at(&self, t: f64) -> f64 {
        match *self {
            Self::Constant { value } => value,
            Self::Step { initial, value, at_s } => {
                if t >= at_s {
                    value
                } else {
                    initial
                }
            }
        }
    }
}

/// `[control]` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ControlConfig {
    /// Control law driving the motor.
    #[serde(default)]
    pub mode: ControlMode,
    /// Reference over loop time.
    #[serde(default)]
    pub reference: ReferenceProfile,
    /// Gains for `mode = "pid"`.
    #[serde(default)]
    pub pid: PidParams,
    /// Gains for `mode = "lqr"`.
    #[serde(default)]
    pub lqr: LqrParams,
}

impl ControlConfig {
    /// Check gains, observer stability and the reference profile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pid;
        for (name, v) in [("kp", p.kp), ("ki", p.ki), ("kd", p.kd), ("tf", p.tf)] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "control.pid.{name} = {v} must be finite and >= 0"
                )));
            }
        }
        let l = &self.lqr;
        if l.k.iter().chain(l.observer.iter()).any(|g| !g.is_finite()) {
            return Err(ConfigError::ValidationError(
                "control.lqr gains must be finite".to_string(),
            ));
        }
        if self.mode == ControlMode::Lqr {
            // Velocity error dynamics are e⁺ = a(1 − L_ω)e, stable for 0 < L_ω < 1.
            if !(l.observer[1] > 0.0 && l.observer[1] < 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "control.lqr.observer[1] = {} must be in (0, 1)",
                    l.observer[1]
                )));
            }
            if !(l.model.time_constant > 0.0 && l.model.gain.is_finite()) {
                return Err(ConfigError::ValidationError(
                    "control.lqr.model.time_constant must be > 0".to_string(),
                ));
            }
        }
        match self.reference {
            ReferenceProfile::Constant { value } if !value.is_finite() => Err(
                ConfigError::ValidationError("control.reference must be finite".to_string()),
            ),
            ReferenceProfile::Step { initial, value, at_s }
                if !(initial.is_finite() && value.is_finite() && at_s >= 0.0) =>
            {
                Err(ConfigError::ValidationError(
                    "control.reference step must be finite with at_s >= 0".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// q-axis voltage for one tick. Only constructible already clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
pub struct ControlCommand(f64);

impl ControlCommand {
    /// No voltage.
    pub const ZERO: Self = Self(0.0);

    /// Clamp `volts` into [−ceiling, ceiling]. NaN maps to zero.
    #[inline]
    pub fn clamped(volts: f64, ceiling: f64) -> Self {
        if volts.is_nan() {
            return Self::ZERO;
        }
        Self(volts.clamp(-ceiling, ceiling))
    }

    /// Unchecked constructor for driver-level checks and tests.
    #[inline]
    pub const fn raw(volts: f64) -> Self {
        Self(volts)
    }

    /// q-axis voltage [V].
    #[inline]
    pub const fn volts(self) -> f64 {
        self.0
    }
}
