//! Velocity PID with backward Euler integration, optional derivative
//! filter (Tf), and clamping anti-windup.
//!
//! Zero Ki disables integral; zero Kd disables derivative. The derivative
//! term is skipped on the first call after construction or reset because no
//! previous error exists yet.

use motorlab_common::control::PidParams;

/// Internal state of the PID controller.
///
/// Preserves integral accumulator and filtered derivative across ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Σ(error · dt), already limited by anti-windup.
    integral: f64,
    /// Previous velocity error (for derivative).
    prev_error: f64,
    /// Filtered derivative (low-pass via Tf).
    derivative_filtered: f64,
    /// False until the first compute; gates the derivative.
    primed: bool,
}

impl PidState {
    /// Clear integral and derivative history.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Integral accumulator [rad].
    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// At least one compute since reset.
    #[inline]
    pub fn is_primed(&self) -> bool {
        self.primed
    }
}

/// PID gains plus the output limit needed for anti-windup.
#[derive(Debug, Clone, Copy)]
pub struct PidGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
    /// Derivative filter time constant [s] (0 = unfiltered).
    pub tf: f64,
    /// Output saturation [V].
    pub out_max: f64,
}

impl PidGains {
    /// Gains from configuration, limited to `out_max`.
    pub fn from_params(p: &PidParams, out_max: f64) -> Self {
        Self {
            kp: p.kp,
            ki: p.ki,
            kd: p.kd,
            tf: p.tf,
            out_max,
        }
    }
}

/// Compute one PID tick.
///
/// # Arguments
/// - `error`: reference − estimate [rad/s].
/// - `dt`: tick interval [s]; caller guarantees `dt > 0`.
///
/// # Returns
/// Raw output [V]. The integral is limited so that P + I + D stays inside
/// ±`out_max` whenever P + D alone does; final clamping is the caller's job.
#[inline]
pub fn pid_compute(state: &mut PidState, gains: &PidGains, error: f64, dt: f64) -> f64 {
    debug_assert!(dt > 0.0);

    // ── P term ──────────────────────────────────────────────
    let p_term = gains.kp * error;

    // ── D term (first tick skipped) ─────────────────────────
    let d_term = if gains.kd != 0.0 && state.primed {
        let raw_derivative = (error - state.prev_error) / dt;
        if gains.tf > 0.0 {
            let alpha = dt / (gains.tf + dt);
            state.derivative_filtered += alpha * (raw_derivative - state.derivative_filtered);
            gains.kd * state.derivative_filtered
        } else {
            gains.kd * raw_derivative
        }
    } else {
        state.derivative_filtered = 0.0;
        0.0
    };

    // ── I term (backward Euler, clamped) ────────────────────
    let i_term = if gains.ki != 0.0 {
        state.integral += error * dt;
        let pd = p_term + d_term;
        let hi = (gains.out_max - pd).max(0.0);
        let lo = (-gains.out_max - pd).min(0.0);
        let i = gains.ki * state.integral;
        if i > hi || i < lo {
            let limited = i.clamp(lo, hi);
            state.integral = limited / gains.ki;
            limited
        } else {
            i
        }
    } else {
        state.integral = 0.0;
        0.0
    };

    state.prev_error = error;
    state.primed = true;

    p_term + i_term + d_term
}

// ─── Tests ──────────────────────────────────────────────────────────
