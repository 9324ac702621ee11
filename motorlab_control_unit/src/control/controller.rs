//! Controller: control law + phase + held command.
//!
//! ## Phases
//! `Uninitialized` → first successful `compute_command` → `Running`.
//! The first tick skips the derivative (PID) and anchors the angle
//! reference (LQR). `reset()` returns to `Uninitialized`.
//!
//! ## Invalid ticks
//! dt ≤ 0 or non-finite → `ControlFault::InvalidTick`; state is untouched
//! and [`Controller::held_command`] keeps the last good command.

use motorlab_common::control::{ControlCommand, ControlConfig, ControlMode};
use motorlab_common::error::ControlFault;
use motorlab_common::profile::MotorProfile;
use motorlab_common::state::ControllerPhase;
use tracing::{debug, warn};

use super::lqr::{LqrGains, LqrState, lqr_compute};
use super::pid::{PidGains, PidState, pid_compute};
use crate::estimator::VelocityEstimate;

/// Control law together with its per-tick state.
#[derive(Debug, Clone)]
pub enum ControlLaw {
    /// Velocity PID.
    Pid { gains: PidGains, state: PidState },
    /// State feedback on the observer estimate.
    Lqr { gains: LqrGains, state: LqrState },
    /// Reference applied directly as Uq.
    OpenLoop,
}

impl ControlLaw {
    fn reset(&mut self) {
        match self {
            Self::Pid { state, .. } => state.reset(),
            Self::Lqr { state, .. } => state.reset(),
            Self::OpenLoop => {}
        }
    }

    /// Configured mode of this law.
    pub const fn mode(&self) -> ControlMode {
        match self {
            Self::Pid { .. } => ControlMode::Pid,
            Self::Lqr { .. } => ControlMode::Lqr,
            Self::OpenLoop => ControlMode::OpenLoop,
        }
    }
}

/// One control law plus the checks and clamps around it.
#[derive(Debug, Clone)]
pub struct Controller {
    law: ControlLaw,
    /// min(max_voltage, supply_voltage).
    ceiling: f64,
    velocity_limit: f64,
    phase: ControllerPhase,
    last: ControlCommand,
}

impl Controller {
    /// Controller for `law`, clamped to the profile's voltage ceiling.
    pub fn new(law: ControlLaw, profile: &MotorProfile) -> Self {
        Self {
            law,
            ceiling: profile.voltage_ceiling(),
            velocity_limit: profile.velocity_limit,
            phase: ControllerPhase::Uninitialized,
            last: ControlCommand::ZERO,
        }
    }

    /// Build the law selected by `cfg.mode`.
    pub fn from_config(cfg: &ControlConfig, profile: &MotorProfile) -> Self {
        let law = match cfg.mode {
            ControlMode::Pid => ControlLaw::Pid {
                gains: PidGains::from_params(&cfg.pid, profile.voltage_ceiling()),
                state: PidState::default(),
            },
            ControlMode::Lqr => ControlLaw::Lqr {
                gains: LqrGains { k: cfg.lqr.k },
                state: LqrState::default(),
            },
            ControlMode::OpenLoop => ControlLaw::OpenLoop,
        };
        Self::new(law, profile)
    }

    /// One control tick.
    pub fn compute_command(
        &mut self,
        reference: f64,
        estimate: &VelocityEstimate,
        dt: f64,
    ) -> Result<ControlCommand, ControlFault> {
        if !(dt > 0.0 && dt.is_finite()) {
            warn!(dt, held = self.last.volts(), "invalid tick, holding command");
            return Err(ControlFault::InvalidTick { dt });
        }

        let raw = match &mut self.law {
            ControlLaw::Pid { gains, state } => {
                let r = reference.clamp(-self.velocity_limit, self.velocity_limit);
                pid_compute(state, gains, r - estimate.velocity, dt)
            }
            ControlLaw::Lqr { gains, state } => {
                let r = reference.clamp(-self.velocity_limit, self.velocity_limit);
                lqr_compute(state, gains, r, estimate, dt)
            }
            ControlLaw::OpenLoop => reference,
        };

        if !raw.is_finite() {
            // Poisoned input; drop history rather than carry NaN forward.
            warn!(reference, velocity = estimate.velocity, "non-finite control output, resetting law");
            self.law.reset();
            self.phase = ControllerPhase::Uninitialized;
            self.last = ControlCommand::ZERO;
            return Ok(self.last);
        }

        if self.phase == ControllerPhase::Uninitialized {
            debug!(mode = ?self.law.mode(), "controller running");
            self.phase = ControllerPhase::Running;
        }

        self.last = ControlCommand::clamped(raw, self.ceiling);
        Ok(self.last)
    }

    /// Command from the last successful tick (zero before the first).
    #[inline]
    pub fn held_command(&self) -> ControlCommand {
        self.last
    }

    /// UNINITIALIZED until the first successful compute.
    #[inline]
    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    /// Active law and its state.
    #[inline]
    pub fn law(&self) -> &ControlLaw {
        &self.law
    }

    /// Output limit [V].
    #[inline]
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Clear the law state and return to UNINITIALIZED.
    pub fn reset(&mut self) {
        self.law.reset();
        self.phase = ControllerPhase::Uninitialized;
        self.last = ControlCommand::ZERO;
    }
}
