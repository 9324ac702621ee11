//! State-feedback law u = −K·(x̂ − x_ref).
//!
//! x_ref = (θ_ref, ω_ref) where ω_ref is the velocity reference and θ_ref
//! its running integral, anchored to the estimated angle on the first tick
//! so enabling the loop does not produce a position kick. With a zero
//! reference from standstill this reduces to u = −K·x̂.

use crate::estimator::VelocityEstimate;

/// LQR state carried across ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LqrState {
    angle_ref: f64,
    primed: bool,
}

impl LqrState {
    /// Forget the angle anchor.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Integrated angle reference [rad].
    #[inline]
    pub fn angle_reference(&self) -> f64 {
        self.angle_ref
    }
}

/// Feedback row K = [k_angle, k_velocity].
#[derive(Debug, Clone, Copy)]
pub struct LqrGains {
    /// Gains on angle and velocity error.
    pub k: [f64; 2],
}

/// Compute one LQR tick. Returns the unclamped command [V].
#[inline]
pub fn lqr_compute(
    state: &mut LqrState,
    gains: &LqrGains,
    reference: f64,
    est: &VelocityEstimate,
    dt: f64,
) -> f64 {
    if state.primed {
        state.angle_ref += reference * dt;
    } else {
        state.angle_ref = est.angle;
        state.primed = true;
    }
    let e_angle = est.angle - state.angle_ref;
    let e_vel = est.velocity - reference;
    -(gains.k[0] * e_angle + gains.k[1] * e_vel)
}
