//! Velocity / angle estimation from the gyro rate.
//!
//! Two variants behind one enum so the tick path stays monomorphic:
//!
//! - **Direct**: velocity = measured rate. The angle is integrated only to
//!   commutate the motor.
//! - **Observer**: discrete Luenberger observer on x = (θ, ω) with the
//!   first-order motor model
//!   ```text
//!   θ⁻ = θ + dt·ω
//!   ω⁻ = a·ω + b·u          a = exp(−dt/τ), b = K·(1 − a)
//!   x  = x⁻ + L·(y − ω⁻)
//!   ```
//!   Velocity error evolves as e⁺ = a·(1 − L_ω)·e, so any 0 < L_ω < 1 is
//!   stable for every dt > 0.
//!
//! The first update after construction or [`StateEstimator::reset`] seeds ω
//! with the measurement.

use motorlab_common::control::{LqrParams, PlantModel};

/// Output of one estimator step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityEstimate {
    /// Mechanical shaft angle [rad].
    pub angle: f64,
    /// Shaft velocity [rad/s].
    pub velocity: f64,
}

/// Observer gains and model, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct ObserverGains {
    /// Correction gain on the angle.
    pub l_angle: f64,
    /// Correction gain on the velocity, stable for 0 < l < 1.
    pub l_velocity: f64,
    /// Plant model for the prediction step.
    pub model: PlantModel,
}

impl From<&LqrParams> for ObserverGains {
    fn from(p: &LqrParams) -> Self {
        Self {
            l_angle: p.observer[0],
            l_velocity: p.observer[1],
            model: p.model,
        }
    }
}

/// Velocity and angle estimate from gyro samples.
#[derive(Debug, Clone)]
pub enum StateEstimator {
    /// Gyro rate used as is; angle integrated for commutation.
    Direct {
        est: VelocityEstimate,
        seeded: bool,
    },
    /// Model prediction corrected by the measured rate.
    Observer {
        gains: ObserverGains,
        est: VelocityEstimate,
        /// Last applied command, drives the prediction.
        u: f64,
        seeded: bool,
    },
}

impl StateEstimator {
    /// Pass-through estimator with an integrated angle.
    pub fn direct() -> Self {
        Self::Direct {
            est: VelocityEstimate::default(),
            seeded: false,
        }
    }

    /// Luenberger observer on (angle, velocity).
    pub fn observer(gains: ObserverGains) -> Self {
        Self::Observer {
            gains,
            est: VelocityEstimate::default(),
            u: 0.0,
            seeded: false,
        }
    }

    /// Fold one rate sample taken `dt` seconds after the previous one.
    pub fn update(&mut self, rate: f64, dt: f64) -> VelocityEstimate {
        match self {
            Self::Direct { est, seeded } => {
                if *seeded && dt > 0.0 {
                    // Trapezoid keeps the commutation angle unbiased on ramps.
                    est.angle += 0.5 * (est.velocity + rate) * dt;
                }
                est.velocity = rate;
                *seeded = true;
                *est
            }
            Self::Observer {
                gains,
                est,
                u,
                seeded,
            } => {
                if !*seeded {
                    est.velocity = rate;
                    *seeded = true;
                    return *est;
                }
                if dt > 0.0 {
                    let a = (-dt / gains.model.time_constant).exp();
                    let b = gains.model.gain * (1.0 - a);
                    let angle_pred = est.angle + dt * est.velocity;
                    let vel_pred = a * est.velocity + b * *u;
                    let residual = rate - vel_pred;
                    est.angle = angle_pred + gains.l_angle * residual;
                    est.velocity = vel_pred + gains.l_velocity * residual;
                }
                *est
            }
        }
    }

    /// Keep the previous estimate when no sample is available this tick.
    #[inline]
    pub fn hold(&self) -> VelocityEstimate {
        self.estimate()
    }

    /// Record the command actually applied this tick.
    #[inline]
    pub fn observe_command(&mut self, volts: f64) {
        if let Self::Observer { u, .. } = self {
            *u = volts;
        }
    }

    /// Latest estimate.
    #[inline]
    pub fn estimate(&self) -> VelocityEstimate {
        match self {
            Self::Direct { est, .. } | Self::Observer { est, .. } => *est,
        }
    }

    /// Seeded by a first measurement since reset.
    #[inline]
    pub fn is_seeded(&self) -> bool {
        match self {
            Self::Direct { seeded, .. } | Self::Observer { seeded, .. } => *seeded,
        }
    }

    /// Back to zero; the next measurement seeds again.
    pub fn reset(&mut self) {
        match self {
            Self::Direct { est, seeded } => {
                *est = VelocityEstimate::default();
                *seeded = false;
            }
            Self::Observer { est, u, seeded, .. } => {
                *est = VelocityEstimate::default();
                *u = 0.0;
                *seeded = false;
            }
        }
    }
}
