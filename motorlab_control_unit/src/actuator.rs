//! q-axis voltage → three phase duties.
//!
//! ```text
//! θe = θm · pole_pair_factor
//! (vα, vβ) = invPark(vd = 0, vq = Uq, θe)
//! (va, vb, vc) = invClarke(vα, vβ)
//! duty_x = (vx + v0) / Vdc + 0.5,   v0 = −(max + min) / 2
//! ```
//!
//! The min/max zero-sequence injection gives the same linear range as
//! sector-based SVPWM (|Uq| ≤ Vdc/√3). Above that the duties saturate at
//! [0, 1].

use motorlab_common::control::ControlCommand;
use motorlab_common::error::ControlFault;
use motorlab_common::profile::MotorProfile;
use tracing::{error, info, warn};

const SQRT3_DIV_2: f64 = 0.866_025_403_784_438_6;

/// Normalized duty per phase, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseDuty {
    /// Phase U duty.
    pub u: f64,
    /// Phase V duty.
    pub v: f64,
    /// Phase W duty.
    pub w: f64,
}

impl PhaseDuty {
    /// All phases at mid-rail: zero line-to-line voltage.
    pub const NEUTRAL: Self = Self {
        u: 0.5,
        v: 0.5,
        w: 0.5,
    };

    /// Duties as `[u, v, w]`.
    #[inline]
    pub fn as_array(&self) -> [f64; 3] {
        [self.u, self.v, self.w]
    }
}

/// Power stage seam (PWM timer, simulated bridge, ...).
pub trait PhaseDriver {
    type Error: core::fmt::Debug;

    /// Write one set of duties, each in [0, 1].
    fn set_duties(&mut self, duty: PhaseDuty) -> Result<(), Self::Error>;

    /// Outputs off / high impedance.
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Called once on a fatal stop. Defaults to [`PhaseDriver::disable`].
    fn signal_fault(&mut self) -> Result<(), Self::Error> {
        self.disable()
    }
}

/// dq → αβ.
#[inline]
pub fn inverse_park(vd: f64, vq: f64, theta: f64) -> (f64, f64) {
    let (s, c) = theta.sin_cos();
    (vd * c - vq * s, vd * s + vq * c)
}

/// αβ → abc (amplitude invariant).
#[inline]
pub fn inverse_clarke(v_alpha: f64, v_beta: f64) -> (f64, f64, f64) {
    let a = v_alpha;
    let b = -0.5 * v_alpha + SQRT3_DIV_2 * v_beta;
    let c = -0.5 * v_alpha - SQRT3_DIV_2 * v_beta;
    (a, b, c)
}

/// Centered SVPWM duties for an αβ vector on a `v_dc` bus.
pub fn svpwm(v_alpha: f64, v_beta: f64, v_dc: f64) -> PhaseDuty {
    if v_dc <= 0.0 {
        return PhaseDuty::NEUTRAL;
    }
    let (a, b, c) = inverse_clarke(v_alpha, v_beta);
    let v0 = -(a.max(b).max(c) + a.min(b).min(c)) * 0.5;
    let duty = |x: f64| ((x + v0) / v_dc + 0.5).clamp(0.0, 1.0);
    PhaseDuty {
        u: duty(a),
        v: duty(b),
        w: duty(c),
    }
}

/// Turns a q-axis voltage into phase duties on a [`PhaseDriver`].
pub struct ActuatorDriver<D> {
    driver: D,
    profile: MotorProfile,
    supply_voltage: f64,
    last: PhaseDuty,
}

impl<D: PhaseDriver> ActuatorDriver<D> {
    /// Wrap `driver` for a motor with the given profile.
    pub fn new(driver: D, profile: &MotorProfile) -> Self {
        Self {
            driver,
            profile: *profile,
            supply_voltage: profile.supply_voltage,
            last: PhaseDuty::NEUTRAL,
        }
    }

    /// Commutate `command` at mechanical angle `mech_angle` and write the
    /// duties. Rejects magnitudes above the supply even if the caller skipped
    /// the controller clamp.
    pub fn apply_command(
        &mut self,
        command: ControlCommand,
        mech_angle: f64,
    ) -> Result<PhaseDuty, ControlFault> {
        let uq = command.volts();
        if !(uq.abs() <= self.supply_voltage) {
            error!(requested = uq, limit = self.supply_voltage, "command exceeds supply");
            return Err(ControlFault::ActuatorFault {
                requested: uq,
                limit: self.supply_voltage,
            });
        }

        let theta_e = self.profile.electrical_angle(mech_angle);
        let (va, vb) = inverse_park(0.0, uq, theta_e);
        let duty = svpwm(va, vb, self.supply_voltage);

        self.driver.set_duties(duty).map_err(|e| {
            error!(err = ?e, "phase driver rejected duties");
            ControlFault::DriverFault
        })?;
        self.last = duty;
        Ok(duty)
    }

    /// Drive all phases off.
    pub fn disable(&mut self) -> Result<(), ControlFault> {
        info!("actuator disabled");
        self.last = PhaseDuty::NEUTRAL;
        self.driver.disable().map_err(|e| {
            warn!(err = ?e, "driver disable failed");
            ControlFault::DriverFault
        })
    }

    /// Fatal-stop path: tell the power stage, never fails loudly.
    pub fn signal_fault(&mut self) {
        self.last = PhaseDuty::NEUTRAL;
        if let Err(e) = self.driver.signal_fault() {
            error!(err = ?e, "driver fault signal failed");
        }
    }

    /// Duties written by the last successful apply.
    #[inline]
    pub fn last_duty(&self) -> PhaseDuty {
        self.last
    }

    /// Underlying power stage.
    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Underlying power stage, mutable.
    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_2;

    #[derive(Default)]
    struct RecordingDriver {
        duties: Vec<PhaseDuty>,
        disabled: u32,
        faulted: u32,
        fail: bool,
    }

    impl PhaseDriver for RecordingDriver {
        type Error = &'static str;

        fn set_duties(&mut self, duty: PhaseDuty) -> Result<(), Self::Error> {
            if self.fail {
                return Err("bridge fault");
            }
            self.duties.push(duty);
            Ok(())
        }

        fn disable(&mut self) -> Result<(), Self::Error> {
            self.disabled += 1;
            Ok(())
        }

        fn signal_fault(&mut self) -> Result<(), Self::Error> {
            self.faulted += 1;
            self.disable()
        }
    }

    fn actuator() -> ActuatorDriver<RecordingDriver> {
        ActuatorDriver::new(RecordingDriver::default(), &MotorProfile::gb2208())
    }

    #[test]
    fn zero_command_is_neutral() {
        let mut a = actuator();
        for angle in [0.0, 0.7, 3.0, -2.0] {
            let d = a.apply_command(ControlCommand::ZERO, angle).unwrap();
            for x in d.as_array() {
                assert!((x - 0.5).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn duties_bounded_over_full_turn() {
        let mut a = actuator();
        for i in 0..360 {
            let angle = f64::from(i).to_radians();
            let d = a.apply_command(ControlCommand::raw(5.0), angle).unwrap();
            for x in d.as_array() {
                assert!((0.0..=1.0).contains(&x));
            }
        }
    }

    #[test]
    fn commutates_at_electrical_angle() {
        let profile = MotorProfile::gb2208();
        let mut a = actuator();
        // Quarter electrical turn: 7 electrical per mechanical radian.
        let mech = FRAC_PI_2 / 7.0;
        let d = a.apply_command(ControlCommand::raw(2.0), mech).unwrap();
        let (va, vb) = inverse_park(0.0, 2.0, profile.electrical_angle(mech));
        assert_eq!(d, svpwm(va, vb, profile.supply_voltage));
        // Pure −α: phase U lowest, V and W equal.
        assert!(d.u < d.v);
        assert!((d.v - d.w).abs() < 1e-12);
    }

    #[test]
    fn inverse_park_at_zero_angle_is_pure_beta() {
        let (a, b) = inverse_park(0.0, 2.0, 0.0);
        assert!(a.abs() < 1e-12);
        assert!((b - 2.0).abs() < 1e-12);
        let (a, b) = inverse_park(0.0, 2.0, FRAC_PI_2);
        assert!((a + 2.0).abs() < 1e-12);
        assert!(b.abs() < 1e-12);
    }

    #[test]
    fn svpwm_zero_sequence_centers_duties() {
        let d = svpwm(2.0, 1.0, 7.5);
        let [u, v, w] = d.as_array();
        let hi = u.max(v).max(w);
        let lo = u.min(v).min(w);
        assert!(((hi + lo) / 2.0 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn svpwm_line_to_line_matches_clarke() {
        let (va, vb) = (1.2, -0.4);
        let d = svpwm(va, vb, 7.5);
        let (a, b, _) = inverse_clarke(va, vb);
        assert!(((d.u - d.v) * 7.5 - (a - b)).abs() < 1e-12);
    }

    #[test]
    fn rejects_command_above_supply_even_unclamped() {
        let mut a = actuator();
        let err = a.apply_command(ControlCommand::raw(7.6), 0.0).unwrap_err();
        assert_eq!(
            err,
            ControlFault::ActuatorFault {
                requested: 7.6,
                limit: 7.5
            }
        );
        assert!(a.driver().duties.is_empty());
        assert!(a.apply_command(ControlCommand::raw(-8.0), 0.0).is_err());
        assert!(a.apply_command(ControlCommand::raw(f64::NAN), 0.0).is_err());
    }

    #[test]
    fn driver_error_is_driver_fault() {
        let mut a = actuator();
        a.driver_mut().fail = true;
        assert_eq!(
            a.apply_command(ControlCommand::raw(1.0), 0.0),
            Err(ControlFault::DriverFault)
        );
    }

    #[test]
    fn signal_fault_reaches_driver() {
        let mut a = actuator();
        a.apply_command(ControlCommand::raw(1.0), 0.3).unwrap();
        a.signal_fault();
        assert_eq!(a.driver().faulted, 1);
        assert_eq!(a.driver().disabled, 1);
        assert_eq!(a.last_duty(), PhaseDuty::NEUTRAL);
    }
}
