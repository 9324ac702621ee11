//! # motorlab Control Unit Library
//!
//! Fixed-period closed-loop velocity control for a gimbal BLDC motor with
//! MPU6050 gyro feedback.
//!
//! ## Pipeline (once per tick)
//!
//! 1. **SensorReader**: angular rate over an `embedded-hal` I2C bus
//! 2. **StateEstimator**: direct pass-through or Luenberger observer
//! 3. **Controller**: PID, LQR or open loop, clamped to the motor profile
//! 4. **ActuatorDriver**: q-axis voltage → inverse Park → SVPWM duties
//!
//! [`cycle::CycleRunner`] owns all four plus timing, fault escalation and
//! telemetry. [`sim`] provides a complete simulated rig for the binary,
//! integration tests and benches.

pub mod actuator;
pub mod config;
pub mod control;
pub mod cycle;
pub mod estimator;
pub mod safety;
pub mod sensor;
pub mod sim;
pub mod state;
pub mod telemetry;
