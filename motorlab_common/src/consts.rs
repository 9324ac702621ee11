//! System-wide constants for the motorlab workspace.
//!
//! Single source of truth for numeric limits and the bench hardware defaults
//! (T-Motor GB2208 gimbal motor, InvenSense MPU6050 gyro).

use static_assertions::const_assert;

// ─── Loop timing ────────────────────────────────────────────────────

/// Default control period in microseconds (1 kHz).
pub const CYCLE_TIME_US: u32 = 1000;

/// Shortest accepted control period [µs].
pub const CYCLE_TIME_US_MIN: u32 = 100;

/// Longest accepted control period [µs]. The observer is tuned for ≤ 10 ms.
pub const CYCLE_TIME_US_MAX: u32 = 10_000;

/// Consecutive faulty ticks tolerated before a fatal stop.
pub const FAULT_ESCALATION_THRESHOLD_DEFAULT: u32 = 3;

/// Upper bound for the escalation threshold.
pub const FAULT_ESCALATION_THRESHOLD_MAX: u32 = 100;

/// Telemetry decimation default [ticks].
pub const TELEMETRY_INTERVAL_DEFAULT: u32 = 1;

// ─── GB2208 gimbal motor ────────────────────────────────────────────

/// Magnetic pole pairs of the GB2208.
pub const GB2208_POLE_PAIRS: u8 = 14;

/// Maximum q-axis voltage used by the controller [V].
pub const GB2208_MAX_VOLTAGE: f64 = 5.0;

/// Motor driver supply voltage [V].
pub const GB2208_SUPPLY_VOLTAGE: f64 = 7.5;

/// Velocity limit: 500 °/s in rad/s.
pub const GB2208_VELOCITY_LIMIT: f64 = 500.0 / 360.0 * core::f64::consts::TAU;

// ─── MPU6050 ────────────────────────────────────────────────────────

/// Default 7-bit I2C address (AD0 low). 0x69 with AD0 high.
pub const MPU6050_ADDRESS: u8 = 0x68;

/// Alternative I2C address (AD0 high).
pub const MPU6050_ADDRESS_ALT: u8 = 0x69;

const_assert!(GB2208_POLE_PAIRS > 0);
const_assert!(CYCLE_TIME_US_MIN <= CYCLE_TIME_US && CYCLE_TIME_US <= CYCLE_TIME_US_MAX);
const_assert!(FAULT_ESCALATION_THRESHOLD_DEFAULT >= 1);
