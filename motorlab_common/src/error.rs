//! Fault taxonomy for the control loop.
//!
//! [`ControlFault`] is what a component returns; [`FaultFlags`] is the
//! accumulated per-run record exposed to diagnostics. Flags in
//! `FaultFlags::CRITICAL_MASK` always end in a fatal stop.

use bitflags::bitflags;
use thiserror::Error;

/// How the loop reacts to a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Hold previous state for this tick; escalates if repeated.
    Recoverable,
    /// Zero the command and halt.
    Fatal,
}

/// Error raised by a loop component during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ControlFault {
    /// Bus transaction to the gyro failed (no ACK, arbitration loss, ...).
    #[error("sensor at {address:#04x} unavailable")]
    SensorUnavailable { address: u8 },

    /// `WHO_AM_I` returned something other than an MPU6050.
    #[error("sensor identity mismatch: WHO_AM_I = {found:#04x}")]
    SensorMismatch { found: u8 },

    /// Tick interval was zero, negative or not finite.
    #[error("invalid tick interval dt = {dt}")]
    InvalidTick { dt: f64 },

    /// Command magnitude above the supply voltage reached the driver.
    #[error("actuator fault: |{requested} V| exceeds {limit} V supply")]
    ActuatorFault { requested: f64, limit: f64 },

    /// Phase driver refused the duty update.
    #[error("phase driver fault")]
    DriverFault,

    /// Too many consecutive ticks with a recoverable fault.
    #[error("{count} consecutive faulty ticks, last: {last}")]
    Escalated { count: u32, last: FaultFlags },
}

impl ControlFault {
    /// Whether the loop may hold and continue.
    pub const fn severity(&self) -> Severity {
        match self {
            Self::SensorUnavailable { .. } | Self::InvalidTick { .. } => Severity::Recoverable,
            Self::SensorMismatch { .. }
            | Self::ActuatorFault { .. }
            | Self::DriverFault
            | Self::Escalated { .. } => Severity::Fatal,
        }
    }

    /// Shorthand for `severity() == Severity::Fatal`.
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Fatal)
    }

    /// Flag recorded for this fault.
    pub const fn flag(&self) -> FaultFlags {
        match self {
            Self::SensorUnavailable { .. } | Self::SensorMismatch { .. } => {
                FaultFlags::SENSOR_UNAVAILABLE
            }
            Self::InvalidTick { .. } => FaultFlags::INVALID_TICK,
            Self::ActuatorFault { .. } => FaultFlags::ACTUATOR_FAULT,
            Self::DriverFault => FaultFlags::DRIVER_FAULT,
            Self::Escalated { .. } => FaultFlags::ESCALATED,
        }
    }
}

bitflags! {
    /// Faults observed since the last reset.
    ///
    /// CRITICAL: ACTUATOR_FAULT, DRIVER_FAULT, ESCALATED.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u16 {
        const SENSOR_UNAVAILABLE = 0x0001;
        const INVALID_TICK       = 0x0002;
        /// Command exceeded the supply at the driver. **CRITICAL**.
        const ACTUATOR_FAULT     = 0x0004;
        /// Hardware driver rejected an update. **CRITICAL**.
        const DRIVER_FAULT       = 0x0008;
        /// Recoverable faults repeated past the threshold. **CRITICAL**.
        const ESCALATED          = 0x0010;
        /// A tick finished after its deadline.
        const OVERRUN            = 0x0020;
        /// Velocity estimate above the profile limit.
        const OVERSPEED          = 0x0040;
    }
}

impl FaultFlags {
    /// Flags that mean the loop has stopped.
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::ACTUATOR_FAULT.bits() | Self::DRIVER_FAULT.bits() | Self::ESCALATED.bits(),
    );

    /// Any critical flag set.
    #[inline]
    pub const fn has_critical(&self) -> bool {
        self.intersects(Self::CRITICAL_MASK)
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl core::fmt::Display for FaultFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        bitflags::parser::to_writer(self, f)
    }
}
