//! Per-tick telemetry record.
//!
//! The loop only guarantees these four values; formatting (CSV for MATLAB,
//! JSON lines, ...) belongs to the sink.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// One (timestamp, reference, estimate, command) tuple — 4 × f64 = 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct TelemetrySample {
    /// Seconds since loop start.
    pub timestamp: f64,
    /// Reference velocity [rad/s] (or voltage in open loop).
    pub reference: f64,
    /// Velocity estimate [rad/s].
    pub estimate: f64,
    /// Applied q-axis voltage [V].
    pub command: f64,
}

const_assert_eq!(core::mem::size_of::<TelemetrySample>(), 32);

impl TelemetrySample {
    /// CSV header matching [`TelemetrySample::write_csv`].
    pub const CSV_HEADER: &'static str = "t,reference,estimate,command";

    /// Write one CSV row without a trailing newline.
    pub fn write_csv<W: core::fmt::Write>(&self, w: &mut W) -> core::fmt::Result {
        write!(
            w,
            "{:.6},{:.6},{:.6},{:.6}",
            self.timestamp, self.reference, self.estimate, self.command
        )
    }

    /// All four fields finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.timestamp.is_finite()
            && self.reference.is_finite()
            && self.estimate.is_finite()
            && self.command.is_finite()
    }
}
