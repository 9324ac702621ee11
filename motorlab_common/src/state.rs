//! State enums shared by the loop and its diagnostics.
//!
//! All enums use `#[repr(u8)]` so they can be logged or transported as a
//! single byte.

use serde::{Deserialize, Serialize};

/// Lifecycle of the control loop.
///
/// `Faulted` is terminal until an explicit reset; no command other than zero
/// is ever applied while in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum LoopState {
    /// Constructed, sensor not yet initialized.
    #[default]
    Stopped = 0,
    /// Sensor initialized, ticking.
    Running = 1,
    /// Fatal stop executed, actuation disabled.
    Faulted = 2,
}

impl LoopState {
    /// Decode a `#[repr(u8)]` value.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stopped),
            1 => Some(Self::Running),
            2 => Some(Self::Faulted),
            _ => None,
        }
    }
}

/// Controller history validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ControllerPhase {
    /// No previous error exists; derivative must be skipped.
    #[default]
    Uninitialized = 0,
    /// Steady cyclic operation.
    Running = 1,
}

/// What the scheduler does when a tick finishes after its next deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OverrunPolicy {
    /// Drop missed ticks; the next deadline stays on the period grid.
    #[default]
    Skip = 0,
    /// Run missed ticks immediately one after another until caught up.
    BackToBack = 1,
}
