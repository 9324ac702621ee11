//! Latched fatal stop.
//!
//! On trigger: command forced to zero, power stage told via
//! `PhaseDriver::signal_fault`, loop state forced to `Faulted`. Once latched
//! no further command is ever applied until [`FatalStop::clear`].

use motorlab_common::control::ControlCommand;
use motorlab_common::error::ControlFault;
use tracing::error;

/// Latched fatal stop.
#[derive(Debug, Clone, Default)]
pub struct FatalStop {
    reason: Option<ControlFault>,
    /// Tick index at which the stop latched.
    at_tick: u64,
}

impl FatalStop {
    /// Unlatched stop.
    pub const fn new() -> Self {
        Self {
            reason: None,
            at_tick: 0,
        }
    }

    /// Latch the stop. Returns `false` if it was already latched; the first
    /// reason is kept.
    pub fn trigger(&mut self, reason: ControlFault, tick: u64) -> bool {
        if self.reason.is_some() {
            return false;
        }
        error!(%reason, tick, "fatal stop");
        self.reason = Some(reason);
        self.at_tick = tick;
        true
    }

    /// Stop has been triggered.
    #[inline]
    pub const fn is_latched(&self) -> bool {
        self.reason.is_some()
    }

    /// First fault that triggered the stop.
    #[inline]
    pub const fn reason(&self) -> Option<ControlFault> {
        self.reason
    }

    /// Tick index of the trigger.
    #[inline]
    pub const fn at_tick(&self) -> u64 {
        self.at_tick
    }

    /// Command permitted for this tick: `requested`, or zero when latched.
    #[inline]
    pub fn gate(&self, requested: ControlCommand) -> ControlCommand {
        if self.is_latched() {
            ControlCommand::ZERO
        } else {
            requested
        }
    }

    /// Operator reset.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
