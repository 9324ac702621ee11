//! Fault classification and escalation.
//!
//! ## Escalation Model
//!
//! - **Recoverable** faults (`SensorUnavailable`, `InvalidTick`) hold the
//!   previous estimate or command for one tick. The first one in a tick
//!   bumps a consecutive-tick counter; further faults in the same tick only
//!   add flags. [`FaultMonitor::end_tick`] clears the counter after a clean
//!   tick.
//! - Reaching `threshold` consecutive faulty ticks yields
//!   `ControlFault::Escalated`, which is fatal.
//! - **Fatal** faults pass straight through.
//!
//! Every fault seen is OR-ed into a sticky [`FaultFlags`] record.

use motorlab_common::error::{ControlFault, FaultFlags, Severity};
use tracing::warn;

/// What the loop must do after a fault was reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultVerdict {
    /// Hold previous state and keep ticking.
    Hold,
    /// Execute the fatal stop with this fault as reason.
    Stop(ControlFault),
}

/// Sticky fault record and consecutive-tick escalation.
#[derive(Debug, Clone)]
pub struct FaultMonitor {
    /// Consecutive faulty ticks that escalate.
    threshold: u32,
    /// Faulty ticks in the current streak.
    consecutive: u32,
    /// Current tick already counted toward the streak.
    tick_faulted: bool,
    flags: FaultFlags,
    total_recoverable: u64,
}

impl FaultMonitor {
    /// Monitor that escalates after `threshold` faulty ticks.
    pub const fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive: 0,
            tick_faulted: false,
            flags: FaultFlags::empty(),
            total_recoverable: 0,
        }
    }

    /// Classify one fault.
    pub fn report(&mut self, fault: ControlFault) -> FaultVerdict {
        self.flags |= fault.flag();
        match fault.severity() {
            Severity::Fatal => FaultVerdict::Stop(fault),
            Severity::Recoverable => {
                self.total_recoverable += 1;
                if !self.tick_faulted {
                    self.tick_faulted = true;
                    self.consecutive += 1;
                }
                if self.consecutive >= self.threshold {
                    let escalated = ControlFault::Escalated {
                        count: self.consecutive,
                        last: fault.flag(),
                    };
                    self.flags |= FaultFlags::ESCALATED;
                    FaultVerdict::Stop(escalated)
                } else {
                    warn!(
                        %fault,
                        consecutive = self.consecutive,
                        threshold = self.threshold,
                        "recoverable fault, holding"
                    );
                    FaultVerdict::Hold
                }
            }
        }
    }

    /// Close the current tick: a tick without recoverable faults ends the
    /// streak.
    #[inline]
    pub fn end_tick(&mut self) {
        if !self.tick_faulted {
            self.consecutive = 0;
        }
        self.tick_faulted = false;
    }

    /// Record a non-fault condition (overrun, overspeed).
    #[inline]
    pub fn note(&mut self, flag: FaultFlags) {
        self.flags |= flag;
    }

    /// Faulty ticks in the current streak.
    #[inline]
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    /// Everything seen since reset.
    #[inline]
    pub fn flags(&self) -> FaultFlags {
        self.flags
    }

    /// Recoverable faults seen since reset.
    #[inline]
    pub fn total_recoverable(&self) -> u64 {
        self.total_recoverable
    }

    /// Clear flags and streak, keep the threshold.
    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }
}
