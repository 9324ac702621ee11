//! Loop lifecycle: Stopped → Running → Faulted.
//!
//! Transitions:
//! - `Stopped` + `SensorReady` → `Running`
//! - `Stopped` + `InitFailed` → `Faulted`
//! - `Running` + `Shutdown` → `Stopped`
//! - any + `FatalFault` → `Faulted`
//! - `Faulted` + `Reset` → `Stopped`

use motorlab_common::state::LoopState;

/// Result of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Ok(LoopState),
    Rejected(&'static str),
}

/// Inputs to the loop state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// Sensor init sequence succeeded.
    SensorReady,
    /// Sensor init failed or identity mismatch.
    InitFailed,
    /// Shutdown flag observed between ticks.
    Shutdown,
    /// Fatal fault or escalation.
    FatalFault,
    /// Operator reset after a fault.
    Reset,
}

/// Stopped / Running / Faulted.
#[derive(Debug, Clone, Default)]
pub struct LoopStateMachine {
    state: LoopState,
}

impl LoopStateMachine {
    /// Machine in `Stopped`.
    pub const fn new() -> Self {
        Self {
            state: LoopState::Stopped,
        }
    }

    /// Current state.
    #[inline]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Apply `event`; invalid transitions leave the state unchanged.
    pub fn handle_event(&mut self, event: LoopEvent) -> TransitionResult {
        use LoopEvent::*;
        use LoopState::*;

        let next = match (self.state, event) {
            (Stopped, SensorReady) => Running,
            (Stopped, InitFailed) => Faulted,
            (Running, Shutdown) => Stopped,
            (_, FatalFault) => Faulted,
            (Faulted, Reset) => Stopped,
            (Faulted, _) => return TransitionResult::Rejected("Faulted: only Reset allowed"),
            (Stopped, _) => {
                return TransitionResult::Rejected("Stopped: only SensorReady or InitFailed allowed");
            }
            (Running, _) => return TransitionResult::Rejected("Running: invalid event"),
        };

        self.state = next;
        TransitionResult::Ok(next)
    }

    /// Only `Running` may apply a non-zero command.
    #[inline]
    pub const fn allows_actuation(&self) -> bool {
        matches!(self.state, LoopState::Running)
    }
}
