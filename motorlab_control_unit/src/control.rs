//! Control engine root.
//!
//! Velocity PID, state-feedback (LQR) and open-loop voltage laws behind a
//! single [`controller::Controller`] that owns the clamp and the phase.

pub mod controller;
pub mod lqr;
pub mod pid;
