//! Safety module root.
//!
//! Consecutive-fault escalation and the latched fatal stop.

pub mod monitor;
pub mod stop;
