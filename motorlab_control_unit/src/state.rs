//! Loop lifecycle state machine.

pub mod machine;
