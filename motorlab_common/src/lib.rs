//! motorlab common library
//!
//! Shared constants, hardware profiles and configuration types for the
//! motorlab workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - GB2208 / MPU6050 defaults and numeric limits
//! - [`config`] - TOML loading trait and shared fields
//! - [`profile`] - [`profile::MotorProfile`]
//! - [`sensor`] - MPU6050 register map and [`sensor::SensorCalibration`]
//! - [`control`] - control law parameters and [`control::ControlCommand`]
//! - [`timing`] - `[loop]` table
//! - [`error`] - fault taxonomy
//! - [`state`] - loop/controller state enums
//! - [`telemetry`] - per-tick record

pub mod config;
pub mod consts;
pub mod control;
pub mod error;
pub mod profile;
pub mod sensor;
pub mod state;
pub mod telemetry;
pub mod timing;
