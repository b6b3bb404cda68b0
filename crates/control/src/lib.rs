//! Control laws for the drivetrain
//!
//! This crate provides:
//! - A PI velocity controller with a configurable voltage clamp
//! - Velocity demand schedules

pub mod pi;
pub mod schedule;

pub use pi::*;
pub use schedule::*;
