//! Vehicle dynamics core
//!
//! This crate provides:
//! - The drivetrain model: PI-controlled motor, transmission and rear tyre
//! - `VehicleParameters`, loadable from JSON
//! - `VehicleDynamics`, which runs suspension and drivetrain in order each tick

pub mod drivetrain;
pub mod dynamics;
pub mod error;
pub mod params;

pub use drivetrain::{DrivetrainModel, DrivetrainState, DrivetrainStep};
pub use dynamics::{ActuatorCommands, TickOutput, TickReport, TimestepInputs, VehicleDynamics, VehicleState};
pub use error::ConfigError;
pub use params::{FailurePolicy, TickConfig, VehicleParameters};
