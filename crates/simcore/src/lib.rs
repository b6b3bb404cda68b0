//! Shared building blocks for the vehicle dynamics models
//!
//! This crate provides:
//! - The `OdeSystem` trait implemented by every continuous-time model
//! - `TimeSpan`, the validated `[t0, t1]` interval of a simulation tick
//! - A stiffness-switching adaptive integrator (Dormand-Prince / Rosenbrock)
//! - The `DynamicsError` taxonomy and parameter validation helpers

pub mod error;
pub mod integrators;
pub mod traits;

pub use error::*;
pub use integrators::*;
pub use traits::*;
