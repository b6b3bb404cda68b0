pub mod analysis;
pub mod motor;

pub use motor::MotorParams;
