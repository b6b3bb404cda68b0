//! Steady-state motor characteristics
//!
//! Closed-form operating points used to sanity check a parameter set before
//! a run, e.g. whether a velocity demand is reachable at the voltage limit.

use crate::motor::MotorParams;

impl MotorParams {
    /// Unloaded speed ignoring friction (rad/s)
    pub fn free_speed(&self, voltage: f64) -> f64 {
        voltage / self.ke
    }

    /// Locked-rotor current; no operating point with non-negative speed draws more.
    pub fn stall_current(&self, voltage: f64) -> f64 {
        voltage / self.resistance
    }

    /// Speed where electromagnetic torque equals viscous damping, no external load.
    pub fn no_load_speed(&self, voltage: f64) -> f64 {
        let gain = self.kt * self.efficiency / self.resistance;
        gain * voltage / (gain * self.ke + self.damping)
    }
}
