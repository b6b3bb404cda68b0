//! PI velocity controller with output saturation
//!
//! The integral accumulator is a state of the plant ODE, so the controller is
//! a pure function of `(demand, measurement, integral)` returning the voltage
//! and the rate at which the accumulator grows.

use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, require_finite, require_positive};

/// How the output voltage is limited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageClamp {
    /// Only `V > limit` is clipped; negative voltages pass through
    #[default]
    UpperOnly,
    /// Clipped to `[-limit, limit]`
    Symmetric,
}

/// Configuration for the PI controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiConfig {
    /// Proportional gain (V·s/rad)
    pub kp: f64,
    /// Integral gain (V/rad)
    pub ki: f64,
    /// Saturation voltage (V)
    pub saturation_limit: f64,
    pub clamp: VoltageClamp,
}

impl Default for PiConfig {
    fn default() -> Self {
        Self {
            kp: 4.61,
            ki: 2.30,
            saturation_limit: 500.0,
            clamp: VoltageClamp::UpperOnly,
        }
    }
}

impl PiConfig {
    pub fn pi(kp: f64, ki: f64) -> Self {
        Self { kp, ki, ..Default::default() }
    }

    /// Set the saturation voltage
    pub fn with_saturation_limit(mut self, limit: f64) -> Self {
        self.saturation_limit = limit;
        self
    }

    pub fn with_clamp(mut self, clamp: VoltageClamp) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        require_finite("controller.kp", self.kp)?;
        require_finite("controller.ki", self.ki)?;
        require_positive("controller.saturation_limit", self.saturation_limit)
    }

    /// Evaluates the control law for velocity `error = demand - measurement`.
    pub fn output(&self, demand: f64, measurement: f64, integral: f64) -> PiOutput {
        let error = demand - measurement;
        let unclamped = self.kp * error + integral;
        let voltage = match self.clamp {
            VoltageClamp::UpperOnly => unclamped.min(self.saturation_limit),
            VoltageClamp::Symmetric => unclamped.clamp(-self.saturation_limit, self.saturation_limit),
        };
        PiOutput {
            voltage,
            unclamped,
            integral_rate: self.ki * error,
        }
    }
}

/// One evaluation of the PI law
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiOutput {
    /// Voltage applied to the motor after the clamp
    pub voltage: f64,
    pub unclamped: f64,
    /// `d(integral)/dt`
    pub integral_rate: f64,
}

impl PiOutput {
    pub fn is_saturated(&self) -> bool {
        self.voltage != self.unclamped
    }
}
