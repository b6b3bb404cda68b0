use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, require_finite};

/// Motor velocity setpoint as a function of simulation time.
pub trait VelocityDemand {
    /// Demanded motor velocity (rad/s) at time `t`
    fn demand(&self, t: f64) -> f64;
}

impl<F> VelocityDemand for F
where
    F: Fn(f64) -> f64,
{
    fn demand(&self, t: f64) -> f64 {
        self(t)
    }
}

/// Zero until `activation_time`, then a constant `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDemand {
    /// Time at which the demand switches on (s)
    pub activation_time: f64,
    /// Demanded velocity once active (rad/s)
    pub target: f64,
}

impl Default for StepDemand {
    fn default() -> Self {
        StepDemand {
            activation_time: 1.0,
            target: 1000.0,
        }
    }
}

impl StepDemand {
    pub fn new(activation_time: f64, target: f64) -> Self {
        StepDemand { activation_time, target }
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        require_finite("demand.activation_time", self.activation_time)?;
        require_finite("demand.target", self.target)
    }
}

impl VelocityDemand for StepDemand {
    fn demand(&self, t: f64) -> f64 {
        if t >= self.activation_time { self.target } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_switches_at_activation_time() {
        let step = StepDemand::default();
        assert_eq!(step.demand(0.0), 0.0);
        assert_eq!(step.demand(0.999), 0.0);
        assert_eq!(step.demand(1.0), 1000.0);
        assert_eq!(step.demand(7.5), 1000.0);
    }

    #[test]
    fn test_closures_are_demands() {
        let ramp = |t: f64| 100.0 * t;
        assert_eq!(ramp.demand(2.0), 200.0);
    }

    #[test]
    fn test_validate() {
        assert!(StepDemand::new(0.5, 300.0).validate().is_ok());
        assert!(StepDemand::new(f64::NAN, 300.0).validate().is_err());
    }
}
