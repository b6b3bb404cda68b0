use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, require_non_negative, require_positive};

/// Brushed-equivalent DC motor constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorParams {
    /// Armature inductance (H)
    pub inductance: f64,
    /// Armature resistance (Ω)
    pub resistance: f64,
    /// Rotor inertia (kg·m²)
    pub inertia: f64,
    /// Viscous damping (N·m·s/rad)
    pub damping: f64,
    /// Torque constant (N·m/A)
    pub kt: f64,
    /// Back-EMF constant (V·s/rad)
    pub ke: f64,
    pub efficiency: f64,
}

impl Default for MotorParams {
    fn default() -> Self {
        MotorParams::emrax_228()
    }
}

impl MotorParams {
    pub fn emrax_228() -> Self {
        MotorParams {
            inductance: 7.7e-5,
            resistance: 1.887,
            inertia: 0.0416,
            damping: 0.0006899,
            kt: 0.9437,
            ke: 0.8668,
            efficiency: 0.95,
        }
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        require_positive("motor.inductance", self.inductance)?;
        require_positive("motor.resistance", self.resistance)?;
        require_positive("motor.inertia", self.inertia)?;
        require_non_negative("motor.damping", self.damping)?;
        require_positive("motor.kt", self.kt)?;
        require_positive("motor.ke", self.ke)?;
        require_positive("motor.efficiency", self.efficiency)?;
        if self.efficiency > 1.0 {
            return Err(DynamicsError::invalid(
                "motor.efficiency",
                format!("must be <= 1, got {}", self.efficiency),
            ));
        }
        Ok(())
    }

    /// `di/dt` for armature `current` at shaft `velocity` under `voltage`
    pub fn current_derivative(&self, current: f64, velocity: f64, voltage: f64) -> f64 {
        (voltage - self.ke * velocity - self.resistance * current) / self.inductance
    }

    /// Electromagnetic torque delivered to the shaft after losses
    pub fn shaft_torque(&self, current: f64) -> f64 {
        self.kt * current * self.efficiency
    }

    /// `dω/dt` with `load_torque` acting on the rotor (positive accelerates)
    pub fn velocity_derivative(&self, current: f64, velocity: f64, load_torque: f64) -> f64 {
        (self.shaft_torque(current) - self.damping * velocity + load_torque) / self.inertia
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_current_rises_from_rest() {
        let motor = MotorParams::default();
        assert_relative_eq!(motor.current_derivative(0.0, 0.0, 100.0), 100.0 / 7.7e-5, max_relative = 1e-12);
        assert_eq!(motor.current_derivative(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_back_emf_balances_voltage() {
        let motor = MotorParams::default();
        let velocity = 100.0;
        let voltage = motor.ke * velocity;
        assert_relative_eq!(motor.current_derivative(0.0, velocity, voltage), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_velocity_derivative_includes_load_and_damping() {
        let motor = MotorParams::default();
        let free = motor.velocity_derivative(10.0, 0.0, 0.0);
        assert_relative_eq!(free, 0.9437 * 10.0 * 0.95 / 0.0416, max_relative = 1e-12);
        assert!(motor.velocity_derivative(10.0, 0.0, -5.0) < free);
        assert!(motor.velocity_derivative(0.0, 50.0, 0.0) < 0.0);
    }

    #[test]
    fn test_partial_json_keeps_emrax_defaults() {
        let motor: MotorParams = serde_json::from_str(r#"{"resistance": 2.0}"#).unwrap();
        assert_eq!(motor.resistance, 2.0);
        assert_eq!(motor.kt, MotorParams::emrax_228().kt);
        assert_eq!(motor.inductance, 7.7e-5);

        let text = serde_json::to_string(&MotorParams::default()).unwrap();
        let back: MotorParams = serde_json::from_str(&text).unwrap();
        assert!(back.validate().is_ok());
        assert_relative_eq!(back.ke, 0.8668, max_relative = 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(MotorParams::default().validate().is_ok());
        let bad = MotorParams {
            inductance: 0.0,
            ..MotorParams::default()
        };
        assert!(bad.validate().is_err());
        let bad = MotorParams {
            efficiency: 1.5,
            ..MotorParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
