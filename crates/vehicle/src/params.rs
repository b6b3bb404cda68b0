use std::path::Path;

use control::{PiConfig, StepDemand};
use electrical::MotorParams;
use mechanics::{SuspensionParams, TireParams, TransmissionParams};
use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, SolverConfig, require_finite};

use crate::error::ConfigError;

/// What a driver loop does when a tick cannot be integrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the error to the caller
    #[default]
    Abort,
    /// Keep the previous state and skip actuation for this tick
    HoldPrevious,
}

/// Per-tick actuation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Gain from `-ω3` to the wheel joint target velocity
    pub wheel_command_gain: f64,
    pub failure_policy: FailurePolicy,
}

impl Default for TickConfig {
    fn default() -> Self {
        TickConfig {
            wheel_command_gain: 0.8,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Every parameter of the vehicle dynamics, validated as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParameters {
    pub suspension: SuspensionParams,
    pub tire: TireParams,
    pub motor: MotorParams,
    pub transmission: TransmissionParams,
    pub controller: PiConfig,
    pub demand: StepDemand,
    pub solver: SolverConfig,
    pub tick: TickConfig,
}

impl VehicleParameters {
    pub fn validate(&self) -> Result<(), DynamicsError> {
        self.suspension.validate()?;
        self.tire.validate()?;
        self.motor.validate()?;
        self.transmission.validate()?;
        self.controller.validate()?;
        self.demand.validate()?;
        self.solver.validate()?;
        require_finite("tick.wheel_command_gain", self.tick.wheel_command_gain)
    }

    /// Parses JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: VehicleParameters = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control::VoltageClamp;
    use simcore::Method;

    #[test]
    fn test_empty_json_gives_defaults() {
        let params = VehicleParameters::from_json_str("{}").unwrap();
        assert_eq!(params, VehicleParameters::default());
        assert_eq!(params.controller.saturation_limit, 500.0);
        assert_eq!(params.solver.tolerance, 0.05);
        assert_eq!(params.demand.target, 1000.0);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "controller": { "kp": 3.0, "clamp": "symmetric" },
            "solver": { "method": "stiff" },
            "tick": { "failure_policy": "hold_previous" }
        }"#;
        let params = VehicleParameters::from_json_str(json).unwrap();
        assert_eq!(params.controller.kp, 3.0);
        assert_eq!(params.controller.ki, 2.30);
        assert_eq!(params.controller.clamp, VoltageClamp::Symmetric);
        assert_eq!(params.solver.method, Method::Stiff);
        assert_eq!(params.tick.failure_policy, FailurePolicy::HoldPrevious);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = VehicleParameters::from_json_str(r#"{"suspension": {"body_mass": -1.0}}"#).unwrap_err();
        match err {
            ConfigError::Invalid(DynamicsError::InvalidParameters { field, .. }) => {
                assert_eq!(field, "suspension.body_mass")
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            VehicleParameters::from_json_str("{ not json").unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut params = VehicleParameters::default();
        params.tire.rolling_resistance = 0.015;
        let path = std::env::temp_dir().join(format!("vehicle-params-{}.json", std::process::id()));
        std::fs::write(&path, params.to_json_pretty().unwrap()).unwrap();
        let loaded = VehicleParameters::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.tire.rolling_resistance, 0.015);
        assert_eq!(loaded.controller, params.controller);
        let relative = |a: f64, b: f64| (a - b).abs() <= 1e-12 * b.abs();
        assert!(relative(loaded.suspension.pitch_inertia, params.suspension.pitch_inertia));
        assert!(relative(loaded.transmission.drive_stiffness, params.transmission.drive_stiffness));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = VehicleParameters::load("/nonexistent/vehicle.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/vehicle.json"));
    }
}
