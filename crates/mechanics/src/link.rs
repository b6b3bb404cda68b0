//! Transmission - Couples the motor shaft to the rear wheel
//!
//! Provides:
//! - Lumped two-stage gear transmission parameters (ratio, efficiency, inertias, torsional stiffnesses)
//! - Derivation of those parameters from shaft geometry and material
//! - Stribeck bearing friction

use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, require_non_negative, require_positive};

const GRAVITY: f64 = 9.81;

/// Isotropic shaft material
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Density (kg/m³)
    pub density: f64,
    /// Shear modulus (Pa)
    pub shear_modulus: f64,
}

impl Material {
    pub fn steel() -> Self {
        Material {
            density: 7850.0,
            shear_modulus: 79.3e9,
        }
    }

    pub fn aluminium() -> Self {
        Material {
            density: 2700.0,
            shear_modulus: 28.0e9,
        }
    }
}

/// Gear disc on a solid shaft
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShaftGeometry {
    /// Gear radius (m)
    pub radius: f64,
    /// Gear thickness (m)
    pub thickness: f64,
    /// Shaft length carrying the torque (m)
    pub length: f64,
    pub material: Material,
}

impl ShaftGeometry {
    /// Polar moment of area `πr⁴/2`
    fn polar_moment(&self) -> f64 {
        std::f64::consts::PI * self.radius.powi(4) / 2.0
    }

    /// Disc inertia `½ρπr⁴t` (kg·m²)
    pub fn inertia(&self) -> f64 {
        self.material.density * self.thickness * self.polar_moment()
    }

    /// Torsional stiffness `G·J/L` (N·m/rad)
    pub fn torsional_stiffness(&self) -> f64 {
        self.material.shear_modulus * self.polar_moment() / self.length
    }

    fn validate(&self, field: &str) -> Result<(), DynamicsError> {
        require_positive(&format!("{field}.radius"), self.radius)?;
        require_positive(&format!("{field}.thickness"), self.thickness)?;
        require_positive(&format!("{field}.length"), self.length)?;
        require_positive(&format!("{field}.material.density"), self.material.density)?;
        require_positive(&format!("{field}.material.shear_modulus"), self.material.shear_modulus)
    }
}

/// Bearing described by its friction coefficients and the shaft it supports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BearingFriction {
    pub static_coefficient: f64,
    pub dynamic_coefficient: f64,
    /// Supported mass (kg)
    pub mass: f64,
    /// Bore radius (m)
    pub radius: f64,
    /// Stribeck breakaway velocity (rad/s)
    pub breakaway_velocity: f64,
    /// Viscous coefficient (N·m·s/rad)
    pub viscous_coefficient: f64,
}

impl Default for BearingFriction {
    fn default() -> Self {
        BearingFriction {
            static_coefficient: 0.16,
            dynamic_coefficient: 0.12,
            mass: 0.119,
            radius: 0.011,
            breakaway_velocity: 0.1,
            viscous_coefficient: 0.0,
        }
    }
}

impl BearingFriction {
    pub fn new(mass: f64, radius: f64) -> Self {
        BearingFriction {
            mass,
            radius,
            ..Default::default()
        }
    }

    pub fn with_coefficients(mut self, static_coefficient: f64, dynamic_coefficient: f64) -> Self {
        self.static_coefficient = static_coefficient;
        self.dynamic_coefficient = dynamic_coefficient;
        self
    }

    pub fn with_viscous_coefficient(mut self, viscous: f64) -> Self {
        self.viscous_coefficient = viscous;
        self
    }

    /// Torque at the breakaway peak
    pub fn breakaway_torque(&self) -> f64 {
        self.static_coefficient * self.radius * self.mass * GRAVITY
    }

    /// Coulomb level reached once sliding
    pub fn coulomb_torque(&self) -> f64 {
        self.dynamic_coefficient * self.radius * self.mass * GRAVITY
    }

    /// Stribeck friction torque at angular velocity `w`.
    ///
    /// Odd in `w`; zero at standstill. Peaks near the breakaway velocity and
    /// decays to the Coulomb level plus the viscous term.
    pub fn torque(&self, w: f64) -> f64 {
        let stribeck_velocity = std::f64::consts::SQRT_2 * self.breakaway_velocity;
        let coulomb_velocity = self.breakaway_velocity / 10.0;
        let x = w / stribeck_velocity;
        (2.0 * std::f64::consts::E).sqrt()
            * (self.breakaway_torque() - self.coulomb_torque())
            * (-x * x).exp()
            * x
            + self.coulomb_torque() * (w / coulomb_velocity).tanh()
            + self.viscous_coefficient * w
    }

    fn validate(&self, field: &str) -> Result<(), DynamicsError> {
        require_non_negative(&format!("{field}.static_coefficient"), self.static_coefficient)?;
        require_non_negative(&format!("{field}.dynamic_coefficient"), self.dynamic_coefficient)?;
        require_non_negative(&format!("{field}.mass"), self.mass)?;
        require_non_negative(&format!("{field}.radius"), self.radius)?;
        require_positive(&format!("{field}.breakaway_velocity"), self.breakaway_velocity)?;
        require_non_negative(&format!("{field}.viscous_coefficient"), self.viscous_coefficient)
    }
}

/// Friction model for a transmission bearing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum FrictionModel {
    /// Frictionless
    #[default]
    None,
    /// Stribeck curve with Coulomb and viscous tails
    Stribeck(BearingFriction),
}

impl FrictionModel {
    /// Friction torque at angular velocity `w`
    pub fn compute(&self, w: f64) -> f64 {
        match self {
            FrictionModel::None => 0.0,
            FrictionModel::Stribeck(bearing) => bearing.torque(w),
        }
    }
}

/// Lumped two-stage transmission between motor and wheel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionParams {
    /// Driven over drive gear radius
    pub gear_ratio: f64,
    /// Power transfer efficiency (0, 1]
    pub efficiency: f64,
    /// Drive gear inertia (kg·m²)
    pub drive_inertia: f64,
    /// Driven gear inertia (kg·m²)
    pub driven_inertia: f64,
    /// Motor-side shaft stiffness (N·m/rad)
    pub drive_stiffness: f64,
    /// Wheel-side shaft stiffness (N·m/rad)
    pub driven_stiffness: f64,
    /// Wheel and tyre inertia (kg·m²)
    pub wheel_inertia: f64,
    /// Bearing on the drive shaft
    pub drive_bearing: FrictionModel,
    /// Bearing on the driven shaft
    pub driven_bearing: FrictionModel,
}

impl Default for TransmissionParams {
    fn default() -> Self {
        let drive = ShaftGeometry {
            radius: 0.024,
            thickness: 0.0059,
            length: 0.075,
            material: Material::steel(),
        };
        let driven = ShaftGeometry {
            radius: 0.0945,
            thickness: 0.005,
            length: 0.5,
            material: Material::aluminium(),
        };
        let wheel_radius = 18.0 * 0.0254 / 2.0;
        let wheel_mass = 20.0;
        TransmissionParams::from_geometry(&drive, &driven, 0.98, 0.5 * wheel_mass * wheel_radius * wheel_radius)
            .with_bearings(
                FrictionModel::Stribeck(BearingFriction::new(0.119, 0.011)),
                FrictionModel::Stribeck(BearingFriction::new(0.585, 0.0088)),
            )
    }
}

impl TransmissionParams {
    /// Derives ratio, inertias and stiffnesses from the two gear stages.
    pub fn from_geometry(
        drive: &ShaftGeometry,
        driven: &ShaftGeometry,
        efficiency: f64,
        wheel_inertia: f64,
    ) -> Self {
        TransmissionParams {
            gear_ratio: driven.radius / drive.radius,
            efficiency,
            drive_inertia: drive.inertia(),
            driven_inertia: driven.inertia(),
            drive_stiffness: drive.torsional_stiffness(),
            driven_stiffness: driven.torsional_stiffness(),
            wheel_inertia,
            drive_bearing: FrictionModel::None,
            driven_bearing: FrictionModel::None,
        }
    }

    /// Validates geometry before deriving.
    pub fn try_from_geometry(
        drive: &ShaftGeometry,
        driven: &ShaftGeometry,
        efficiency: f64,
        wheel_inertia: f64,
    ) -> Result<Self, DynamicsError> {
        drive.validate("transmission.drive")?;
        driven.validate("transmission.driven")?;
        let params = TransmissionParams::from_geometry(drive, driven, efficiency, wheel_inertia);
        params.validate()?;
        Ok(params)
    }

    pub fn with_bearings(mut self, drive: FrictionModel, driven: FrictionModel) -> Self {
        self.drive_bearing = drive;
        self.driven_bearing = driven;
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    /// Driven-side inertia including the drive gear reflected through the ratio.
    pub fn reflected_inertia(&self) -> f64 {
        self.driven_inertia + self.drive_inertia / self.efficiency * self.gear_ratio.powi(2)
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        require_positive("transmission.gear_ratio", self.gear_ratio)?;
        require_positive("transmission.efficiency", self.efficiency)?;
        if self.efficiency > 1.0 {
            return Err(DynamicsError::invalid(
                "transmission.efficiency",
                format!("must be <= 1, got {}", self.efficiency),
            ));
        }
        require_positive("transmission.drive_inertia", self.drive_inertia)?;
        require_positive("transmission.driven_inertia", self.driven_inertia)?;
        require_non_negative("transmission.drive_stiffness", self.drive_stiffness)?;
        require_non_negative("transmission.driven_stiffness", self.driven_stiffness)?;
        require_positive("transmission.wheel_inertia", self.wheel_inertia)?;
        for (field, bearing) in [
            ("transmission.drive_bearing", &self.drive_bearing),
            ("transmission.driven_bearing", &self.driven_bearing),
        ] {
            if let FrictionModel::Stribeck(b) = bearing {
                b.validate(field)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_transmission_matches_derived_constants() {
        let t = TransmissionParams::default();
        assert_relative_eq!(t.gear_ratio, 0.0945 / 0.024, max_relative = 1e-12);
        assert_relative_eq!(t.drive_inertia, 2.414e-5, max_relative = 1e-3);
        assert_relative_eq!(t.driven_inertia, 1.691e-3, max_relative = 1e-3);
        assert_relative_eq!(t.drive_stiffness, 5.51e5, max_relative = 1e-2);
        assert_relative_eq!(t.driven_stiffness, 7.0e6, max_relative = 1e-2);
        assert_relative_eq!(t.wheel_inertia, 0.5 * 20.0 * 0.2286 * 0.2286, max_relative = 1e-9);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_reflected_inertia() {
        let t = TransmissionParams::default();
        let expected = t.driven_inertia + t.drive_inertia / 0.98 * t.gear_ratio * t.gear_ratio;
        assert_relative_eq!(t.reflected_inertia(), expected, max_relative = 1e-12);
    }

    #[test]
    fn test_stribeck_friction_is_odd_and_zero_at_rest() {
        let bearing = BearingFriction::default();
        assert_eq!(bearing.torque(0.0), 0.0);
        for w in [0.01, 0.1, 1.0, 50.0] {
            assert_relative_eq!(bearing.torque(w), -bearing.torque(-w), max_relative = 1e-12);
            assert!(bearing.torque(w) > 0.0);
        }
    }

    #[test]
    fn test_stribeck_friction_settles_to_coulomb() {
        let bearing = BearingFriction::default();
        assert_relative_eq!(bearing.torque(100.0), bearing.coulomb_torque(), max_relative = 1e-9);
        // Breakaway bump above the Coulomb level
        let peak = bearing.torque(bearing.breakaway_velocity);
        assert!(peak > bearing.coulomb_torque());
        assert_relative_eq!(peak, bearing.breakaway_torque(), max_relative = 1e-3);

        let viscous = bearing.with_viscous_coefficient(0.01);
        assert_relative_eq!(
            viscous.torque(100.0),
            viscous.coulomb_torque() + 1.0,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_frictionless_model() {
        assert_eq!(FrictionModel::None.compute(12.0), 0.0);
        let model = FrictionModel::Stribeck(BearingFriction::default());
        assert!(model.compute(12.0) > 0.0);
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let mut drive = ShaftGeometry {
            radius: 0.024,
            thickness: 0.0059,
            length: 0.075,
            material: Material::steel(),
        };
        let driven = ShaftGeometry {
            radius: 0.0945,
            thickness: 0.005,
            length: 0.5,
            material: Material::aluminium(),
        };
        assert!(TransmissionParams::try_from_geometry(&drive, &driven, 0.98, 0.5).is_ok());
        drive.length = 0.0;
        let err = TransmissionParams::try_from_geometry(&drive, &driven, 0.98, 0.5).unwrap_err();
        assert!(err.to_string().contains("transmission.drive.length"));
        assert!(TransmissionParams::default().with_efficiency(1.2).validate().is_err());
    }

    #[test]
    fn test_bearing_json_roundtrip_tagging() {
        let model: FrictionModel =
            serde_json::from_str(r#"{"model": "stribeck", "mass": 0.5, "radius": 0.01}"#).unwrap();
        match model {
            FrictionModel::Stribeck(b) => {
                assert_eq!(b.mass, 0.5);
                assert_eq!(b.static_coefficient, 0.16);
            }
            FrictionModel::None => panic!("expected stribeck bearing"),
        }
    }
}
