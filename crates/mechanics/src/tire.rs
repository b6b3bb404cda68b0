use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, require_finite, require_non_negative, require_positive};

/// How the slip denominator is protected near standstill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SlipRegularisation {
    /// Denominator floored at `floor` m/s.
    Regularised { floor: f64 },
    /// Raw `(v_hub - v_ground) / |v_ground|`; a zero ground velocity is an error.
    Exact,
}

impl Default for SlipRegularisation {
    fn default() -> Self {
        SlipRegularisation::Regularised { floor: 0.1 }
    }
}

/// Rear tyre: Pacejka magic formula coefficients and the quarter-car it carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TireParams {
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    /// Loaded radius (m)
    pub radius: f64,
    /// Combined vehicle and driver mass divided by four (kg)
    pub quarter_vehicle_mass: f64,
    pub rolling_resistance: f64,
    pub slip: SlipRegularisation,
}

impl Default for TireParams {
    fn default() -> Self {
        TireParams {
            b: 10.0,
            c: 1.9,
            d: 1.0,
            e: 0.97,
            // 18 inch rim
            radius: 18.0 * 0.0254 / 2.0,
            quarter_vehicle_mass: (215.0 + 68.0) / 4.0,
            rolling_resistance: 0.0,
            slip: SlipRegularisation::default(),
        }
    }
}

impl TireParams {
    pub fn with_rolling_resistance(mut self, coefficient: f64) -> Self {
        self.rolling_resistance = coefficient;
        self
    }

    pub fn with_slip(mut self, slip: SlipRegularisation) -> Self {
        self.slip = slip;
        self
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        require_finite("tire.b", self.b)?;
        require_finite("tire.c", self.c)?;
        require_finite("tire.d", self.d)?;
        require_finite("tire.e", self.e)?;
        require_positive("tire.radius", self.radius)?;
        require_positive("tire.quarter_vehicle_mass", self.quarter_vehicle_mass)?;
        require_non_negative("tire.rolling_resistance", self.rolling_resistance)?;
        if let SlipRegularisation::Regularised { floor } = self.slip {
            require_positive("tire.slip.floor", floor)?;
        }
        Ok(())
    }

    /// Longitudinal force (N) at slip ratio `k` under `normal_force`.
    pub fn longitudinal_force(&self, k: f64, normal_force: f64) -> f64 {
        magic_formula(self.b, self.c, self.d, self.e, k) * normal_force
    }

    /// Rolling resistance torque at the wheel, signed with `ground_velocity`.
    pub fn rolling_resistance_torque(&self, ground_velocity: f64, normal_force: f64) -> f64 {
        self.rolling_resistance * (4.0 * ground_velocity / 0.001).tanh() * normal_force * self.radius
    }
}

/// Normalised force `D sin(C atan(Bk - E(Bk - atan(Bk))))`.
pub fn magic_formula(b: f64, c: f64, d: f64, e: f64, k: f64) -> f64 {
    let bk = b * k;
    d * (c * (bk - e * (bk - bk.atan())).atan()).sin()
}

/// Ground-frame hub velocity of a wheel spinning at `wheel_velocity`.
///
/// The wheel joint is mounted so that forward travel is negative rotation.
pub fn wheel_hub_velocity(wheel_velocity: f64, radius: f64) -> f64 {
    -wheel_velocity * radius
}

pub fn slip_ratio(
    wheel_hub_velocity: f64,
    ground_velocity: f64,
    regularisation: SlipRegularisation,
) -> Result<f64, DynamicsError> {
    match regularisation {
        SlipRegularisation::Regularised { floor } => {
            let denominator = if wheel_hub_velocity > floor {
                ground_velocity.abs().max(floor)
            } else {
                floor
            };
            Ok((wheel_hub_velocity - ground_velocity) / denominator)
        }
        SlipRegularisation::Exact => {
            if ground_velocity == 0.0 {
                return Err(DynamicsError::SingularSlip {
                    wheel_hub_velocity,
                    ground_velocity,
                });
            }
            Ok((wheel_hub_velocity - ground_velocity) / ground_velocity.abs())
        }
    }
}
