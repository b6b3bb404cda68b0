//! Half-car ride/pitch model with a coupled cornering roll stage
//!
//! Each tick solves two 4-state systems back to back:
//! - heave and pitch driven by the road height and the longitudinal pitching moment
//! - roll-heave and roll driven by the centripetal load, seeded from the first result
//!
//! Reaction forces are reported per axle from the heave/pitch result and
//! include the static share of the sprung weight.

use log::trace;
use serde::{Deserialize, Serialize};
use simcore::{
    DynamicsError, OdeSystem, SolverConfig, TimeSpan, integrate, require_finite, require_non_negative,
    require_positive,
};

/// Sprung body, spring and damper parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionParams {
    /// Front hub to centre of gravity (m)
    pub lf: f64,
    /// Rear hub to centre of gravity (m)
    pub lr: f64,
    /// Lateral offset of the right hub (m)
    pub hub_offset_right: f64,
    /// Lateral offset of the left hub (m)
    pub hub_offset_left: f64,
    pub body_mass: f64,
    /// Pitch inertia, also used for roll (kg·m²)
    pub pitch_inertia: f64,
    pub kf: f64,
    pub kr: f64,
    pub cf: f64,
    pub cr: f64,
    pub gravity: f64,
    pub turning_radius_min: f64,
    pub turning_radius_max: f64,
}

/// Values measured on the rig from which [`SuspensionParams`] are derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigMeasurements {
    pub lf: f64,
    pub lr: f64,
    pub hub_offset_right: f64,
    pub hub_offset_left: f64,
    pub body_mass: f64,
    /// Body length used for the box pitch inertia (m)
    pub body_length: f64,
    /// Body height used for the box pitch inertia (m)
    pub body_height: f64,
    pub kf: f64,
    pub kr: f64,
    pub unsprung_mass_front: f64,
    pub unsprung_mass_rear: f64,
    pub damping_ratio: f64,
    pub gravity: f64,
    pub turning_radius_min: f64,
    pub turning_radius_max: f64,
}

impl Default for RigMeasurements {
    fn default() -> Self {
        RigMeasurements {
            lf: 0.765,
            lr: 0.765,
            hub_offset_right: 0.76,
            hub_offset_left: 0.70,
            body_mass: 215.0 + 68.0,
            body_length: 2.9,
            body_height: 0.6,
            kf: 35_000.0,
            kr: 35_000.0,
            unsprung_mass_front: 35.0,
            unsprung_mass_rear: 38.0,
            damping_ratio: 1.0,
            gravity: 9.81,
            turning_radius_min: 10.5,
            turning_radius_max: 13.5,
        }
    }
}

impl Default for SuspensionParams {
    fn default() -> Self {
        SuspensionParams::from_rig(&RigMeasurements::default())
    }
}

impl SuspensionParams {
    /// Box pitch inertia and per-axle damping `c = 2ζ√(m·k)`.
    pub fn from_rig(rig: &RigMeasurements) -> Self {
        let damping = |unsprung: f64, k: f64| 2.0 * rig.damping_ratio * (unsprung * k).sqrt();
        SuspensionParams {
            lf: rig.lf,
            lr: rig.lr,
            hub_offset_right: rig.hub_offset_right,
            hub_offset_left: rig.hub_offset_left,
            body_mass: rig.body_mass,
            pitch_inertia: rig.body_mass * (rig.body_length.powi(2) + rig.body_height.powi(2)) / 12.0,
            kf: rig.kf,
            kr: rig.kr,
            cf: damping(rig.unsprung_mass_front, rig.kf),
            cr: damping(rig.unsprung_mass_rear, rig.kr),
            gravity: rig.gravity,
            turning_radius_min: rig.turning_radius_min,
            turning_radius_max: rig.turning_radius_max,
        }
    }

    /// Front and rear quantities exchanged.
    pub fn mirrored(&self) -> Self {
        SuspensionParams {
            lf: self.lr,
            lr: self.lf,
            kf: self.kr,
            kr: self.kf,
            cf: self.cr,
            cr: self.cf,
            ..*self
        }
    }

    pub fn turning_radius(&self) -> f64 {
        (self.turning_radius_min + self.turning_radius_max) / 2.0
    }

    /// Sprung weight carried by one axle at rest (N)
    pub fn static_axle_load(&self) -> f64 {
        self.body_mass * self.gravity / 2.0
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        require_positive("suspension.lf", self.lf)?;
        require_positive("suspension.lr", self.lr)?;
        require_finite("suspension.hub_offset_right", self.hub_offset_right)?;
        require_finite("suspension.hub_offset_left", self.hub_offset_left)?;
        require_positive("suspension.body_mass", self.body_mass)?;
        require_positive("suspension.pitch_inertia", self.pitch_inertia)?;
        require_non_negative("suspension.kf", self.kf)?;
        require_non_negative("suspension.kr", self.kr)?;
        require_non_negative("suspension.cf", self.cf)?;
        require_non_negative("suspension.cr", self.cr)?;
        require_non_negative("suspension.gravity", self.gravity)?;
        require_positive("suspension.turning_radius_min", self.turning_radius_min)?;
        require_positive("suspension.turning_radius_max", self.turning_radius_max)?;
        if self.turning_radius_min > self.turning_radius_max {
            return Err(DynamicsError::invalid(
                "suspension.turning_radius_min",
                "must not exceed turning_radius_max",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuspensionState {
    pub heave_position: f64,
    pub heave_velocity: f64,
    pub pitch_angle: f64,
    pub pitch_velocity: f64,
    pub roll_heave_position: f64,
    pub roll_heave_velocity: f64,
    pub roll_angle: f64,
    pub roll_velocity: f64,
}

impl SuspensionState {
    fn pitch_vector(&self) -> [f64; 4] {
        [self.heave_position, self.heave_velocity, self.pitch_angle, self.pitch_velocity]
    }

    pub fn is_finite(&self) -> bool {
        [
            self.heave_position,
            self.heave_velocity,
            self.pitch_angle,
            self.pitch_velocity,
            self.roll_heave_position,
            self.roll_heave_velocity,
            self.roll_angle,
            self.roll_velocity,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Heave/pitch stage: state `[z, ż, θ, θ̇]`
pub struct HalfCar<'a> {
    pub params: &'a SuspensionParams,
    pub accel_z: f64,
    pub hub_height: f64,
}

impl HalfCar<'_> {
    /// Front axle spring and damper force for the state `[z, ż, θ, θ̇]`
    fn front_force(&self, y: &[f64; 4]) -> f64 {
        let p = self.params;
        2.0 * p.kf * (p.lf * y[2] - (y[0] + self.hub_height)) + 2.0 * p.cf * (p.lf * y[3] - y[1])
    }

    /// Rear axle spring and damper force, positive upward on the body
    fn rear_force(&self, y: &[f64; 4]) -> f64 {
        let p = self.params;
        -2.0 * p.kr * (p.lr * y[2] + y[0] + self.hub_height) - 2.0 * p.cr * (p.lr * y[3] + y[1])
    }
}

impl OdeSystem<4> for HalfCar<'_> {
    fn derivative(&self, _t: f64, y: &[f64; 4]) -> Result<[f64; 4], DynamicsError> {
        let p = self.params;
        let pitching_moment = self.accel_z * (p.lf + p.lr);
        let front = self.front_force(y);
        let rear = self.rear_force(y);
        Ok([
            y[1],
            (front + rear) / p.body_mass,
            y[3],
            (-p.lf * front + p.lr * rear + pitching_moment) / p.pitch_inertia,
        ])
    }
}

/// Cornering stage: state `[q5, q̇5, q7, q̇7]`
pub struct Cornering<'a> {
    pub params: &'a SuspensionParams,
    pub accel_y: f64,
    pub hub_height: f64,
}

impl Cornering<'_> {
    /// Centripetal load at the mean turning radius
    pub fn centripetal_force(&self) -> f64 {
        self.params.body_mass * self.accel_y.powi(2) / self.params.turning_radius()
    }
}

impl OdeSystem<4> for Cornering<'_> {
    fn derivative(&self, _t: f64, y: &[f64; 4]) -> Result<[f64; 4], DynamicsError> {
        let p = self.params;
        let a = p.hub_offset_right;
        let b = p.hub_offset_left;
        let k = p.kf + p.kr;
        let c = p.cf + p.cr;
        Ok([
            y[1],
            (k * (a * y[2] - (y[0] + self.hub_height)) + c * (a * y[3] - y[1])) / p.body_mass,
            y[3],
            ((a * a + b * b) * (y[2] * k + y[3] * c) - self.centripetal_force()) / p.pitch_inertia,
        ])
    }
}

/// Result of one suspension tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SuspensionStep {
    pub state: SuspensionState,
    /// Front axle reaction (N)
    pub front_force: f64,
    /// Rear axle reaction (N)
    pub rear_force: f64,
}

impl SuspensionStep {
    /// Normal load on one rear wheel
    pub fn rear_wheel_load(&self) -> f64 {
        self.rear_force / 2.0
    }

    pub fn front_wheel_load(&self) -> f64 {
        self.front_force / 2.0
    }
}

pub struct SuspensionModel {
    params: SuspensionParams,
    solver: SolverConfig,
}

impl SuspensionModel {
    pub fn new(params: SuspensionParams, solver: SolverConfig) -> Result<Self, DynamicsError> {
        params.validate()?;
        solver.validate()?;
        Ok(SuspensionModel { params, solver })
    }

    pub fn params(&self) -> &SuspensionParams {
        &self.params
    }

    /// Axle reactions for a heave/pitch state `[z, ż, θ, θ̇]`.
    pub fn reaction_forces(&self, pitch_state: &[f64; 4], hub_height: f64) -> (f64, f64) {
        let half_car = HalfCar {
            params: &self.params,
            accel_z: 0.0,
            hub_height,
        };
        let static_load = self.params.static_axle_load();
        (
            half_car.front_force(pitch_state) + static_load,
            half_car.rear_force(pitch_state) + static_load,
        )
    }

    /// Solves heave/pitch then cornering over `span`.
    ///
    /// Only the heave/pitch part of `state` carries over between ticks; the
    /// cornering stage restarts from the fresh heave/pitch result.
    pub fn advance(
        &self,
        state: &SuspensionState,
        span: TimeSpan,
        accel_z: f64,
        accel_y: f64,
        hub_height: f64,
    ) -> Result<SuspensionStep, DynamicsError> {
        require_finite("accel_z", accel_z)?;
        require_finite("accel_y", accel_y)?;
        require_finite("avg_hub_height", hub_height)?;

        let half_car = HalfCar {
            params: &self.params,
            accel_z,
            hub_height,
        };
        let pitch = integrate(&half_car, span, state.pitch_vector(), &self.solver)?.end;

        let cornering = Cornering {
            params: &self.params,
            accel_y,
            hub_height,
        };
        let roll = integrate(&cornering, span, pitch, &self.solver)?.end;

        let (front_force, rear_force) = self.reaction_forces(&pitch, hub_height);
        trace!(
            "suspension [{}, {}]: heave {:.4e} pitch {:.4e} front {:.2} rear {:.2}",
            span.t0(),
            span.t1(),
            pitch[0],
            pitch[2],
            front_force,
            rear_force
        );

        Ok(SuspensionStep {
            state: SuspensionState {
                heave_position: pitch[0],
                heave_velocity: pitch[1],
                pitch_angle: pitch[2],
                pitch_velocity: pitch[3],
                roll_heave_position: roll[0],
                roll_heave_velocity: roll[1],
                roll_angle: roll[2],
                roll_velocity: roll[3],
            },
            front_force,
            rear_force,
        })
    }
}
