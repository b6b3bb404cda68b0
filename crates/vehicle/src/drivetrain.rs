//! PI-controlled motor, two-stage transmission and rear tyre as one ODE
//!
//! State order matches [`DrivetrainState::to_array`]:
//! `[i, ωm, θm, ω2, θ2, ω3, θ3, v_ground, ∫e]`.

use control::{PiConfig, VelocityDemand};
use electrical::MotorParams;
use log::trace;
use mechanics::{TireParams, TransmissionParams, slip_ratio, wheel_hub_velocity};
use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, OdeSystem, Regime, SolverConfig, TimeSpan, integrate, require_finite};

pub const STATE_LEN: usize = 9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainState {
    /// Armature current (A)
    pub motor_current: f64,
    /// Rotor velocity (rad/s)
    pub motor_velocity: f64,
    pub motor_angle: f64,
    pub driven_shaft_velocity: f64,
    pub driven_shaft_angle: f64,
    pub wheel_velocity: f64,
    pub wheel_angle: f64,
    /// Ground-frame velocity of the rear hub (m/s)
    pub rear_hub_velocity: f64,
    /// PI accumulator (V)
    pub controller_integral: f64,
}

impl DrivetrainState {
    pub fn to_array(&self) -> [f64; STATE_LEN] {
        [
            self.motor_current,
            self.motor_velocity,
            self.motor_angle,
            self.driven_shaft_velocity,
            self.driven_shaft_angle,
            self.wheel_velocity,
            self.wheel_angle,
            self.rear_hub_velocity,
            self.controller_integral,
        ]
    }

    pub fn from_array(y: [f64; STATE_LEN]) -> Self {
        DrivetrainState {
            motor_current: y[0],
            motor_velocity: y[1],
            motor_angle: y[2],
            driven_shaft_velocity: y[3],
            driven_shaft_angle: y[4],
            wheel_velocity: y[5],
            wheel_angle: y[6],
            rear_hub_velocity: y[7],
            controller_integral: y[8],
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Outcome of one drivetrain tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrivetrainStep {
    /// Tyre torque at the wheel from the final state (N·m)
    pub torque: f64,
    pub state: DrivetrainState,
    pub slip_ratio: f64,
    /// Longitudinal tyre force (N)
    pub tire_force: f64,
    pub regime: Regime,
}

/// Immutable drivetrain parameters; `advance` threads the state.
#[derive(Debug, Clone)]
pub struct DrivetrainModel {
    motor: MotorParams,
    transmission: TransmissionParams,
    tire: TireParams,
    controller: PiConfig,
    solver: SolverConfig,
}

impl DrivetrainModel {
    pub fn new(
        motor: MotorParams,
        transmission: TransmissionParams,
        tire: TireParams,
        controller: PiConfig,
        solver: SolverConfig,
    ) -> Result<Self, DynamicsError> {
        motor.validate()?;
        transmission.validate()?;
        tire.validate()?;
        controller.validate()?;
        solver.validate()?;
        Ok(DrivetrainModel {
            motor,
            transmission,
            tire,
            controller,
            solver,
        })
    }

    pub fn motor(&self) -> &MotorParams {
        &self.motor
    }

    pub fn controller(&self) -> &PiConfig {
        &self.controller
    }

    pub fn tire(&self) -> &TireParams {
        &self.tire
    }

    /// Right-hand side of the drivetrain ODE at time `t`.
    pub fn derivative<D>(
        &self,
        t: f64,
        y: &[f64; STATE_LEN],
        demand: &D,
        normal_force: f64,
    ) -> Result<[f64; STATE_LEN], DynamicsError>
    where
        D: VelocityDemand + ?Sized,
    {
        let [current, motor_velocity, motor_angle, shaft_velocity, shaft_angle, wheel_velocity, wheel_angle, ground_velocity, integral] =
            *y;
        let tr = &self.transmission;
        let n = tr.gear_ratio;
        let eta = tr.efficiency;

        let pi = self.controller.output(demand.demand(t), motor_velocity, integral);
        let d_current = self.motor.current_derivative(current, motor_velocity, pi.voltage);

        let drive_twist = -n / eta * shaft_angle - motor_angle;
        let d_motor_velocity =
            self.motor
                .velocity_derivative(current, motor_velocity, tr.drive_stiffness * drive_twist);

        let drive_bearing = tr.drive_bearing.compute(-n / eta * shaft_velocity);
        let driven_bearing = tr.driven_bearing.compute(shaft_velocity);
        let driven_twist = wheel_angle - shaft_angle;
        let d_shaft_velocity = (-tr.drive_stiffness * (n * n / eta * shaft_angle + motor_angle * n)
            + drive_bearing * n
            + 2.0 * tr.driven_stiffness * driven_twist
            - driven_bearing)
            / tr.reflected_inertia();

        let rolling = self.tire.rolling_resistance_torque(ground_velocity, normal_force);
        let d_wheel_velocity = (-tr.driven_stiffness * driven_twist - rolling) / tr.wheel_inertia;

        let (_, tire_force) = self.tire_force(wheel_velocity, ground_velocity, normal_force)?;

        Ok([
            d_current,
            d_motor_velocity,
            motor_velocity,
            d_shaft_velocity,
            shaft_velocity,
            d_wheel_velocity,
            wheel_velocity,
            tire_force / self.tire.quarter_vehicle_mass,
            pi.integral_rate,
        ])
    }

    /// Slip ratio and longitudinal force for the given wheel and ground velocities.
    fn tire_force(
        &self,
        wheel_velocity: f64,
        ground_velocity: f64,
        normal_force: f64,
    ) -> Result<(f64, f64), DynamicsError> {
        let hub = wheel_hub_velocity(wheel_velocity, self.tire.radius);
        let k = slip_ratio(hub, ground_velocity, self.tire.slip)?;
        Ok((k, self.tire.longitudinal_force(k, normal_force)))
    }

    /// Tyre torque `Fx·r` for `state`.
    pub fn torque(&self, state: &DrivetrainState, normal_force: f64) -> Result<f64, DynamicsError> {
        let (_, force) = self.tire_force(state.wheel_velocity, state.rear_hub_velocity, normal_force)?;
        Ok(force * self.tire.radius)
    }

    /// Integrates over `span` and reports the torque from the final state.
    pub fn advance<D>(
        &self,
        state: &DrivetrainState,
        span: TimeSpan,
        demand: &D,
        normal_force: f64,
    ) -> Result<DrivetrainStep, DynamicsError>
    where
        D: VelocityDemand + ?Sized,
    {
        require_finite("normal_force", normal_force)?;
        if !state.is_finite() {
            return Err(DynamicsError::invalid("drivetrain_state", "contains a non-finite value"));
        }

        let system = DrivetrainSystem {
            model: self,
            demand,
            normal_force,
        };
        let trajectory = integrate(&system, span, state.to_array(), &self.solver)?;
        let end = DrivetrainState::from_array(trajectory.end);
        let (slip, tire_force) = self.tire_force(end.wheel_velocity, end.rear_hub_velocity, normal_force)?;

        trace!(
            "drivetrain [{}, {}]: wm {:.3} w3 {:.3} slip {:.4} Fx {:.2} ({} steps, {:?})",
            span.t0(),
            span.t1(),
            end.motor_velocity,
            end.wheel_velocity,
            slip,
            tire_force,
            trajectory.stats.accepted,
            trajectory.final_regime
        );

        Ok(DrivetrainStep {
            torque: tire_force * self.tire.radius,
            state: end,
            slip_ratio: slip,
            tire_force,
            regime: trajectory.final_regime,
        })
    }
}

/// The drivetrain bound to one tick's demand schedule and normal load.
struct DrivetrainSystem<'a, D: ?Sized> {
    model: &'a DrivetrainModel,
    demand: &'a D,
    normal_force: f64,
}

impl<D> OdeSystem<STATE_LEN> for DrivetrainSystem<'_, D>
where
    D: VelocityDemand + ?Sized,
{
    fn derivative(&self, t: f64, y: &[f64; STATE_LEN]) -> Result<[f64; STATE_LEN], DynamicsError> {
        self.model.derivative(t, y, self.demand, self.normal_force)
    }
}
