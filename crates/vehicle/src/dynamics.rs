//! Per-tick orchestration of the suspension and drivetrain models
//!
//! The ordering within a tick is fixed: the suspension is solved first, its
//! rear axle reaction is split between the two rear wheels, and that load is
//! the normal force seen by the drivetrain's tyre.

use control::StepDemand;
use log::{debug, trace, warn};
use mechanics::{SuspensionModel, SuspensionState};
use serde::{Deserialize, Serialize};
use simcore::{DynamicsError, Regime, TimeSpan};

use crate::drivetrain::{DrivetrainModel, DrivetrainState};
use crate::params::{FailurePolicy, TickConfig, VehicleParameters};

/// Everything threaded from one tick to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub suspension: SuspensionState,
    pub drivetrain: DrivetrainState,
}

/// Sensor readings for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestepInputs {
    pub t0: f64,
    pub t1: f64,
    /// Longitudinal acceleration (m/s²)
    pub accel_z: f64,
    /// Lateral acceleration (m/s²)
    pub accel_y: f64,
    /// Mean hub height (m)
    pub avg_hub_height: f64,
}

/// Joint targets sent back to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActuatorCommands {
    /// Rear wheel joint target velocity (rad/s)
    pub wheel_velocity: f64,
    /// Shock absorber target velocity (m/s)
    pub shock_velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    pub state: VehicleState,
    pub torque: f64,
    pub front_force: f64,
    pub rear_force: f64,
    /// Normal force on one rear wheel, as used by the tyre (N)
    pub rear_wheel_load: f64,
    pub slip_ratio: f64,
    pub tire_force: f64,
    pub commands: ActuatorCommands,
    pub regime: Regime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutput {
    Advanced(TickReport),
    /// The tick failed and the previous state was kept; nothing to actuate.
    Held { state: VehicleState, cause: DynamicsError },
}

impl TickOutput {
    pub fn state(&self) -> &VehicleState {
        match self {
            TickOutput::Advanced(report) => &report.state,
            TickOutput::Held { state, .. } => state,
        }
    }

    pub fn commands(&self) -> Option<ActuatorCommands> {
        match self {
            TickOutput::Advanced(report) => Some(report.commands),
            TickOutput::Held { .. } => None,
        }
    }

    pub fn is_held(&self) -> bool {
        matches!(self, TickOutput::Held { .. })
    }
}

pub struct VehicleDynamics {
    suspension: SuspensionModel,
    drivetrain: DrivetrainModel,
    demand: StepDemand,
    tick: TickConfig,
}

impl VehicleDynamics {
    pub fn new(params: &VehicleParameters) -> Result<Self, DynamicsError> {
        params.validate()?;
        let suspension = SuspensionModel::new(params.suspension, params.solver)?;
        let drivetrain = DrivetrainModel::new(
            params.motor,
            params.transmission,
            params.tire,
            params.controller,
            params.solver,
        )?;

        let limit = params.controller.saturation_limit;
        let reachable = params.motor.no_load_speed(limit);
        if params.demand.target.abs() > reachable {
            warn!(
                "velocity demand {} rad/s exceeds the no-load speed {:.1} rad/s at {} V; the controller will saturate",
                params.demand.target, reachable, limit
            );
        }
        debug!(
            "motor at {limit} V: free speed {:.1} rad/s, stall current {:.1} A",
            params.motor.free_speed(limit),
            params.motor.stall_current(limit)
        );
        debug!(
            "vehicle dynamics ready: gear ratio {:.3}, solver tolerance {}, policy {:?}",
            params.transmission.gear_ratio, params.solver.tolerance, params.tick.failure_policy
        );

        Ok(VehicleDynamics {
            suspension,
            drivetrain,
            demand: params.demand,
            tick: params.tick,
        })
    }

    pub fn drivetrain(&self) -> &DrivetrainModel {
        &self.drivetrain
    }

    pub fn suspension(&self) -> &SuspensionModel {
        &self.suspension
    }

    /// Advances both models over `[inputs.t0, inputs.t1]`, applying the failure policy.
    pub fn tick(&self, state: &VehicleState, inputs: &TimestepInputs) -> Result<TickOutput, DynamicsError> {
        match self.step(state, inputs) {
            Ok(report) => Ok(TickOutput::Advanced(report)),
            Err(err) if self.tick.failure_policy == FailurePolicy::HoldPrevious && err.is_recoverable() => {
                warn!("tick [{}, {}] held at previous state: {err}", inputs.t0, inputs.t1);
                Ok(TickOutput::Held {
                    state: *state,
                    cause: err,
                })
            }
            Err(err) => {
                warn!("tick [{}, {}] failed: {err}", inputs.t0, inputs.t1);
                Err(err)
            }
        }
    }

    /// Suspension, then per-wheel load, then drivetrain. No failure policy.
    pub fn step(&self, state: &VehicleState, inputs: &TimestepInputs) -> Result<TickReport, DynamicsError> {
        let span = TimeSpan::new(inputs.t0, inputs.t1)?;

        let suspension = self.suspension.advance(
            &state.suspension,
            span,
            inputs.accel_z,
            inputs.accel_y,
            inputs.avg_hub_height,
        )?;
        let rear_wheel_load = suspension.rear_wheel_load();

        let drivetrain = self
            .drivetrain
            .advance(&state.drivetrain, span, &self.demand, rear_wheel_load)?;

        let commands = ActuatorCommands {
            wheel_velocity: self.tick.wheel_command_gain * -drivetrain.state.wheel_velocity,
            shock_velocity: suspension.state.heave_velocity,
        };
        trace!(
            "tick [{}, {}]: torque {:.3} N·m, rear wheel load {:.2} N, wheel command {:.3} rad/s",
            inputs.t0,
            inputs.t1,
            drivetrain.torque,
            rear_wheel_load,
            commands.wheel_velocity
        );

        Ok(TickReport {
            state: VehicleState {
                suspension: suspension.state,
                drivetrain: drivetrain.state,
            },
            torque: drivetrain.torque,
            front_force: suspension.front_force,
            rear_force: suspension.rear_force,
            rear_wheel_load,
            slip_ratio: drivetrain.slip_ratio,
            tire_force: drivetrain.tire_force,
            commands,
            regime: drivetrain.regime,
        })
    }
}
