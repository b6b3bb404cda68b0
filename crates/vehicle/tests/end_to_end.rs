use approx::assert_relative_eq;
use simcore::DynamicsError;
use vehicle::{FailurePolicy, TickOutput, TimestepInputs, VehicleDynamics, VehicleParameters, VehicleState};

const DT: f64 = 0.01;

fn level_road(t0: f64) -> TimestepInputs {
    TimestepInputs {
        t0,
        t1: t0 + DT,
        ..Default::default()
    }
}

#[test]
fn static_vehicle_splits_weight_and_produces_no_torque() {
    let dynamics = VehicleDynamics::new(&VehicleParameters::default()).unwrap();
    let report = dynamics.step(&VehicleState::default(), &level_road(0.0)).unwrap();

    let per_wheel = 283.0 * 9.81 / 4.0;
    assert_relative_eq!(report.rear_wheel_load, per_wheel, max_relative = 1e-9);
    assert_relative_eq!(report.front_force / 2.0, per_wheel, max_relative = 1e-9);
    assert!((report.rear_wheel_load - 693.9).abs() < 0.5);
    assert_eq!(report.torque, 0.0);
    assert_eq!(report.state, VehicleState::default());
    assert_eq!(report.commands.wheel_velocity, 0.0);
}

#[test]
fn repeated_runs_are_bit_identical() {
    let dynamics = VehicleDynamics::new(&VehicleParameters::default()).unwrap();
    let inputs = TimestepInputs {
        t0: 1.0,
        t1: 1.0 + DT,
        accel_z: 0.8,
        accel_y: 2.0,
        avg_hub_height: 0.004,
    };
    let a = dynamics.step(&VehicleState::default(), &inputs).unwrap();
    let b = dynamics.step(&VehicleState::default(), &inputs).unwrap();
    assert_eq!(a, b);
}

/// Ticks a level-road drive from `t0`, returning the final state and the number of held ticks.
fn drive(params: &VehicleParameters, t0: f64, ticks: usize) -> (VehicleState, usize) {
    let dynamics = VehicleDynamics::new(params).unwrap();
    let motor = params.motor;
    let limit = params.controller.saturation_limit;

    let mut state = VehicleState::default();
    let mut held = 0;
    for i in 0..ticks {
        match dynamics.tick(&state, &level_road(t0 + i as f64 * DT)).unwrap() {
            TickOutput::Advanced(report) => state = report.state,
            TickOutput::Held { .. } => held += 1,
        }
        let d = state.drivetrain;
        assert!(d.is_finite(), "tick {i}: {d:?}");
        assert!(d.motor_velocity.abs() <= motor.no_load_speed(limit), "tick {i}: {d:?}");
        assert!(d.motor_current.abs() <= motor.stall_current(limit), "tick {i}: {d:?}");
    }
    (state, held)
}

#[test]
fn drive_loop_accelerates_after_activation() {
    let mut params = VehicleParameters::default();
    params.tick.failure_policy = FailurePolicy::HoldPrevious;
    let (state, held) = drive(&params, 0.95, 15);

    assert_eq!(held, 0);
    let drivetrain = state.drivetrain;
    assert!(drivetrain.motor_velocity > 50.0, "{drivetrain:?}");
    assert!(drivetrain.controller_integral > 0.0);
    // Forward travel turns the wheel joint negative
    assert!(drivetrain.wheel_velocity < 0.0);
    assert!(drivetrain.rear_hub_velocity > 0.0);
}

#[test]
fn default_tolerance_tracks_tight_reference() {
    let loose = VehicleParameters::default();
    let mut tight = VehicleParameters::default();
    tight.solver = tight.solver.with_tolerance(1e-6);

    let (a, _) = drive(&loose, 1.0, 10);
    let (b, _) = drive(&tight, 1.0, 10);
    assert_relative_eq!(a.drivetrain.motor_velocity, b.drivetrain.motor_velocity, max_relative = 0.05);
    assert_relative_eq!(
        a.drivetrain.controller_integral,
        b.drivetrain.controller_integral,
        max_relative = 0.05
    );
}

#[test]
fn solver_failure_is_held_or_raised_by_policy() {
    let mut params = VehicleParameters::default();
    params.solver = params.solver.with_max_steps(1);
    let inputs = level_road(1.0);

    let err = VehicleDynamics::new(&params)
        .unwrap()
        .tick(&VehicleState::default(), &inputs)
        .unwrap_err();
    assert!(matches!(err, DynamicsError::IntegrationDivergence { .. }), "{err:?}");

    params.tick.failure_policy = FailurePolicy::HoldPrevious;
    let out = VehicleDynamics::new(&params)
        .unwrap()
        .tick(&VehicleState::default(), &inputs)
        .unwrap();
    match out {
        TickOutput::Held { state, cause } => {
            assert_eq!(state, VehicleState::default());
            assert!(matches!(cause, DynamicsError::IntegrationDivergence { .. }));
        }
        TickOutput::Advanced(report) => panic!("expected a held tick, got {report:?}"),
    }
}
