mod scenario;

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use log::{LevelFilter, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use vehicle::{TickOutput, VehicleDynamics, VehicleParameters, VehicleState};

use scenario::Scenario;

#[derive(Parser, Debug)]
#[command(
    name = "vehicle-sim-app",
    version,
    about = "Run the drivetrain and suspension models through a scripted bump and corner, writing CSV to stdout"
)]
struct Opts {
    /// Parameter file (JSON); defaults are used for anything it omits
    params: Option<PathBuf>,

    /// Simulated time (s)
    #[arg(long, default_value_t = 3.0)]
    duration: f64,

    /// Tick length (s)
    #[arg(long, default_value_t = 0.01)]
    dt: f64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const CSV_HEADER: &str = "t,torque,front_force,rear_force,rear_wheel_load,motor_current,motor_velocity,\
wheel_velocity,rear_hub_velocity,slip_ratio,heave_position,pitch_angle,roll_angle,wheel_command,shock_command,held";

fn main() -> Result<()> {
    let opts = Opts::parse();

    let level = match opts.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)?;

    ensure!(opts.dt > 0.0 && opts.dt.is_finite(), "--dt must be a positive number");
    ensure!(opts.duration >= 0.0 && opts.duration.is_finite(), "--duration must be non-negative");

    let params = match &opts.params {
        Some(path) => VehicleParameters::load(path)
            .with_context(|| format!("loading parameters from {}", path.display()))?,
        None => VehicleParameters::default(),
    };
    let dynamics = VehicleDynamics::new(&params)?;
    let scenario = Scenario::default();

    let ticks = (opts.duration / opts.dt).round() as usize;
    info!("running {ticks} ticks of {} s", opts.dt);

    let mut out = BufWriter::new(std::io::stdout().lock());
    writeln!(out, "{CSV_HEADER}")?;

    let mut previous = VehicleState::default();
    let mut state = VehicleState::default();
    let mut held = 0usize;
    for i in 0..ticks {
        let t0 = i as f64 * opts.dt;
        let t1 = (i + 1) as f64 * opts.dt;
        let inputs = scenario.inputs(t0, t1, &previous, &state, opts.dt);

        match dynamics.tick(&state, &inputs)? {
            TickOutput::Advanced(report) => {
                let d = &report.state.drivetrain;
                let s = &report.state.suspension;
                writeln!(
                    out,
                    "{t1},{},{},{},{},{},{},{},{},{},{},{},{},{},{},0",
                    report.torque,
                    report.front_force,
                    report.rear_force,
                    report.rear_wheel_load,
                    d.motor_current,
                    d.motor_velocity,
                    d.wheel_velocity,
                    d.rear_hub_velocity,
                    report.slip_ratio,
                    s.heave_position,
                    s.pitch_angle,
                    s.roll_angle,
                    report.commands.wheel_velocity,
                    report.commands.shock_velocity,
                )?;
                previous = state;
                state = report.state;
            }
            TickOutput::Held { .. } => {
                held += 1;
                writeln!(out, "{t1},,,,,,,,,,,,,,,1")?;
            }
        }
    }
    out.flush()?;

    info!(
        "finished at t = {:.3} s: motor {:.1} rad/s, ground {:.2} m/s, {held} held ticks",
        ticks as f64 * opts.dt,
        state.drivetrain.motor_velocity,
        state.drivetrain.rear_hub_velocity
    );
    Ok(())
}
