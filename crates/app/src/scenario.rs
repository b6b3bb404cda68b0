//! Scripted road and cornering profile standing in for simulator sensors

use vehicle::{TimestepInputs, VehicleState};

/// A single half-sine bump followed by a constant-radius corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub bump_start: f64,
    pub bump_length: f64,
    /// Peak hub rise (m)
    pub bump_height: f64,
    pub corner_start: f64,
    pub corner_length: f64,
    /// Lateral acceleration held through the corner (m/s²)
    pub lateral_accel: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            bump_start: 0.5,
            bump_length: 0.2,
            bump_height: 0.02,
            corner_start: 1.5,
            corner_length: 1.0,
            lateral_accel: 6.0,
        }
    }
}

impl Scenario {
    pub fn hub_height(&self, t: f64) -> f64 {
        let phase = (t - self.bump_start) / self.bump_length;
        if (0.0..=1.0).contains(&phase) {
            self.bump_height * (std::f64::consts::PI * phase).sin()
        } else {
            0.0
        }
    }

    pub fn lateral_accel(&self, t: f64) -> f64 {
        if t >= self.corner_start && t < self.corner_start + self.corner_length {
            self.lateral_accel
        } else {
            0.0
        }
    }

    /// Sensor readings for `[t0, t1]`.
    ///
    /// Longitudinal acceleration is differenced from the ground velocity of
    /// the last two states, as an IMU on the car would report it.
    pub fn inputs(&self, t0: f64, t1: f64, previous: &VehicleState, current: &VehicleState, dt: f64) -> TimestepInputs {
        let accel_z = if dt > 0.0 {
            (current.drivetrain.rear_hub_velocity - previous.drivetrain.rear_hub_velocity) / dt
        } else {
            0.0
        };
        TimestepInputs {
            t0,
            t1,
            accel_z,
            accel_y: self.lateral_accel(t0),
            avg_hub_height: self.hub_height(t0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_profile() {
        let s = Scenario::default();
        assert_eq!(s.hub_height(0.0), 0.0);
        assert!((s.hub_height(0.6) - 0.02).abs() < 1e-12);
        assert_eq!(s.hub_height(0.8), 0.0);
    }

    #[test]
    fn test_corner_window() {
        let s = Scenario::default();
        assert_eq!(s.lateral_accel(1.4), 0.0);
        assert_eq!(s.lateral_accel(1.5), 6.0);
        assert_eq!(s.lateral_accel(2.5), 0.0);
    }

    #[test]
    fn test_longitudinal_accel_from_state_difference() {
        let s = Scenario::default();
        let previous = VehicleState::default();
        let mut current = previous;
        current.drivetrain.rear_hub_velocity = 0.05;
        let inputs = s.inputs(1.0, 1.01, &previous, &current, 0.01);
        assert!((inputs.accel_z - 5.0).abs() < 1e-9);
        assert_eq!(inputs.t1, 1.01);
    }
}
