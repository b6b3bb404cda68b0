use serde::{Deserialize, Serialize};

use crate::error::DynamicsError;

/// A continuous-time system `dy/dt = f(t, y)` with `N` state variables.
///
/// Models return an error instead of a derivative when the state violates one
/// of their invariants; the integrator aborts on the first such error.
pub trait OdeSystem<const N: usize> {
    fn derivative(&self, t: f64, y: &[f64; N]) -> Result<[f64; N], DynamicsError>;
}

/// Closed time interval `[t0, t1]` covered by one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSpan")]
pub struct TimeSpan {
    t0: f64,
    t1: f64,
}

#[derive(Deserialize)]
struct RawTimeSpan {
    t0: f64,
    t1: f64,
}

impl TryFrom<RawTimeSpan> for TimeSpan {
    type Error = DynamicsError;

    fn try_from(raw: RawTimeSpan) -> Result<Self, Self::Error> {
        TimeSpan::new(raw.t0, raw.t1)
    }
}

impl TimeSpan {
    /// Both bounds must be finite and `t1 >= t0`.
    pub fn new(t0: f64, t1: f64) -> Result<Self, DynamicsError> {
        if t0.is_finite() && t1.is_finite() && t1 >= t0 {
            Ok(TimeSpan { t0, t1 })
        } else {
            Err(DynamicsError::InvalidInterval { t0, t1 })
        }
    }

    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn t1(&self) -> f64 {
        self.t1
    }

    pub fn duration(&self) -> f64 {
        self.t1 - self.t0
    }

    pub fn is_empty(&self) -> bool {
        self.t1 == self.t0
    }

    /// `points` evenly spaced times; the first is exactly `t0`, the last exactly `t1`.
    pub fn sample_times(&self, points: usize) -> Vec<f64> {
        let points = points.max(2);
        let last = points - 1;
        (0..points)
            .map(|i| {
                if i == last {
                    self.t1
                } else {
                    self.t0 + self.duration() * (i as f64) / (last as f64)
                }
            })
            .collect()
    }
}
