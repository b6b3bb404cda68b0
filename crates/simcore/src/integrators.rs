use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::DynamicsError;
use crate::traits::{OdeSystem, TimeSpan};

/// Which integration scheme the solver may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Start explicit, switch to the implicit scheme when stiffness is detected and back again.
    #[default]
    Auto,
    /// Dormand-Prince 5(4) only, with steps capped at its stability bound.
    NonStiff,
    /// Rosenbrock 2(3) only.
    Stiff,
}

/// The scheme in use at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    NonStiff,
    Stiff,
}

/// Settings for [`integrate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Used as both relative and absolute error tolerance.
    pub tolerance: f64,
    /// Number of evenly spaced samples reported, including both ends.
    pub output_points: usize,
    /// Upper bound on attempted steps per call.
    pub max_steps: usize,
    /// Consecutive rejected steps allowed before giving up.
    pub max_step_halvings: usize,
    pub method: Method,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: 0.05,
            output_points: 10,
            max_steps: 200_000,
            max_step_halvings: 40,
            method: Method::Auto,
        }
    }
}

impl SolverConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_output_points(mut self, points: usize) -> Self {
        self.output_points = points;
        self
    }

    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn validate(&self) -> Result<(), DynamicsError> {
        crate::error::require_positive("solver.tolerance", self.tolerance)?;
        if self.output_points < 2 {
            return Err(DynamicsError::invalid("solver.output_points", "must be at least 2"));
        }
        if self.max_steps == 0 {
            return Err(DynamicsError::invalid("solver.max_steps", "must be at least 1"));
        }
        Ok(())
    }
}

/// Work counters for one call to [`integrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
    pub jacobians: usize,
    pub switches: usize,
}

/// Samples of the solution over a [`TimeSpan`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<const N: usize> {
    pub times: Vec<f64>,
    pub states: Vec<[f64; N]>,
    /// State at `t1`, identical to the last entry of `states`.
    pub end: [f64; N],
    pub stats: SolverStats,
    pub final_regime: Regime,
}

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const STIFF_RATIO: f64 = 3.25;
const STIFF_HITS_TO_SWITCH: usize = 15;
const NONSTIFF_HITS_TO_RESET: usize = 6;
const MIN_STIFF_STEPS: usize = 20;
const EASY_STEPS_TO_SWITCH: usize = 5;
const EASY_RATIO: f64 = 2.0;
/// Where the Dormand-Prince stability region crosses the negative real axis.
const STABILITY_LIMIT: f64 = 3.3;
const STABILITY_SAFETY: f64 = 0.9;

struct Attempt<const N: usize> {
    y_new: [f64; N],
    f_new: [f64; N],
    error: f64,
    factor: f64,
    /// `h * |lambda|` estimate, explicit steps only.
    stiffness: Option<f64>,
}

struct Stepper<'a, S: ?Sized, const N: usize> {
    system: &'a S,
    tolerance: f64,
    method: Method,
    regime: Regime,
    stats: SolverStats,
    stiff_hits: usize,
    nonstiff_hits: usize,
    stiff_steps: usize,
    easy_steps: usize,
    jacobian: Option<(f64, [f64; N], DMatrix<f64>)>,
}

/// Integrates `system` from `y0` over `span`.
///
/// Returns `config.output_points` samples; the last sample time is exactly
/// `span.t1()`. An empty span returns `y0` unchanged. Errors raised by the
/// system's derivative abort the integration immediately.
pub fn integrate<S, const N: usize>(
    system: &S,
    span: TimeSpan,
    y0: [f64; N],
    config: &SolverConfig,
) -> Result<Trajectory<N>, DynamicsError>
where
    S: OdeSystem<N> + ?Sized,
{
    config.validate()?;
    if y0.iter().any(|v| !v.is_finite()) {
        return Err(DynamicsError::invalid("initial_state", "contains a non-finite value"));
    }

    let regime = match config.method {
        Method::Stiff => Regime::Stiff,
        Method::Auto | Method::NonStiff => Regime::NonStiff,
    };
    let mut stepper = Stepper {
        system,
        tolerance: config.tolerance,
        method: config.method,
        regime,
        stats: SolverStats::default(),
        stiff_hits: 0,
        nonstiff_hits: 0,
        stiff_steps: 0,
        easy_steps: 0,
        jacobian: None,
    };

    if span.is_empty() {
        return Ok(Trajectory {
            times: vec![span.t0()],
            states: vec![y0],
            end: y0,
            stats: stepper.stats,
            final_regime: stepper.regime,
        });
    }

    let samples = span.sample_times(config.output_points);
    let mut times = Vec::with_capacity(samples.len());
    let mut states = Vec::with_capacity(samples.len());
    times.push(span.t0());
    states.push(y0);

    let mut t = span.t0();
    let mut y = y0;
    let mut f = stepper.eval(t, &y)?;
    let mut h = stepper.initial_step(&y, &f).min(span.duration());
    let mut attempts = 0;
    let mut halvings = 0;
    let mut last_rejected = false;

    for &target in &samples[1..] {
        while t < target {
            if attempts >= config.max_steps {
                return Err(DynamicsError::divergence(
                    t,
                    format!("step budget of {} exhausted", config.max_steps),
                ));
            }
            attempts += 1;

            let remaining = target - t;
            let mut reaches_target = h >= remaining;
            let mut h_try = if reaches_target { remaining } else { h };

            // Explicit steps never exceed the stability bound of the local Jacobian.
            if stepper.regime == Regime::NonStiff {
                let limit = stepper.explicit_step_limit(t, &y, &f)?;
                if h_try > limit {
                    if stepper.method == Method::Auto {
                        debug!("h = {h_try:e} exceeds the explicit stability bound {limit:e} at t = {t:.6}, switching to Rosenbrock");
                        stepper.switch(Regime::Stiff);
                    } else {
                        h_try = limit;
                        reaches_target = false;
                    }
                }
            }

            let min_step = 16.0 * f64::EPSILON * t.abs();
            if h_try <= min_step && !reaches_target {
                return Err(DynamicsError::divergence(t, format!("step size underflow (h = {h_try:e})")));
            }

            let attempt = match stepper.regime {
                Regime::NonStiff => stepper.dormand_prince(t, &y, &f, h_try)?,
                Regime::Stiff => stepper.rosenbrock(t, &y, &f, h_try)?,
            };

            let finite = attempt.error.is_finite() && attempt.y_new.iter().all(|v| v.is_finite());
            if finite && attempt.error <= 1.0 {
                t = if reaches_target { target } else { t + h_try };
                y = attempt.y_new;
                f = attempt.f_new;
                stepper.stats.accepted += 1;
                halvings = 0;

                let factor = if last_rejected { attempt.factor.min(1.0) } else { attempt.factor };
                h = h_try * factor;
                last_rejected = false;
                trace!("accepted step to t = {t:.6} ({:?}, next h = {h:e})", stepper.regime);

                stepper.update_regime(t, &y, &f, h, attempt.stiffness)?;
            } else {
                stepper.stats.rejected += 1;
                halvings += 1;
                if halvings > config.max_step_halvings {
                    return Err(DynamicsError::divergence(
                        t,
                        format!("{halvings} consecutive rejected steps"),
                    ));
                }
                let factor = if finite { attempt.factor.min(0.5) } else { 0.5 };
                h = h_try * factor;
                last_rejected = true;
            }
        }
        times.push(target);
        states.push(y);
    }

    debug!(
        "integrated [{}, {}]: {} accepted, {} rejected, {} evaluations, {} switches",
        span.t0(),
        span.t1(),
        stepper.stats.accepted,
        stepper.stats.rejected,
        stepper.stats.evaluations,
        stepper.stats.switches
    );

    Ok(Trajectory {
        times,
        states,
        end: y,
        stats: stepper.stats,
        final_regime: stepper.regime,
    })
}

/// `y + h * sum(a_j * k_j)`
fn stage<const N: usize>(y: &[f64; N], h: f64, coeffs: &[(f64, &[f64; N])]) -> [f64; N] {
    let mut out = *y;
    for (i, value) in out.iter_mut().enumerate() {
        *value += h * coeffs.iter().map(|(a, k)| a * k[i]).sum::<f64>();
    }
    out
}

impl<S, const N: usize> Stepper<'_, S, N>
where
    S: OdeSystem<N> + ?Sized,
{
    fn eval(&mut self, t: f64, y: &[f64; N]) -> Result<[f64; N], DynamicsError> {
        self.stats.evaluations += 1;
        self.system.derivative(t, y)
    }

    fn error_norm(&self, err: &[f64; N], y: &[f64; N], y_new: &[f64; N]) -> f64 {
        if N == 0 {
            return 0.0;
        }
        let sum: f64 = (0..N)
            .map(|i| {
                let scale = self.tolerance + self.tolerance * y[i].abs().max(y_new[i].abs());
                (err[i] / scale).powi(2)
            })
            .sum();
        (sum / N as f64).sqrt()
    }

    fn initial_step(&self, y: &[f64; N], f: &[f64; N]) -> f64 {
        let d0 = self.error_norm(y, y, y);
        let d1 = self.error_norm(f, y, y);
        if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
    }

    fn dormand_prince(
        &mut self,
        t: f64,
        y: &[f64; N],
        k1: &[f64; N],
        h: f64,
    ) -> Result<Attempt<N>, DynamicsError> {
        let k2 = self.eval(t + C2 * h, &stage(y, h, &[(A21, k1)]))?;
        let k3 = self.eval(t + C3 * h, &stage(y, h, &[(A31, k1), (A32, &k2)]))?;
        let k4 = self.eval(t + C4 * h, &stage(y, h, &[(A41, k1), (A42, &k2), (A43, &k3)]))?;
        let k5 = self.eval(
            t + C5 * h,
            &stage(y, h, &[(A51, k1), (A52, &k2), (A53, &k3), (A54, &k4)]),
        )?;
        let y6 = stage(y, h, &[(A61, k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)]);
        let k6 = self.eval(t + h, &y6)?;
        let y_new = stage(y, h, &[(B1, k1), (B3, &k3), (B4, &k4), (B5, &k5), (B6, &k6)]);
        let k7 = self.eval(t + h, &y_new)?;

        let mut err = [0.0; N];
        for i in 0..N {
            err[i] = h * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
        }
        let error = self.error_norm(&err, y, &y_new);
        let factor = if error == 0.0 {
            10.0
        } else {
            (0.9 * error.powf(-0.2)).clamp(0.2, 10.0)
        };

        let num: f64 = (0..N).map(|i| (k7[i] - k6[i]).powi(2)).sum();
        let den: f64 = (0..N).map(|i| (y_new[i] - y6[i]).powi(2)).sum();
        let stiffness = (den > 0.0).then(|| h * (num / den).sqrt());

        Ok(Attempt {
            y_new,
            f_new: k7,
            error,
            factor,
            stiffness,
        })
    }

    fn jacobian(&mut self, t: f64, y: &[f64; N], f0: &[f64; N]) -> Result<DMatrix<f64>, DynamicsError> {
        if let Some((jt, jy, jac)) = &self.jacobian {
            if *jt == t && jy == y {
                return Ok(jac.clone());
            }
        }
        let mut jac = DMatrix::zeros(N, N);
        for j in 0..N {
            let delta = f64::EPSILON.sqrt() * y[j].abs().max(self.tolerance);
            let mut yp = *y;
            yp[j] += delta;
            let fp = self.eval(t, &yp)?;
            for i in 0..N {
                jac[(i, j)] = (fp[i] - f0[i]) / delta;
            }
        }
        self.stats.jacobians += 1;
        self.jacobian = Some((t, *y, jac.clone()));
        Ok(jac)
    }

    fn rosenbrock(
        &mut self,
        t: f64,
        y: &[f64; N],
        f0: &[f64; N],
        h: f64,
    ) -> Result<Attempt<N>, DynamicsError> {
        let d = 1.0 / (2.0 + std::f64::consts::SQRT_2);
        let e32 = 6.0 + std::f64::consts::SQRT_2;

        let jac = self.jacobian(t, y, f0)?;
        let w = DMatrix::<f64>::identity(N, N) - jac * (h * d);
        let lu = w.lu();
        let solve = |rhs: [f64; N]| -> Option<[f64; N]> {
            let x = lu.solve(&DVector::from_column_slice(&rhs))?;
            let mut out = [0.0; N];
            out.copy_from_slice(x.as_slice());
            Some(out)
        };
        let singular = || Attempt {
            y_new: *y,
            f_new: *f0,
            error: f64::INFINITY,
            factor: 0.5,
            stiffness: None,
        };

        let Some(k1) = solve(*f0) else {
            return Ok(singular());
        };
        let mut y_half = *y;
        for i in 0..N {
            y_half[i] += 0.5 * h * k1[i];
        }
        let f1 = self.eval(t + 0.5 * h, &y_half)?;

        let mut rhs = [0.0; N];
        for i in 0..N {
            rhs[i] = f1[i] - k1[i];
        }
        let Some(mut k2) = solve(rhs) else {
            return Ok(singular());
        };
        let mut y_new = *y;
        for i in 0..N {
            k2[i] += k1[i];
            y_new[i] += h * k2[i];
        }
        let f2 = self.eval(t + h, &y_new)?;

        for i in 0..N {
            rhs[i] = f2[i] - e32 * (k2[i] - f1[i]) - 2.0 * (k1[i] - f0[i]);
        }
        let Some(k3) = solve(rhs) else {
            return Ok(singular());
        };

        let mut err = [0.0; N];
        for i in 0..N {
            err[i] = h / 6.0 * (k1[i] - 2.0 * k2[i] + k3[i]);
        }
        let error = self.error_norm(&err, y, &y_new);
        let factor = if error == 0.0 {
            5.0
        } else {
            (0.8 * error.powf(-1.0 / 3.0)).clamp(0.2, 5.0)
        };

        Ok(Attempt {
            y_new,
            f_new: f2,
            error,
            factor,
            stiffness: None,
        })
    }

    /// Largest eigenvalue magnitude of the Jacobian at `(t, y)`.
    fn spectral_radius(&mut self, t: f64, y: &[f64; N], f: &[f64; N]) -> Result<f64, DynamicsError> {
        let jac = self.jacobian(t, y, f)?;
        if jac.iter().any(|v| !v.is_finite()) {
            return Ok(f64::INFINITY);
        }
        Ok(jac.complex_eigenvalues().iter().map(|lambda| lambda.norm()).fold(0.0, f64::max))
    }

    /// Largest explicit step that keeps `h * rho` inside the stability region.
    fn explicit_step_limit(&mut self, t: f64, y: &[f64; N], f: &[f64; N]) -> Result<f64, DynamicsError> {
        let rho = self.spectral_radius(t, y, f)?;
        if rho == 0.0 {
            return Ok(f64::INFINITY);
        }
        Ok(STABILITY_SAFETY * STABILITY_LIMIT / rho)
    }

    fn update_regime(
        &mut self,
        t: f64,
        y: &[f64; N],
        f: &[f64; N],
        h_next: f64,
        stiffness: Option<f64>,
    ) -> Result<(), DynamicsError> {
        if self.method != Method::Auto {
            return Ok(());
        }
        match self.regime {
            Regime::NonStiff => {
                let Some(ratio) = stiffness else {
                    return Ok(());
                };
                if ratio > STIFF_RATIO {
                    self.nonstiff_hits = 0;
                    self.stiff_hits += 1;
                    if self.stiff_hits >= STIFF_HITS_TO_SWITCH {
                        debug!("stiffness detected at t = {t:.6}, switching to Rosenbrock");
                        self.switch(Regime::Stiff);
                    }
                } else {
                    self.nonstiff_hits += 1;
                    if self.nonstiff_hits >= NONSTIFF_HITS_TO_RESET {
                        self.stiff_hits = 0;
                    }
                }
            }
            Regime::Stiff => {
                self.stiff_steps += 1;
                if self.stiff_steps < MIN_STIFF_STEPS {
                    return Ok(());
                }
                let rho = self.spectral_radius(t, y, f)?;
                if h_next * rho < EASY_RATIO {
                    self.easy_steps += 1;
                    if self.easy_steps >= EASY_STEPS_TO_SWITCH {
                        debug!("problem no longer stiff at t = {t:.6}, switching to Dormand-Prince");
                        self.switch(Regime::NonStiff);
                    }
                } else {
                    self.easy_steps = 0;
                }
            }
        }
        Ok(())
    }

    fn switch(&mut self, regime: Regime) {
        self.regime = regime;
        self.stats.switches += 1;
        self.stiff_hits = 0;
        self.nonstiff_hits = 0;
        self.stiff_steps = 0;
        self.easy_steps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Decay;

    impl OdeSystem<1> for Decay {
        fn derivative(&self, _t: f64, y: &[f64; 1]) -> Result<[f64; 1], DynamicsError> {
            Ok([-y[0]])
        }
    }

    /// Slow mode driving a fast, heavily damped one.
    struct StiffPair;

    impl OdeSystem<2> for StiffPair {
        fn derivative(&self, _t: f64, y: &[f64; 2]) -> Result<[f64; 2], DynamicsError> {
            Ok([-y[0], -5000.0 * (y[1] - y[0])])
        }
    }

    /// Fast relaxation onto a slowly moving target.
    struct Tracking;

    impl OdeSystem<1> for Tracking {
        fn derivative(&self, t: f64, y: &[f64; 1]) -> Result<[f64; 1], DynamicsError> {
            Ok([-1.0e4 * (y[0] - t.cos())])
        }
    }

    struct Blowup;

    impl OdeSystem<1> for Blowup {
        fn derivative(&self, _t: f64, y: &[f64; 1]) -> Result<[f64; 1], DynamicsError> {
            Ok([y[0] * y[0]])
        }
    }

    struct FailsLate;

    impl OdeSystem<1> for FailsLate {
        fn derivative(&self, t: f64, _y: &[f64; 1]) -> Result<[f64; 1], DynamicsError> {
            if t > 0.5 {
                Err(DynamicsError::SingularSlip {
                    wheel_hub_velocity: 1.0,
                    ground_velocity: 0.0,
                })
            } else {
                Ok([1.0])
            }
        }
    }

    #[test]
    fn test_dormand_prince_exponential_decay() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let config = SolverConfig::default().with_tolerance(1e-8).with_method(Method::NonStiff);
        let traj = integrate(&Decay, span, [1.0], &config).unwrap();
        assert_relative_eq!(traj.end[0], (-1.0f64).exp(), max_relative = 1e-5);
        assert_eq!(traj.final_regime, Regime::NonStiff);
    }

    #[test]
    fn test_rosenbrock_exponential_decay() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let config = SolverConfig::default().with_tolerance(1e-7).with_method(Method::Stiff);
        let traj = integrate(&Decay, span, [1.0], &config).unwrap();
        assert_relative_eq!(traj.end[0], (-1.0f64).exp(), max_relative = 1e-3);
        assert!(traj.stats.jacobians > 0);
    }

    #[test]
    fn test_samples_end_exactly_at_t1() {
        let span = TimeSpan::new(0.3, 0.31).unwrap();
        let traj = integrate(&Decay, span, [2.0], &SolverConfig::default()).unwrap();
        assert_eq!(traj.times.len(), 10);
        assert_eq!(traj.states.len(), 10);
        assert_eq!(traj.times[0], 0.3);
        assert_eq!(*traj.times.last().unwrap(), 0.31);
        assert_eq!(*traj.states.last().unwrap(), traj.end);
    }

    #[test]
    fn test_empty_span_returns_initial_state() {
        let span = TimeSpan::new(2.0, 2.0).unwrap();
        let traj = integrate(&Decay, span, [0.7], &SolverConfig::default()).unwrap();
        assert_eq!(traj.end, [0.7]);
        assert_eq!(traj.stats.evaluations, 0);
    }

    #[test]
    fn test_stiff_scheme_takes_fewer_steps_on_stiff_problem() {
        let span = TimeSpan::new(0.0, 2.0).unwrap();
        let base = SolverConfig::default().with_tolerance(1e-4);
        let explicit = integrate(&StiffPair, span, [1.0, 0.0], &base.with_method(Method::NonStiff)).unwrap();
        let implicit = integrate(&StiffPair, span, [1.0, 0.0], &base.with_method(Method::Stiff)).unwrap();
        assert!(implicit.stats.accepted < explicit.stats.accepted);
        assert_relative_eq!(implicit.end[1], explicit.end[1], max_relative = 1e-2);
        assert_relative_eq!(explicit.end[0], (-2.0f64).exp(), max_relative = 1e-3);
    }

    #[test]
    fn test_auto_agrees_with_reference_on_stiff_problem() {
        let span = TimeSpan::new(0.0, 2.0).unwrap();
        let config = SolverConfig::default().with_tolerance(1e-4);
        let traj = integrate(&StiffPair, span, [1.0, 0.0], &config).unwrap();
        assert_relative_eq!(traj.end[0], (-2.0f64).exp(), max_relative = 1e-2);
        assert_relative_eq!(traj.end[1], (-2.0f64).exp(), max_relative = 1e-2);
    }

    #[test]
    fn test_loose_tolerance_auto_switches_before_going_unstable() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let traj = integrate(&Tracking, span, [1.0], &SolverConfig::default()).unwrap();
        assert_eq!(traj.final_regime, Regime::Stiff);
        assert!(traj.stats.switches >= 1);
        for (t, y) in traj.times.iter().zip(&traj.states) {
            assert!((y[0] - t.cos()).abs() < 0.15, "t = {t}: {}", y[0]);
        }
    }

    #[test]
    fn test_explicit_steps_stay_inside_stability_region() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let config = SolverConfig::default().with_method(Method::NonStiff);
        let traj = integrate(&Tracking, span, [1.0], &config).unwrap();
        assert_eq!(traj.final_regime, Regime::NonStiff);
        assert_eq!(traj.stats.switches, 0);
        // Bounded by the stability limit 0.9 * 3.3 / 1e4 per step
        assert!(traj.stats.accepted >= 3000);
        for (t, y) in traj.times.iter().zip(&traj.states) {
            assert!((y[0] - t.cos()).abs() < 0.1, "t = {t}: {}", y[0]);
        }
    }

    #[test]
    fn test_finite_time_blowup_reports_divergence() {
        let span = TimeSpan::new(0.0, 2.0).unwrap();
        let config = SolverConfig::default().with_tolerance(1e-6).with_method(Method::NonStiff);
        let err = integrate(&Blowup, span, [1.0], &config).unwrap_err();
        assert!(matches!(err, DynamicsError::IntegrationDivergence { .. }), "{err:?}");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_derivative_error_propagates() {
        let span = TimeSpan::new(0.0, 1.0).unwrap();
        let err = integrate(&FailsLate, span, [0.0], &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, DynamicsError::SingularSlip { .. }));
    }

    #[test]
    fn test_repeat_runs_are_bit_identical() {
        let span = TimeSpan::new(0.0, 0.5).unwrap();
        let a = integrate(&StiffPair, span, [1.0, 0.0], &SolverConfig::default()).unwrap();
        let b = integrate(&StiffPair, span, [1.0, 0.0], &SolverConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: SolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SolverConfig::default());
        let stiff: SolverConfig = serde_json::from_str(r#"{"method":"stiff","tolerance":0.01}"#).unwrap();
        assert_eq!(stiff.method, Method::Stiff);
        assert!(SolverConfig::default().with_output_points(1).validate().is_err());
    }
}
