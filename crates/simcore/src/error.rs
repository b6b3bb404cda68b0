use thiserror::Error;

/// Failures raised by the dynamics models and the integrator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynamicsError {
    /// The solver could not satisfy its tolerance within the step budget.
    #[error("integration diverged at t = {t}: {reason}")]
    IntegrationDivergence { t: f64, reason: String },

    /// Slip ratio requested with a zero ground velocity and regularisation disabled.
    #[error(
        "slip ratio is singular (wheel hub velocity {wheel_hub_velocity} m/s, ground velocity {ground_velocity} m/s)"
    )]
    SingularSlip {
        wheel_hub_velocity: f64,
        ground_velocity: f64,
    },

    /// A parameter is non-finite or outside its physical range.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameters { field: String, reason: String },

    /// The tick interval is reversed or not finite.
    #[error("invalid time interval [{t0}, {t1}]")]
    InvalidInterval { t0: f64, t1: f64 },
}

impl DynamicsError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        DynamicsError::InvalidParameters {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn divergence(t: f64, reason: impl Into<String>) -> Self {
        DynamicsError::IntegrationDivergence {
            t,
            reason: reason.into(),
        }
    }

    /// Whether a driver loop may skip the tick and hold its previous state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DynamicsError::IntegrationDivergence { .. } | DynamicsError::SingularSlip { .. }
        )
    }
}

/// Fails unless `value` is finite.
pub fn require_finite(field: &str, value: f64) -> Result<(), DynamicsError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DynamicsError::invalid(field, format!("must be finite, got {value}")))
    }
}

/// Fails unless `value` is finite and strictly positive.
pub fn require_positive(field: &str, value: f64) -> Result<(), DynamicsError> {
    require_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(DynamicsError::invalid(field, format!("must be > 0, got {value}")))
    }
}

/// Fails unless `value` is finite and not negative.
pub fn require_non_negative(field: &str, value: f64) -> Result<(), DynamicsError> {
    require_finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(DynamicsError::invalid(field, format!("must be >= 0, got {value}")))
    }
}
