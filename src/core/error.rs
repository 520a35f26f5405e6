use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("{field} must be {requirement}, got {value}")]
    InvalidInput {
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error(
        "savings reached {savings:.2} of the {target:.2} down payment after {months} months without converging"
    )]
    DidNotConverge { months: u32, savings: f64, target: f64 },
}

impl ProjectionError {
    pub(crate) fn invalid(field: &'static str, requirement: &'static str, value: f64) -> Self {
        Self::InvalidInput {
            field,
            requirement,
            value,
        }
    }
}

pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), ProjectionError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ProjectionError::invalid(field, "a finite number > 0", value));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &'static str, value: f64) -> Result<(), ProjectionError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ProjectionError::invalid(field, "a finite number >= 0", value));
    }
    Ok(())
}

pub(crate) fn require_fraction(field: &'static str, value: f64) -> Result<(), ProjectionError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ProjectionError::invalid(field, "between 0 and 1", value));
    }
    Ok(())
}
