//! Field-level validation shared by create and update schemas.

use crate::domain::error::DomainError;

/// Implemented by every inbound schema; runs before the payload reaches storage.
pub trait Validate {
    fn validate(&self) -> Result<(), DomainError>;
}

/// Checks that a string's character count lies within `min..=max`.
pub fn ensure_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), DomainError> {
    let length = value.chars().count();
    if length < min {
        return Err(DomainError::validation(
            field,
            format!("must contain at least {min} characters, got {length}"),
        ));
    }
    if length > max {
        return Err(DomainError::validation(
            field,
            format!("must contain at most {max} characters, got {length}"),
        ));
    }
    Ok(())
}

pub fn ensure_optional_length(
    field: &'static str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> Result<(), DomainError> {
    match value {
        Some(value) => ensure_length(field, value, min, max),
        None => Ok(()),
    }
}

pub fn ensure_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<(), DomainError> {
    if value < min || value > max {
        return Err(DomainError::validation(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
    Ok(())
}

pub fn ensure_positive_id(field: &'static str, value: i64) -> Result<(), DomainError> {
    if value <= 0 {
        return Err(DomainError::validation(field, "must be a positive identifier"));
    }
    Ok(())
}
