//! Per-entry route validation.
//!
//! Validation is deliberately entry-local: it answers "can this one route be
//! installed?" and never looks at its neighbours.
use crate::{
    config::models::RouteEntry,
    core::backend::{RouteTarget, TargetError},
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Reasons a single route entry is rejected
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Route host must not be empty")]
    EmptyHost,

    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
}

/// Validate one host/target pair.
pub fn validate_route(host: &str, target: &str) -> ValidationResult<RouteEntry> {
    if host.is_empty() {
        return Err(ValidationError::EmptyHost);
    }

    let target = RouteTarget::new(target)?;
    Ok(RouteEntry::new(host, target))
}
