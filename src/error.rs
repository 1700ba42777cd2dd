//! Structural error types.
//!
//! Only *faults* live here: malformed race snapshots, illegal scripted
//! transitions, bad optimizer input. Conservation failures and discarded
//! optimizer candidates are expected outcomes and are reported as data, never
//! as one of these errors.

use thiserror::Error;

/// Failure to build or transform a race snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid driver state: {reason}")]
    InvalidDriverState { reason: String },

    #[error("invalid race state: {reason}")]
    InvalidRaceState { reason: String },

    #[error("unknown driver '{0}'")]
    UnknownDriver(String),

    #[error("operator '{operator}' cannot be applied: {reason}")]
    IllegalTransition { operator: String, reason: String },
}

impl StateError {
    pub(crate) fn driver(reason: impl Into<String>) -> Self {
        StateError::InvalidDriverState {
            reason: reason.into(),
        }
    }

    pub(crate) fn race(reason: impl Into<String>) -> Self {
        StateError::InvalidRaceState {
            reason: reason.into(),
        }
    }
}

/// Flat scenario buffer whose length disagrees with its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "scenario buffer has {len} values, expected {n_scenarios} x {n_drivers} x 2 = {}",
    .expected.map_or_else(|| "overflow".to_string(), |e| e.to_string())
)]
pub struct BatchShapeError {
    pub len: usize,
    pub n_scenarios: usize,
    pub n_drivers: usize,
    /// `None` when the declared shape does not fit in `usize`.
    pub expected: Option<usize>,
}

/// Input-validation failure raised before any lineup search begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    #[error("need at least {required} selectable drivers, got {available}")]
    InsufficientDrivers { available: usize, required: usize },

    #[error("driver '{driver_id}' is invalid: {reason}")]
    InvalidDriver { driver_id: String, reason: String },

    #[error("invalid optimizer config: {0}")]
    InvalidConfig(String),

    #[error("invalid stacking constraints: {0}")]
    InvalidConstraints(String),
}
