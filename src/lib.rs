//! # Raceline: race-outcome validation and lineup optimization
//!
//! Generate, validate, optimize:
//!
//! | Stage | Module | Description |
//! |-------|--------|-------------|
//! | Model | [`types`] | Immutable, self-validating [`DriverState`] / [`RaceState`] snapshots |
//! | Script | [`transitions`] | Composable [`TransitionOperator`]s for what-if race skeletons |
//! | Validate | [`conservation`] | Laps-led, fastest-lap and position-swap conservation laws, scalar and batch |
//! | Optimize | [`optimizer`] | Salary-capped, stack-bounded stochastic lineup search |
//!
//! Simulated outcomes that break a conservation law are rejected before their
//! projections feed the optimizer. Rejections are data
//! ([`ConservationResult`], `(bool, String)`), structural faults are errors
//! ([`StateError`], [`OptimizerError`]), and a cancelled search is its own
//! [`OptimizationOutcome`] variant.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the binary (see [`logging::init`]).

pub mod conservation;
pub mod constants;
pub mod env_config;
pub mod error;
pub mod logging;
pub mod optimizer;
pub mod transitions;
pub mod types;

pub use conservation::{
    batch_validate_conservation, calculate_max_position_swaps, validate_fastest_laps_conservation,
    validate_laps_led_conservation, validate_position_swaps, validate_race_state_conservation,
    BatchReport, ConservationResult, RaceOutcome, ScenarioBatch,
};
pub use error::{BatchShapeError, OptimizerError, StateError};
pub use optimizer::{
    optimize, Driver, Lineup, OptimizationOutcome, OptimizerConfig, StackingConstraints,
};
pub use transitions::{compose, TransitionOperator};
pub use types::{DriverState, RaceSegment, RaceState};
