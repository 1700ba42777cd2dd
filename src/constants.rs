//! Race and lineup constants.
//!
//! Two groups live here:
//! - lineup search parameters used by [`crate::optimizer`] (roster size, budget,
//!   iteration budget, softmax temperature, construction retry budget);
//! - per-lap resource rates used by the built-in [`crate::transitions`]
//!   operators when scripting race skeletons.

/// Number of competitors in one lineup.
pub const LINEUP_SIZE: usize = 6;

/// Default salary budget per lineup.
pub const DEFAULT_SALARY_CAP: u32 = 50_000;

/// Default number of lineups kept in the elite population.
pub const DEFAULT_NUM_LINEUPS: usize = 20;

/// Default iteration budget for one optimization run.
pub const DEFAULT_ITERATIONS: usize = 1_000;

/// Hard ceiling on the iteration budget. Larger requests are clamped.
pub const MAX_ITERATIONS: usize = 5_000;

/// Softmax temperature for `exp(projected_points / T)` sampling.
///
/// Projected points typically sit in the 10..70 range, so T=10 keeps the
/// top of the pool favoured without collapsing to pure greedy.
pub const DEFAULT_TEMPERATURE: f64 = 10.0;

/// Fixed default seed. Callers that want diverse runs pass their own.
pub const DEFAULT_SEED: u64 = 42;

/// Local retries per candidate before it is discarded for the iteration.
pub const MAX_CONSTRUCTION_RETRIES: usize = 100;

/// Weight of the value score in the lineup objective:
/// `lineup_score = total_projected_points + VALUE_BONUS_WEIGHT * total_value`.
pub const VALUE_BONUS_WEIGHT: f64 = 0.1;

/// Progress is reported every `iterations / PROGRESS_STEPS` iterations (~1%).
pub const PROGRESS_STEPS: usize = 100;

/// Fraction of the tank burned per green-flag lap.
pub const FUEL_BURN_PER_LAP: f64 = 0.02;

/// Fuel burn under caution, as a fraction of the green-flag rate.
pub const CAUTION_FUEL_FACTOR: f64 = 0.5;

/// Tire wear added per green-flag lap.
pub const TIRE_WEAR_PER_LAP: f64 = 0.015;

/// Tire wear under caution, as a fraction of the green-flag rate.
pub const CAUTION_TIRE_FACTOR: f64 = 0.25;

/// One passing opportunity per this many green-flag laps (position-swap cap).
pub const GREEN_LAPS_PER_SWAP: u32 = 10;

/// Swaps allowed per competitor in the position-swap cap.
pub const SWAPS_PER_COMPETITOR: u32 = 2;
