//! Physical-conservation validators for race outcomes.
//!
//! - [`laws`]: scalar laws (laps led, fastest laps, position swaps) and the
//!   composite [`validate_race_state_conservation`]
//! - [`batch`]: parallel laps-led / fastest-lap check over many scenarios
//!
//! A failed check is a rejection, reported as data, never an error.

pub mod batch;
pub mod laws;

pub use batch::{
    batch_validate_conservation, batch_validate_conservation_sequential, BatchReport,
    ScenarioBatch,
};
pub use laws::{
    calculate_max_position_swaps, validate_fastest_laps_conservation,
    validate_laps_led_conservation, validate_position_swaps, validate_race_state_conservation,
    ConservationResult, DriverResult, RaceOutcome,
};
