//! Constrained lineup optimizer.
//!
//! - [`lineup`]: pool entries, stacking constraints, scored lineups
//! - [`search`]: the stochastic search loop ([`optimize`], [`LineupOptimizer`])

pub mod lineup;
pub mod search;

pub use lineup::{Driver, Lineup, StackingConstraints};
pub use search::{
    optimize, LineupOptimizer, OptimizationOutcome, OptimizationReport, OptimizerConfig,
};
