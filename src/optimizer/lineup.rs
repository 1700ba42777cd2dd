//! Optimizer inputs and outputs: [`Driver`], [`StackingConstraints`], [`Lineup`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::constants::{LINEUP_SIZE, VALUE_BONUS_WEIGHT};
use crate::error::OptimizerError;

// ── Driver ──────────────────────────────────────────────────────────

/// One selectable competitor in the pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_id: String,
    pub name: String,
    pub team: String,
    pub salary: u32,
    pub projected_points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_score: Option<f64>,
}

impl Driver {
    pub fn new(
        driver_id: impl Into<String>,
        name: impl Into<String>,
        team: impl Into<String>,
        salary: u32,
        projected_points: f64,
    ) -> Self {
        Self {
            driver_id: driver_id.into(),
            name: name.into(),
            team: team.into(),
            salary,
            projected_points,
            value_score: None,
        }
    }

    pub fn with_value_score(mut self, value_score: f64) -> Self {
        self.value_score = Some(value_score);
        self
    }

    /// Supplied value score, else projected points per $1000 of salary.
    pub fn value(&self) -> f64 {
        self.value_score
            .unwrap_or_else(|| self.projected_points * 1000.0 / self.salary as f64)
    }

    pub(crate) fn validate(&self) -> Result<(), OptimizerError> {
        let invalid = |reason: &str| OptimizerError::InvalidDriver {
            driver_id: self.driver_id.clone(),
            reason: reason.to_string(),
        };
        if self.driver_id.is_empty() {
            return Err(invalid("driver_id is empty"));
        }
        if self.salary == 0 {
            return Err(invalid("salary must be > 0"));
        }
        if !self.projected_points.is_finite() || self.projected_points < 0.0 {
            return Err(invalid("projected_points must be finite and >= 0"));
        }
        if self.value_score.is_some_and(|v| !v.is_finite()) {
            return Err(invalid("value_score must be finite"));
        }
        Ok(())
    }
}

// ── Constraints ─────────────────────────────────────────────────────

/// Team-stacking bounds and pool exclusions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackingConstraints {
    /// When > 0, at least one team must place this many drivers.
    pub min_stack: usize,
    /// No team may place more than this many drivers.
    pub max_stack: usize,
    /// Driver ids removed from the pool before search.
    pub exclude_drivers: BTreeSet<String>,
}

impl Default for StackingConstraints {
    fn default() -> Self {
        Self {
            min_stack: 0,
            max_stack: LINEUP_SIZE,
            exclude_drivers: BTreeSet::new(),
        }
    }
}

impl StackingConstraints {
    pub fn validate(&self) -> Result<(), OptimizerError> {
        if self.max_stack == 0 {
            return Err(OptimizerError::InvalidConstraints(
                "max_stack must be >= 1".to_string(),
            ));
        }
        if self.min_stack > self.max_stack {
            return Err(OptimizerError::InvalidConstraints(format!(
                "min_stack {} exceeds max_stack {}",
                self.min_stack, self.max_stack
            )));
        }
        if self.min_stack > LINEUP_SIZE {
            return Err(OptimizerError::InvalidConstraints(format!(
                "min_stack {} exceeds lineup size {LINEUP_SIZE}",
                self.min_stack
            )));
        }
        Ok(())
    }

    /// Whether a lineup with these per-team counts is acceptable.
    pub fn is_satisfied_by(&self, team_counts: &HashMap<&str, usize>) -> bool {
        let largest = team_counts.values().copied().max().unwrap_or(0);
        largest <= self.max_stack && (self.min_stack == 0 || largest >= self.min_stack)
    }
}

// ── Lineup ──────────────────────────────────────────────────────────

/// One complete roster with its aggregate metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Lineup {
    pub drivers: Vec<Driver>,
    pub total_salary: u32,
    pub total_projected_points: f64,
    pub total_value: f64,
    /// Population standard deviation of projected points within the lineup.
    pub risk_score: f64,
    /// Objective: `total_projected_points + 0.1 * total_value`.
    pub lineup_score: f64,
}

impl Lineup {
    /// Aggregate `drivers`. The caller guarantees size, distinctness and budget.
    pub(crate) fn from_drivers(drivers: Vec<Driver>) -> Self {
        let total_salary = drivers.iter().map(|d| d.salary).sum();
        let total_projected_points: f64 = drivers.iter().map(|d| d.projected_points).sum();
        let total_value: f64 = drivers.iter().map(Driver::value).sum();

        let n = drivers.len().max(1) as f64;
        let mean = total_projected_points / n;
        let variance = drivers
            .iter()
            .map(|d| (d.projected_points - mean).powi(2))
            .sum::<f64>()
            / n;

        Self {
            drivers,
            total_salary,
            total_projected_points,
            total_value,
            risk_score: variance.sqrt(),
            lineup_score: total_projected_points + VALUE_BONUS_WEIGHT * total_value,
        }
    }

    pub fn driver_ids(&self) -> Vec<&str> {
        self.drivers.iter().map(|d| d.driver_id.as_str()).collect()
    }

    /// Sorted driver ids; equal keys mean the same roster.
    pub fn roster_key(&self) -> Vec<&str> {
        let mut ids = self.driver_ids();
        ids.sort_unstable();
        ids
    }

    pub fn team_counts(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for d in &self.drivers {
            *counts.entry(d.team.as_str()).or_insert(0) += 1;
        }
        counts
    }
}
