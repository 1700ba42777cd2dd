//! Scalar conservation laws and the composite per-outcome check.
//!
//! Each law answers `(is_valid, reason)`. The reason is empty on success and
//! embeds the offending total and the limit on failure, so identical inputs
//! always produce identical veto text. None of these functions return an
//! error: an implausible outcome is a normal rejection, not a fault.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{GREEN_LAPS_PER_SWAP, SWAPS_PER_COMPETITOR};
use crate::error::StateError;
use crate::types::RaceState;

/// Only one driver leads any lap: `sum(laps_led) <= race_length`.
pub fn validate_laps_led_conservation(laps_led: &[u32], race_length: u32) -> (bool, String) {
    let total: u64 = laps_led.iter().map(|&l| l as u64).sum();
    if total <= race_length as u64 {
        (true, String::new())
    } else {
        (
            false,
            format!("laps led total {total} exceeds race length {race_length}"),
        )
    }
}

/// Only one driver sets the fastest lap on any green-flag lap:
/// `sum(fastest_laps) <= green_flag_laps`.
pub fn validate_fastest_laps_conservation(
    fastest_laps: &[u32],
    green_flag_laps: u32,
) -> (bool, String) {
    let total: u64 = fastest_laps.iter().map(|&l| l as u64).sum();
    if total <= green_flag_laps as u64 {
        (true, String::new())
    } else {
        (
            false,
            format!("fastest laps total {total} exceeds green-flag laps {green_flag_laps}"),
        )
    }
}

/// Cap on `sum(|finish - start|)` over the field.
///
/// `max(min(2 * field_size, green_flag_laps / 10), field_size)`: the tighter of
/// two swaps per driver and one passing opportunity per ten green laps, never
/// below one swap per driver.
pub fn calculate_max_position_swaps(field_size: u32, green_flag_laps: u32) -> u32 {
    let per_driver = field_size.saturating_mul(SWAPS_PER_COMPETITOR);
    let per_green_lap = green_flag_laps / GREEN_LAPS_PER_SWAP;
    per_driver.min(per_green_lap).max(field_size)
}

/// Total position change must not exceed `max_swaps`.
///
/// `start_positions[i]` and `finish_positions[i]` belong to the same driver.
/// Mismatched lengths cannot describe one field and are rejected.
pub fn validate_position_swaps(
    start_positions: &[u32],
    finish_positions: &[u32],
    max_swaps: u32,
) -> (bool, String) {
    if start_positions.len() != finish_positions.len() {
        return (
            false,
            format!(
                "start/finish position counts differ ({} vs {})",
                start_positions.len(),
                finish_positions.len()
            ),
        );
    }
    let total: u64 = start_positions
        .iter()
        .zip(finish_positions)
        .map(|(&s, &f)| s.abs_diff(f) as u64)
        .sum();
    if total <= max_swaps as u64 {
        (true, String::new())
    } else {
        (
            false,
            format!("position swaps total {total} exceeds cap {max_swaps}"),
        )
    }
}

// ── Composite result ────────────────────────────────────────────────

/// Verdict of all three laws over one outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConservationResult {
    pub laps_led_valid: bool,
    pub fastest_laps_valid: bool,
    pub position_swaps_valid: bool,
    pub veto_reasons: Vec<String>,
}

impl Default for ConservationResult {
    fn default() -> Self {
        Self {
            laps_led_valid: true,
            fastest_laps_valid: true,
            position_swaps_valid: true,
            veto_reasons: Vec::new(),
        }
    }
}

impl ConservationResult {
    pub fn is_valid(&self) -> bool {
        self.laps_led_valid && self.fastest_laps_valid && self.position_swaps_valid
    }

    /// Record a veto reason. Empty and repeated reasons are ignored.
    pub fn add_veto(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !reason.is_empty() && !self.veto_reasons.contains(&reason) {
            self.veto_reasons.push(reason);
        }
    }
}

// ── Outcome input ───────────────────────────────────────────────────

/// One driver's line in a finished (or simulated) race.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResult {
    pub driver_id: String,
    pub start_position: u32,
    pub finish_position: u32,
    pub laps_led: u32,
    /// `None` when the source has no fastest-lap data.
    #[serde(default)]
    pub fastest_laps: Option<u32>,
}

/// A race outcome to be checked for physical plausibility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub race_length: u32,
    pub green_flag_laps: u32,
    pub results: Vec<DriverResult>,
}

impl RaceOutcome {
    /// Derive an outcome from the opening and closing snapshots of a scripted race.
    ///
    /// Every driver in `finish` must be present in `start`. Snapshots carry no
    /// fastest-lap data, so those entries are `None`.
    pub fn from_states(
        start: &RaceState,
        finish: &RaceState,
        green_flag_laps: u32,
    ) -> Result<Self, StateError> {
        let results = finish
            .drivers()
            .iter()
            .map(|(id, end)| {
                let begin = start.driver(id)?;
                Ok(DriverResult {
                    driver_id: id.clone(),
                    start_position: begin.position(),
                    finish_position: end.position(),
                    laps_led: end.laps_led(),
                    fastest_laps: None,
                })
            })
            .collect::<Result<Vec<_>, StateError>>()?;
        Ok(Self {
            race_length: finish.race_length(),
            green_flag_laps,
            results,
        })
    }

    pub fn field_size(&self) -> u32 {
        self.results.len() as u32
    }
}

/// Run all three laws over `outcome`.
///
/// Missing fastest-lap data counts as zero. The swap cap is derived from the
/// field size and `green_flag_laps` via [`calculate_max_position_swaps`].
pub fn validate_race_state_conservation(outcome: &RaceOutcome) -> ConservationResult {
    let mut result = ConservationResult::default();

    let laps_led: Vec<u32> = outcome.results.iter().map(|r| r.laps_led).collect();
    let fastest: Vec<u32> = outcome
        .results
        .iter()
        .map(|r| r.fastest_laps.unwrap_or(0))
        .collect();
    let starts: Vec<u32> = outcome.results.iter().map(|r| r.start_position).collect();
    let finishes: Vec<u32> = outcome.results.iter().map(|r| r.finish_position).collect();

    let (ok, reason) = validate_laps_led_conservation(&laps_led, outcome.race_length);
    result.laps_led_valid = ok;
    result.add_veto(reason);

    let (ok, reason) = validate_fastest_laps_conservation(&fastest, outcome.green_flag_laps);
    result.fastest_laps_valid = ok;
    result.add_veto(reason);

    let max_swaps = calculate_max_position_swaps(outcome.field_size(), outcome.green_flag_laps);
    let (ok, reason) = validate_position_swaps(&starts, &finishes, max_swaps);
    result.position_swaps_valid = ok;
    result.add_veto(reason);

    for reason in &result.veto_reasons {
        debug!(veto = %reason, "conservation veto");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transitions::{advance_lap, swap_positions, TransitionOperator};

    fn outcome(rows: &[(u32, u32, u32, Option<u32>)], race_length: u32, green: u32) -> RaceOutcome {
        RaceOutcome {
            race_length,
            green_flag_laps: green,
            results: rows
                .iter()
                .enumerate()
                .map(|(i, &(start, finish, led, fastest))| DriverResult {
                    driver_id: format!("d{i}"),
                    start_position: start,
                    finish_position: finish,
                    laps_led: led,
                    fastest_laps: fastest,
                })
                .collect(),
        }
    }

    #[test]
    fn test_laps_led_boundary() {
        assert_eq!(
            validate_laps_led_conservation(&[100, 50, 50], 200),
            (true, String::new())
        );
        let (ok, reason) = validate_laps_led_conservation(&[100, 50, 51], 200);
        assert!(!ok);
        assert_eq!(reason, "laps led total 201 exceeds race length 200");
    }

    #[test]
    fn test_laps_led_empty_field_is_valid() {
        assert!(validate_laps_led_conservation(&[], 1).0);
    }

    #[test]
    fn test_laps_led_no_overflow() {
        let (ok, reason) = validate_laps_led_conservation(&[u32::MAX, u32::MAX], u32::MAX);
        assert!(!ok);
        assert!(reason.contains("8589934590"));
    }

    #[test]
    fn test_fastest_laps_boundary() {
        assert!(validate_fastest_laps_conservation(&[90, 90], 180).0);
        let (ok, reason) = validate_fastest_laps_conservation(&[90, 91], 180);
        assert!(!ok);
        assert_eq!(reason, "fastest laps total 181 exceeds green-flag laps 180");
    }

    #[test]
    fn test_max_position_swaps_examples() {
        assert_eq!(calculate_max_position_swaps(40, 180), 40);
        assert_eq!(calculate_max_position_swaps(20, 50), 20);
        // Long green run: per-driver cap binds
        assert_eq!(calculate_max_position_swaps(10, 1000), 20);
        // Between the floor and the per-driver cap
        assert_eq!(calculate_max_position_swaps(10, 150), 15);
        assert_eq!(calculate_max_position_swaps(0, 500), 0);
    }

    #[test]
    fn test_position_swaps() {
        assert!(validate_position_swaps(&[1, 2, 3], &[3, 2, 1], 4).0);
        let (ok, reason) = validate_position_swaps(&[1, 2, 3], &[3, 2, 1], 3);
        assert!(!ok);
        assert_eq!(reason, "position swaps total 4 exceeds cap 3");
        let (ok, reason) = validate_position_swaps(&[1, 2], &[1], 10);
        assert!(!ok);
        assert!(reason.contains("differ"));
    }

    #[test]
    fn test_composite_valid_outcome() {
        let o = outcome(
            &[(1, 2, 60, Some(40)), (2, 1, 90, Some(50)), (3, 3, 50, None)],
            200,
            180,
        );
        let result = validate_race_state_conservation(&o);
        assert!(result.is_valid());
        assert!(result.veto_reasons.is_empty());
    }

    #[test]
    fn test_composite_missing_fastest_laps_is_not_failure() {
        let o = outcome(&[(1, 1, 10, None), (2, 2, 0, None)], 10, 0);
        let result = validate_race_state_conservation(&o);
        assert!(result.fastest_laps_valid);
        assert!(result.is_valid());
    }

    #[test]
    fn test_composite_collects_each_veto() {
        // 3 drivers, green=30 -> cap max(min(6, 3), 3) = 3; swaps = 4
        let o = outcome(
            &[(1, 3, 20, Some(20)), (2, 2, 15, Some(15)), (3, 1, 0, None)],
            30,
            30,
        );
        let result = validate_race_state_conservation(&o);
        assert!(!result.laps_led_valid);
        assert!(!result.fastest_laps_valid);
        assert!(!result.position_swaps_valid);
        assert!(!result.is_valid());
        assert_eq!(result.veto_reasons.len(), 3);
    }

    #[test]
    fn test_add_veto_dedups() {
        let mut result = ConservationResult::default();
        result.add_veto("x");
        result.add_veto("x");
        result.add_veto("");
        assert_eq!(result.veto_reasons, vec!["x".to_string()]);
    }

    #[test]
    fn test_from_states_scripted_race() {
        let start = RaceState::starting_grid(20, &["a", "b", "c"]).unwrap();
        let script = TransitionOperator::sequence([
            advance_lap().repeat(5),
            swap_positions("a", "b"),
            advance_lap().repeat(14),
        ]);
        let finish = script.apply(&start).unwrap();
        let o = RaceOutcome::from_states(&start, &finish, 19).unwrap();
        assert_eq!(o.field_size(), 3);
        let a = o.results.iter().find(|r| r.driver_id == "a").unwrap();
        assert_eq!((a.start_position, a.finish_position, a.laps_led), (1, 2, 5));
        assert!(validate_race_state_conservation(&o).is_valid());
    }

    #[test]
    fn test_from_states_unknown_driver() {
        let start = RaceState::starting_grid(20, &["a"]).unwrap();
        let finish = RaceState::starting_grid(20, &["b"]).unwrap();
        assert!(RaceOutcome::from_states(&start, &finish, 10).is_err());
    }
}
