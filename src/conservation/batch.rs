//! Batch conservation checks over many candidate scenarios.
//!
//! Scenarios are stored as one flat `u32` buffer with logical shape
//! `[n_scenarios, n_drivers, 2]`, last axis `(laps_led, fastest_laps)`:
//!
//! ```text
//! values[(s * n_drivers + d) * 2]     = laps led by driver d in scenario s
//! values[(s * n_drivers + d) * 2 + 1] = fastest laps by driver d in scenario s
//! ```
//!
//! [`batch_validate_conservation`] maps each scenario slice independently on the
//! rayon pool; [`batch_validate_conservation_sequential`] is the explicit-loop
//! reference built from the scalar laws. Both agree per scenario. The
//! position-swap law needs start/finish data and is not part of this path.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use super::laws::{validate_fastest_laps_conservation, validate_laps_led_conservation};
use crate::error::BatchShapeError;

/// Values per driver per scenario: laps led, fastest laps.
pub const SCENARIO_FIELDS: usize = 2;

/// Flat `[n_scenarios, n_drivers, 2]` buffer of candidate outcomes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioBatch {
    values: Vec<u32>,
    n_scenarios: usize,
    n_drivers: usize,
}

impl ScenarioBatch {
    pub fn new(
        values: Vec<u32>,
        n_scenarios: usize,
        n_drivers: usize,
    ) -> Result<Self, BatchShapeError> {
        let expected = n_scenarios
            .checked_mul(n_drivers)
            .and_then(|n| n.checked_mul(SCENARIO_FIELDS));
        if expected != Some(values.len()) {
            return Err(BatchShapeError {
                len: values.len(),
                n_scenarios,
                n_drivers,
                expected,
            });
        }
        Ok(Self {
            values,
            n_scenarios,
            n_drivers,
        })
    }

    /// Build from per-scenario rows of `[laps_led, fastest_laps]`.
    ///
    /// Every row must have the same driver count as the first.
    pub fn from_rows(rows: &[Vec<[u32; 2]>]) -> Result<Self, BatchShapeError> {
        let n_drivers = rows.first().map_or(0, Vec::len);
        let values: Vec<u32> = rows.iter().flatten().flatten().copied().collect();
        Self::new(values, rows.len(), n_drivers)
    }

    /// Naive independent draws, as an unconstrained simulator would produce.
    ///
    /// Each driver's laps led is uniform in `0..=2 * race_length / n_drivers`
    /// (fastest laps likewise against `green_flag_laps`), so the expected
    /// field total sits right at the conservation limit and a realistic share
    /// of scenarios is impossible. Scenario `s` uses seed `seed + s`.
    pub fn sample_unconstrained(
        n_scenarios: usize,
        n_drivers: usize,
        race_length: u32,
        green_flag_laps: u32,
        seed: u64,
    ) -> Self {
        let divisor = n_drivers.max(1) as u64;
        let bound = |laps: u32| (2 * u64::from(laps) / divisor).min(u64::from(u32::MAX)) as u32;
        let max_led = bound(race_length);
        let max_fastest = bound(green_flag_laps);

        let values: Vec<u32> = (0..n_scenarios)
            .into_par_iter()
            .flat_map_iter(|s| {
                let mut rng = SmallRng::seed_from_u64(seed.wrapping_add(s as u64));
                let mut row = Vec::with_capacity(n_drivers * SCENARIO_FIELDS);
                for _ in 0..n_drivers {
                    row.push(rng.random_range(0..=max_led));
                    row.push(rng.random_range(0..=max_fastest));
                }
                row
            })
            .collect();

        Self {
            values,
            n_scenarios,
            n_drivers,
        }
    }

    pub fn n_scenarios(&self) -> usize {
        self.n_scenarios
    }

    pub fn n_drivers(&self) -> usize {
        self.n_drivers
    }

    /// Interleaved `(laps_led, fastest_laps)` values of scenario `s`.
    pub fn scenario(&self, s: usize) -> &[u32] {
        let stride = self.n_drivers * SCENARIO_FIELDS;
        &self.values[s * stride..(s + 1) * stride]
    }

    pub fn laps_led(&self, s: usize) -> Vec<u32> {
        self.scenario(s).iter().step_by(SCENARIO_FIELDS).copied().collect()
    }

    pub fn fastest_laps(&self, s: usize) -> Vec<u32> {
        self.scenario(s)
            .iter()
            .skip(1)
            .step_by(SCENARIO_FIELDS)
            .copied()
            .collect()
    }
}

/// Both sum laws over one interleaved scenario slice.
#[inline(always)]
fn scenario_passes(slice: &[u32], race_length: u32, green_flag_laps: u32) -> bool {
    let mut led: u64 = 0;
    let mut fastest: u64 = 0;
    for pair in slice.chunks_exact(SCENARIO_FIELDS) {
        led += pair[0] as u64;
        fastest += pair[1] as u64;
    }
    led <= race_length as u64 && fastest <= green_flag_laps as u64
}

/// Laps-led and fastest-lap laws for every scenario, in parallel.
///
/// `result[s]` is true iff scenario `s` passes both laws. Scenarios are
/// checked independently, so the result does not depend on scheduling.
/// `_max_swaps` rides along for callers that apply the position-swap law
/// to the accepted subset afterwards.
pub fn batch_validate_conservation(
    batch: &ScenarioBatch,
    race_length: u32,
    green_flag_laps: u32,
    _max_swaps: u32,
) -> Vec<bool> {
    if batch.n_drivers == 0 {
        return vec![true; batch.n_scenarios];
    }
    batch
        .values
        .par_chunks(batch.n_drivers * SCENARIO_FIELDS)
        .map(|slice| scenario_passes(slice, race_length, green_flag_laps))
        .collect()
}

/// Reference path: the scalar laws applied scenario by scenario.
pub fn batch_validate_conservation_sequential(
    batch: &ScenarioBatch,
    race_length: u32,
    green_flag_laps: u32,
) -> Vec<bool> {
    (0..batch.n_scenarios)
        .map(|s| {
            validate_laps_led_conservation(&batch.laps_led(s), race_length).0
                && validate_fastest_laps_conservation(&batch.fastest_laps(s), green_flag_laps).0
        })
        .collect()
}

// ── Reporting ───────────────────────────────────────────────────────

/// Acceptance counts for one batch verdict vector.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub rejection_rate: f64,
}

impl BatchReport {
    pub fn from_verdicts(verdicts: &[bool]) -> Self {
        let total = verdicts.len();
        let accepted = verdicts.iter().filter(|&&ok| ok).count();
        let rejected = total - accepted;
        let rejection_rate = if total == 0 {
            0.0
        } else {
            rejected as f64 / total as f64
        };
        Self {
            total,
            accepted,
            rejected,
            rejection_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = ScenarioBatch::new(vec![0; 7], 2, 2).unwrap_err();
        assert_eq!(err.expected, Some(8));
        assert!(ScenarioBatch::from_rows(&[vec![[1, 1], [2, 2]], vec![[3, 3]]]).is_err());
    }

    #[test]
    fn test_overflowing_shape_rejected() {
        let err = ScenarioBatch::new(Vec::new(), usize::MAX, 2).unwrap_err();
        assert_eq!(err.expected, None);
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_slices_and_axes() {
        let batch = ScenarioBatch::from_rows(&[vec![[10, 1], [20, 2]], vec![[30, 3], [40, 4]]])
            .unwrap();
        assert_eq!(batch.scenario(1), &[30, 3, 40, 4]);
        assert_eq!(batch.laps_led(0), vec![10, 20]);
        assert_eq!(batch.fastest_laps(1), vec![3, 4]);
    }

    #[test]
    fn test_batch_boundaries() {
        let batch = ScenarioBatch::from_rows(&[
            vec![[100, 50], [100, 50]], // both at limit
            vec![[100, 50], [101, 50]], // laps led over
            vec![[50, 50], [50, 51]],   // fastest laps over
            vec![[0, 0], [0, 0]],
        ])
        .unwrap();
        let verdicts = batch_validate_conservation(&batch, 200, 100, 2);
        assert_eq!(verdicts, vec![true, false, false, true]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let batch = ScenarioBatch::sample_unconstrained(2_000, 12, 200, 170, 7);
        let fast = batch_validate_conservation(&batch, 200, 170, 24);
        let slow = batch_validate_conservation_sequential(&batch, 200, 170);
        assert_eq!(fast, slow);
    }

    #[test]
    fn test_sampler_mixes_accept_and_reject() {
        let batch = ScenarioBatch::sample_unconstrained(1_000, 20, 200, 180, 42);
        let report = BatchReport::from_verdicts(&batch_validate_conservation(&batch, 200, 180, 40));
        assert_eq!(report.total, 1_000);
        assert!(report.accepted > 0, "{report:?}");
        assert!(report.rejected > 0, "{report:?}");
    }

    #[test]
    fn test_sampler_long_races() {
        let batch = ScenarioBatch::sample_unconstrained(2, 4, 3_000_000_000, 10, 1);
        assert_eq!(batch.n_scenarios(), 2);
        for s in 0..2 {
            assert!(batch.laps_led(s).iter().all(|&l| l <= 1_500_000_000));
            assert!(batch.fastest_laps(s).iter().all(|&f| f <= 5));
        }
        let batch = ScenarioBatch::sample_unconstrained(3, 1, u32::MAX, u32::MAX, 1);
        assert_eq!(batch.laps_led(2).len(), 1);
    }

    #[test]
    fn test_sampler_deterministic() {
        let a = ScenarioBatch::sample_unconstrained(50, 5, 100, 90, 3);
        let b = ScenarioBatch::sample_unconstrained(50, 5, 100, 90, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_field_and_empty_batch() {
        let batch = ScenarioBatch::new(Vec::new(), 3, 0).unwrap();
        assert_eq!(batch_validate_conservation(&batch, 1, 1, 0), vec![true; 3]);
        let batch = ScenarioBatch::new(Vec::new(), 0, 4).unwrap();
        assert!(batch_validate_conservation(&batch, 1, 1, 0).is_empty());
        assert_eq!(BatchReport::from_verdicts(&[]).rejection_rate, 0.0);
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport::from_verdicts(&[true, false, false, true]);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejected, 2);
        assert!((report.rejection_rate - 0.5).abs() < 1e-12);
    }
}
