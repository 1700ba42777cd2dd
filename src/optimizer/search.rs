//! Stochastic lineup search under a salary cap and team-stacking bounds.
//!
//! ## Algorithm
//!
//! Greedy-randomized construction feeding a fixed-size elite population:
//!
//! 1. Each iteration builds one candidate. Starting from the full budget, it
//!    repeatedly samples one driver among those still unused, affordable and
//!    stack-legal (their team below `max_stack`), with probability
//!    proportional to `exp(projected_points / T)`. The salary is deducted and
//!    sampling continues until the roster holds [`LINEUP_SIZE`] drivers.
//! 2. A construction that runs out of eligible drivers, or finishes without
//!    any team reaching `min_stack`, is retried from scratch up to
//!    [`MAX_CONSTRUCTION_RETRIES`] times. After that the iteration produces
//!    nothing. Under tight caps this can leave fewer than `num_lineups`
//!    lineups, which is a valid result.
//! 3. Until the population holds `num_lineups` members every candidate is
//!    inserted. Afterwards a candidate replaces the lowest-scoring member only
//!    if its score is strictly greater.
//!
//! The loop is single-threaded. Cancellation is polled once per iteration and
//! progress is reported synchronously about every 1% of the budget, with a
//! final report at `current == iterations`.
//!
//! Runs are isolated: one [`LineupOptimizer`] owns its pool copy, population
//! and RNG, so independent runs can execute on separate threads.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::lineup::{Driver, Lineup, StackingConstraints};
use crate::constants::*;
use crate::error::OptimizerError;

// ── Configuration ───────────────────────────────────────────────────

/// Search budget and objective parameters for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub num_lineups: usize,
    pub salary_cap: u32,
    /// Clamped to [`MAX_ITERATIONS`].
    pub iterations: usize,
    pub temperature: f64,
    /// Runs with equal seeds and inputs are identical.
    pub seed: u64,
    /// Discard candidates whose roster is already in the population.
    pub distinct_lineups: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            num_lineups: DEFAULT_NUM_LINEUPS,
            salary_cap: DEFAULT_SALARY_CAP,
            iterations: DEFAULT_ITERATIONS,
            temperature: DEFAULT_TEMPERATURE,
            seed: DEFAULT_SEED,
            distinct_lineups: false,
        }
    }
}

impl OptimizerConfig {
    fn validated(&self) -> Result<Self, OptimizerError> {
        if self.num_lineups == 0 {
            return Err(OptimizerError::InvalidConfig(
                "num_lineups must be >= 1".to_string(),
            ));
        }
        if self.salary_cap == 0 {
            return Err(OptimizerError::InvalidConfig(
                "salary_cap must be > 0".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(OptimizerError::InvalidConfig(
                "iterations must be >= 1".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(OptimizerError::InvalidConfig(format!(
                "temperature must be finite and > 0, got {}",
                self.temperature
            )));
        }
        let mut config = self.clone();
        if config.iterations > MAX_ITERATIONS {
            warn!(
                requested = config.iterations,
                max = MAX_ITERATIONS,
                "iteration budget clamped"
            );
            config.iterations = MAX_ITERATIONS;
        }
        Ok(config)
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Result of a run that went the full iteration budget.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationReport {
    /// Best first. May hold fewer than `num_lineups` entries.
    pub lineups: Vec<Lineup>,
    pub iterations_run: usize,
    pub candidates_built: usize,
    /// Iterations whose candidate exhausted the retry budget.
    pub candidates_discarded: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// How a run ended. Input errors are reported separately as [`OptimizerError`].
#[derive(Clone, Debug)]
pub enum OptimizationOutcome {
    Completed(OptimizationReport),
    Cancelled {
        iterations_completed: usize,
        best_score: Option<f64>,
    },
}

impl OptimizationOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OptimizationOutcome::Cancelled { .. })
    }

    /// Lineups of a completed run; `None` when cancelled.
    pub fn lineups(&self) -> Option<&[Lineup]> {
        match self {
            OptimizationOutcome::Completed(report) => Some(&report.lineups),
            OptimizationOutcome::Cancelled { .. } => None,
        }
    }

    pub fn into_lineups(self) -> Option<Vec<Lineup>> {
        match self {
            OptimizationOutcome::Completed(report) => Some(report.lineups),
            OptimizationOutcome::Cancelled { .. } => None,
        }
    }
}

// ── Optimizer ───────────────────────────────────────────────────────

/// One optimization run: pool, elite population and RNG stream.
pub struct LineupOptimizer {
    pool: Vec<Driver>,
    config: OptimizerConfig,
    constraints: StackingConstraints,
    rng: SmallRng,
    population: Vec<Lineup>,
    best_score: Option<f64>,
}

impl LineupOptimizer {
    /// Validate inputs and prepare the selectable pool.
    ///
    /// Fails before any search when the config, constraints or a driver is
    /// malformed, or when fewer than [`LINEUP_SIZE`] drivers remain after
    /// exclusions.
    pub fn new(
        drivers: &[Driver],
        config: &OptimizerConfig,
        constraints: &StackingConstraints,
    ) -> Result<Self, OptimizerError> {
        if drivers.len() < LINEUP_SIZE {
            return Err(OptimizerError::InsufficientDrivers {
                available: drivers.len(),
                required: LINEUP_SIZE,
            });
        }
        let config = config.validated()?;
        constraints.validate()?;

        let mut seen = BTreeSet::new();
        for driver in drivers {
            driver.validate()?;
            if !seen.insert(driver.driver_id.as_str()) {
                return Err(OptimizerError::InvalidDriver {
                    driver_id: driver.driver_id.clone(),
                    reason: "duplicate driver_id".to_string(),
                });
            }
        }

        let pool: Vec<Driver> = drivers
            .iter()
            .filter(|d| !constraints.exclude_drivers.contains(&d.driver_id))
            .cloned()
            .collect();
        if pool.len() < LINEUP_SIZE {
            return Err(OptimizerError::InsufficientDrivers {
                available: pool.len(),
                required: LINEUP_SIZE,
            });
        }

        Ok(Self {
            pool,
            rng: SmallRng::seed_from_u64(config.seed),
            population: Vec::with_capacity(config.num_lineups),
            config,
            constraints: constraints.clone(),
            best_score: None,
        })
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run the full search.
    ///
    /// `progress(current, total, best_score)` runs on this thread; `cancel()` is
    /// polled before every iteration and ends the run with
    /// [`OptimizationOutcome::Cancelled`] as soon as it returns true.
    pub fn run<P, C>(mut self, mut progress: P, mut cancel: C) -> OptimizationOutcome
    where
        P: FnMut(usize, usize, f64),
        C: FnMut() -> bool,
    {
        let start = Instant::now();
        let iterations = self.config.iterations;
        let report_every = (iterations / PROGRESS_STEPS).max(1);
        let mut built = 0usize;
        let mut discarded = 0usize;

        info!(
            pool = self.pool.len(),
            iterations,
            num_lineups = self.config.num_lineups,
            salary_cap = self.config.salary_cap,
            seed = self.config.seed,
            "lineup search started"
        );

        for iteration in 0..iterations {
            if cancel() {
                info!(
                    iterations_completed = iteration,
                    "lineup search cancelled"
                );
                return OptimizationOutcome::Cancelled {
                    iterations_completed: iteration,
                    best_score: self.best_score,
                };
            }

            match self.build_candidate() {
                Some(candidate) => {
                    built += 1;
                    self.offer(candidate);
                }
                None => {
                    discarded += 1;
                    trace!(iteration, "candidate discarded after retry budget");
                }
            }

            let current = iteration + 1;
            if current % report_every == 0 || current == iterations {
                progress(current, iterations, self.best_score.unwrap_or(0.0));
            }
        }

        let mut lineups = std::mem::take(&mut self.population);
        lineups.sort_by(|a, b| b.lineup_score.total_cmp(&a.lineup_score));

        let elapsed = start.elapsed();
        info!(
            lineups = lineups.len(),
            built,
            discarded,
            best = self.best_score.unwrap_or(0.0),
            elapsed_ms = elapsed.as_millis() as u64,
            "lineup search finished"
        );
        if lineups.len() < self.config.num_lineups {
            debug!(
                found = lineups.len(),
                requested = self.config.num_lineups,
                "population not filled"
            );
        }

        OptimizationOutcome::Completed(OptimizationReport {
            lineups,
            iterations_run: iterations,
            candidates_built: built,
            candidates_discarded: discarded,
            elapsed,
        })
    }

    /// One candidate, or `None` once the retry budget is spent.
    fn build_candidate(&mut self) -> Option<Lineup> {
        (0..MAX_CONSTRUCTION_RETRIES).find_map(|_| self.try_construct())
    }

    fn try_construct(&mut self) -> Option<Lineup> {
        let mut remaining = self.config.salary_cap;
        let mut used = vec![false; self.pool.len()];
        let mut team_counts: HashMap<&str, usize> = HashMap::new();
        let mut chosen: Vec<usize> = Vec::with_capacity(LINEUP_SIZE);
        let mut eligible: Vec<usize> = Vec::with_capacity(self.pool.len());

        while chosen.len() < LINEUP_SIZE {
            eligible.clear();
            eligible.extend((0..self.pool.len()).filter(|&i| {
                let d = &self.pool[i];
                !used[i]
                    && d.salary <= remaining
                    && team_counts.get(d.team.as_str()).copied().unwrap_or(0)
                        < self.constraints.max_stack
            }));
            if eligible.is_empty() {
                return None;
            }

            let pick = softmax_pick(
                &self.pool,
                &eligible,
                self.config.temperature,
                &mut self.rng,
            );
            let driver = &self.pool[pick];
            used[pick] = true;
            remaining -= driver.salary;
            *team_counts.entry(driver.team.as_str()).or_insert(0) += 1;
            chosen.push(pick);
        }

        if !self.constraints.is_satisfied_by(&team_counts) {
            return None;
        }
        Some(Lineup::from_drivers(
            chosen.into_iter().map(|i| self.pool[i].clone()).collect(),
        ))
    }

    /// Steady-state replacement into the elite population.
    fn offer(&mut self, candidate: Lineup) -> bool {
        if self.config.distinct_lineups {
            let key = candidate.roster_key();
            if self.population.iter().any(|l| l.roster_key() == key) {
                return false;
            }
        }

        let score = candidate.lineup_score;
        if self.population.len() < self.config.num_lineups {
            self.population.push(candidate);
        } else {
            let worst = self
                .population
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.lineup_score.total_cmp(&b.lineup_score))
                .map(|(i, l)| (i, l.lineup_score));
            match worst {
                Some((i, worst_score)) if score > worst_score => self.population[i] = candidate,
                _ => return false,
            }
        }
        self.best_score = Some(self.best_score.map_or(score, |b| b.max(score)));
        true
    }
}

/// Sample one index from `eligible` with weight `exp(points / T)`.
///
/// Weights are shifted by the maximum before exponentiation; the proportions
/// are unchanged and large point values cannot overflow.
fn softmax_pick(
    pool: &[Driver],
    eligible: &[usize],
    temperature: f64,
    rng: &mut SmallRng,
) -> usize {
    let max_points = eligible
        .iter()
        .map(|&i| pool[i].projected_points)
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = eligible
        .iter()
        .map(|&i| ((pool[i].projected_points - max_points) / temperature).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    let mut target = rng.random::<f64>() * total;
    for (&i, &w) in eligible.iter().zip(&weights) {
        if target < w {
            return i;
        }
        target -= w;
    }
    eligible[eligible.len() - 1]
}

/// Validate inputs and run one search.
///
/// `Err` means the inputs were rejected and no search ran. `Ok` carries either
/// the completed population or the cancellation marker.
pub fn optimize<P, C>(
    drivers: &[Driver],
    config: &OptimizerConfig,
    constraints: &StackingConstraints,
    progress: P,
    cancel: C,
) -> Result<OptimizationOutcome, OptimizerError>
where
    P: FnMut(usize, usize, f64),
    C: FnMut() -> bool,
{
    Ok(LineupOptimizer::new(drivers, config, constraints)?.run(progress, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<Driver> {
        (0..n)
            .map(|i| {
                Driver::new(
                    format!("d{i}"),
                    format!("Driver {i}"),
                    format!("team{}", i % 4),
                    6_000 + (i as u32 % 7) * 700,
                    20.0 + (i % 9) as f64 * 4.0,
                )
            })
            .collect()
    }

    fn quiet() -> (impl FnMut(usize, usize, f64), impl FnMut() -> bool) {
        (|_, _, _| {}, || false)
    }

    #[test]
    fn test_softmax_prefers_high_points() {
        let drivers = vec![
            Driver::new("lo", "L", "t", 1, 0.0),
            Driver::new("hi", "H", "t", 1, 100.0),
        ];
        let mut rng = SmallRng::seed_from_u64(1);
        let hits = (0..1_000)
            .filter(|_| softmax_pick(&drivers, &[0, 1], 10.0, &mut rng) == 1)
            .count();
        assert!(hits > 990, "hits={hits}");
    }

    #[test]
    fn test_softmax_respects_eligible_subset() {
        let drivers = pool(10);
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..200 {
            let pick = softmax_pick(&drivers, &[2, 7], 1e-3, &mut rng);
            assert!(pick == 2 || pick == 7);
        }
    }

    #[test]
    fn test_config_rejects_degenerate_values() {
        for config in [
            OptimizerConfig {
                num_lineups: 0,
                ..Default::default()
            },
            OptimizerConfig {
                salary_cap: 0,
                ..Default::default()
            },
            OptimizerConfig {
                iterations: 0,
                ..Default::default()
            },
            OptimizerConfig {
                temperature: 0.0,
                ..Default::default()
            },
            OptimizerConfig {
                temperature: f64::NAN,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                config.validated(),
                Err(OptimizerError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_config_clamps_iterations() {
        let config = OptimizerConfig {
            iterations: 50_000,
            ..Default::default()
        };
        assert_eq!(config.validated().unwrap().iterations, MAX_ITERATIONS);
    }

    #[test]
    fn test_duplicate_driver_ids_rejected() {
        let mut drivers = pool(8);
        drivers[3].driver_id = "d0".to_string();
        let err = LineupOptimizer::new(
            &drivers,
            &OptimizerConfig::default(),
            &StackingConstraints::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, OptimizerError::InvalidDriver { .. }));
    }

    #[test]
    fn test_exclusions_can_starve_pool() {
        let drivers = pool(7);
        let constraints = StackingConstraints {
            exclude_drivers: ["d0", "d1"].iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        let err = LineupOptimizer::new(&drivers, &OptimizerConfig::default(), &constraints)
            .err()
            .unwrap();
        assert_eq!(
            err,
            OptimizerError::InsufficientDrivers {
                available: 5,
                required: LINEUP_SIZE
            }
        );
    }

    #[test]
    fn test_offer_replaces_only_strictly_better() {
        let drivers = pool(12);
        let config = OptimizerConfig {
            num_lineups: 1,
            ..Default::default()
        };
        let mut opt =
            LineupOptimizer::new(&drivers, &config, &StackingConstraints::default()).unwrap();
        let first = Lineup::from_drivers(drivers[0..6].to_vec());
        let same = first.clone();
        assert!(opt.offer(first.clone()));
        assert!(!opt.offer(same));

        let mut better_drivers = drivers[0..6].to_vec();
        better_drivers[0].projected_points += 1.0;
        let better = Lineup::from_drivers(better_drivers);
        assert!(opt.offer(better.clone()));
        assert_eq!(opt.population, vec![better]);
    }

    #[test]
    fn test_distinct_lineups_skips_repeat_rosters() {
        let drivers = pool(12);
        let config = OptimizerConfig {
            distinct_lineups: true,
            ..Default::default()
        };
        let mut opt =
            LineupOptimizer::new(&drivers, &config, &StackingConstraints::default()).unwrap();
        let lineup = Lineup::from_drivers(drivers[0..6].to_vec());
        assert!(opt.offer(lineup.clone()));
        assert!(!opt.offer(lineup));
        assert_eq!(opt.population.len(), 1);
    }

    #[test]
    fn test_try_construct_respects_cap_and_stacks() {
        let drivers = pool(24);
        let config = OptimizerConfig {
            salary_cap: 48_000,
            ..Default::default()
        };
        let constraints = StackingConstraints {
            min_stack: 2,
            max_stack: 2,
            ..Default::default()
        };
        let mut opt = LineupOptimizer::new(&drivers, &config, &constraints).unwrap();
        for _ in 0..50 {
            if let Some(lineup) = opt.build_candidate() {
                assert_eq!(lineup.drivers.len(), LINEUP_SIZE);
                assert!(lineup.total_salary <= 48_000);
                let counts = lineup.team_counts();
                assert!(counts.values().all(|&c| c <= 2));
                assert!(counts.values().any(|&c| c >= 2));
            }
        }
    }

    #[test]
    fn test_impossible_cap_yields_empty_completed_run() {
        let drivers = pool(10);
        let config = OptimizerConfig {
            salary_cap: 10_000,
            iterations: 20,
            ..Default::default()
        };
        let (progress, cancel) = quiet();
        let outcome = optimize(&drivers, &config, &StackingConstraints::default(), progress, cancel)
            .unwrap();
        match outcome {
            OptimizationOutcome::Completed(report) => {
                assert!(report.lineups.is_empty());
                assert_eq!(report.candidates_discarded, 20);
                assert_eq!(report.candidates_built, 0);
            }
            OptimizationOutcome::Cancelled { .. } => panic!("not cancelled"),
        }
    }
}
