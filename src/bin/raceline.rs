use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use raceline::conservation::{batch_validate_conservation, BatchReport, ScenarioBatch};
use raceline::constants::*;
use raceline::optimizer::{
    optimize, Driver, OptimizationOutcome, OptimizerConfig, StackingConstraints,
};
use raceline::{calculate_max_position_swaps, env_config, logging};

#[derive(Parser)]
#[command(name = "raceline", version, about = "Race-outcome validation and lineup optimization")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build salary-capped lineups from a JSON driver pool
    Optimize(OptimizeArgs),
    /// Report the conservation rejection rate of unconstrained sampled scenarios
    Validate(ValidateArgs),
}

#[derive(Args)]
struct OptimizeArgs {
    /// JSON array of drivers: {driver_id, name, team, salary, projected_points, value_score?}
    #[arg(long)]
    pool: PathBuf,
    #[arg(long, default_value_t = DEFAULT_NUM_LINEUPS)]
    lineups: usize,
    #[arg(long, default_value_t = DEFAULT_SALARY_CAP)]
    salary_cap: u32,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f64,
    /// RNG seed (default: RACELINE_SEED, then 42)
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 0)]
    min_stack: usize,
    #[arg(long, default_value_t = LINEUP_SIZE)]
    max_stack: usize,
    /// Driver id to leave out (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,
    /// Keep only one copy of each roster
    #[arg(long)]
    distinct: bool,
    /// Cancel the search after this many seconds
    #[arg(long)]
    time_limit: Option<f64>,
}

#[derive(Args)]
struct ValidateArgs {
    #[arg(long, default_value_t = 100_000)]
    scenarios: usize,
    #[arg(long, default_value_t = 40)]
    drivers: usize,
    #[arg(long, default_value_t = 200)]
    race_length: u32,
    #[arg(long, default_value_t = 170)]
    green_flag_laps: u32,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

#[derive(Serialize)]
struct ValidateSummary {
    threads: usize,
    race_length: u32,
    green_flag_laps: u32,
    max_position_swaps: u32,
    elapsed_ms: u64,
    #[serde(flatten)]
    report: BatchReport,
}

/// Instant `secs` seconds from now, or an error for limits a `Duration` cannot hold.
fn deadline_after(secs: f64) -> Result<Instant> {
    let limit = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("invalid --time-limit {secs}"))?;
    match Instant::now().checked_add(limit) {
        Some(deadline) => Ok(deadline),
        None => bail!("--time-limit {secs} is too far in the future"),
    }
}

fn run_optimize(args: OptimizeArgs) -> Result<()> {
    let text = fs::read_to_string(&args.pool)
        .with_context(|| format!("failed to read driver pool {}", args.pool.display()))?;
    let drivers: Vec<Driver> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse driver pool {}", args.pool.display()))?;

    let mut config = env_config::optimizer_config(OptimizerConfig {
        num_lineups: args.lineups,
        salary_cap: args.salary_cap,
        iterations: args.iterations,
        temperature: args.temperature,
        distinct_lineups: args.distinct,
        ..Default::default()
    });
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let constraints = StackingConstraints {
        min_stack: args.min_stack,
        max_stack: args.max_stack,
        exclude_drivers: args.exclude.into_iter().collect(),
    };

    let deadline = args.time_limit.map(deadline_after).transpose()?;
    let outcome = optimize(
        &drivers,
        &config,
        &constraints,
        |current, total, best| info!(current, total, best, "progress"),
        || deadline.is_some_and(|d| Instant::now() >= d),
    )
    .context("optimizer rejected its input")?;

    match outcome {
        OptimizationOutcome::Completed(report) => {
            if report.lineups.len() < config.num_lineups {
                info!(
                    found = report.lineups.len(),
                    requested = config.num_lineups,
                    "constraints left the population short"
                );
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        OptimizationOutcome::Cancelled {
            iterations_completed,
            ..
        } => bail!("search cancelled after {iterations_completed} iterations"),
    }
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let threads = env_config::init_rayon_threads_lenient();
    let start = Instant::now();

    let batch = ScenarioBatch::sample_unconstrained(
        args.scenarios,
        args.drivers,
        args.race_length,
        args.green_flag_laps,
        args.seed,
    );
    let max_swaps = calculate_max_position_swaps(args.drivers as u32, args.green_flag_laps);
    let verdicts =
        batch_validate_conservation(&batch, args.race_length, args.green_flag_laps, max_swaps);

    let summary = ValidateSummary {
        threads,
        race_length: args.race_length,
        green_flag_laps: args.green_flag_laps,
        max_position_swaps: max_swaps,
        elapsed_ms: start.elapsed().as_millis() as u64,
        report: BatchReport::from_verdicts(&verdicts),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Optimize(args) => run_optimize(args),
        Command::Validate(args) => run_validate(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_after_rejects_bad_limits() {
        assert!(deadline_after(f64::INFINITY).is_err());
        assert!(deadline_after(f64::NAN).is_err());
        assert!(deadline_after(-1.0).is_err());
        assert!(deadline_after(1e300).is_err());
    }

    #[test]
    fn test_deadline_after_accepts_finite_limit() {
        let before = Instant::now();
        let deadline = deadline_after(2.5).unwrap();
        assert!(deadline >= before + Duration::from_millis(2_500));
    }
}
