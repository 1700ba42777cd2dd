//! Environment configuration shared by the `raceline` binary.
//!
//! - `RACELINE_SEED`: overrides the optimizer's default seed
//! - `RAYON_NUM_THREADS` (fallback `OMP_NUM_THREADS`): batch-validation pool size

use std::str::FromStr;
use tracing::{info, warn};

use crate::optimizer::OptimizerConfig;

pub const SEED_VAR: &str = "RACELINE_SEED";

/// Parse `raw` as `T`, warning (not failing) when it is malformed.
fn parse_value<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}

fn read_var<T: FromStr>(name: &str) -> Option<T> {
    parse_value(name, std::env::var(name).ok())
}

/// Seed from `RACELINE_SEED`, if set and valid.
pub fn seed_override() -> Option<u64> {
    read_var(SEED_VAR)
}

/// `base` with any environment overrides applied.
pub fn optimizer_config(base: OptimizerConfig) -> OptimizerConfig {
    match seed_override() {
        Some(seed) => OptimizerConfig { seed, ..base },
        None => base,
    }
}

/// Size the global rayon pool from `RAYON_NUM_THREADS` / `OMP_NUM_THREADS`.
///
/// Tolerates an already-initialized pool. Returns the thread count in effect.
pub fn init_rayon_threads_lenient() -> usize {
    let requested: Option<usize> =
        read_var("RAYON_NUM_THREADS").or_else(|| read_var("OMP_NUM_THREADS"));
    if let Some(n) = requested {
        // May fail if already initialized
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
    }
    let threads = rayon::current_num_threads();
    info!(threads, "rayon pool ready");
    threads
}
