//! Transition algebra for scripting race progression.
//!
//! A [`TransitionOperator`] is a named pure function `RaceState -> RaceState`.
//! Operators compose left-to-right with [`compose`] (or the fluent
//! [`TransitionOperator::then`]); the composite is itself an operator, so
//! skeletons such as "ten green laps, a caution, a pit cycle" are built by
//! composition and applied in one call.
//!
//! Every operator either returns a snapshot that passed the full
//! [`RaceState`] invariant check or fails with a [`StateError`]. Composition
//! short-circuits on the first failure, so no malformed intermediate state is
//! ever observable.

use std::fmt;
use std::sync::Arc;

use crate::constants::{
    CAUTION_FUEL_FACTOR, CAUTION_TIRE_FACTOR, FUEL_BURN_PER_LAP, TIRE_WEAR_PER_LAP,
};
use crate::error::StateError;
use crate::types::{DriverState, RaceSegment, RaceState};

type TransitionFn = dyn Fn(&RaceState) -> Result<RaceState, StateError> + Send + Sync;

/// Named, shareable state transformer.
#[derive(Clone)]
pub struct TransitionOperator {
    name: String,
    func: Arc<TransitionFn>,
}

impl TransitionOperator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RaceState) -> Result<RaceState, StateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, state: &RaceState) -> Result<RaceState, StateError> {
        (self.func)(state)
    }

    /// `self` followed by `next`. Same as [`compose`]`(self, next)`.
    pub fn then(&self, next: &TransitionOperator) -> TransitionOperator {
        compose(self, next)
    }

    /// Left fold of `ops` under composition; empty input yields [`identity`].
    pub fn sequence<I>(ops: I) -> TransitionOperator
    where
        I: IntoIterator<Item = TransitionOperator>,
    {
        let mut iter = ops.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, |acc, op| compose(&acc, &op)),
            None => identity(),
        }
    }

    /// `self` applied `times` times in a row.
    pub fn repeat(&self, times: usize) -> TransitionOperator {
        let op = self.clone();
        TransitionOperator::new(format!("{} x{}", self.name, times), move |state| {
            let mut current = state.clone();
            for _ in 0..times {
                current = op.apply(&current)?;
            }
            Ok(current)
        })
    }
}

impl fmt::Debug for TransitionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionOperator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Apply `first`, then `second` to its result.
pub fn compose(first: &TransitionOperator, second: &TransitionOperator) -> TransitionOperator {
    let (a, b) = (first.clone(), second.clone());
    TransitionOperator::new(format!("{} >> {}", first.name, second.name), move |state| {
        b.apply(&a.apply(state)?)
    })
}

fn illegal(operator: &str, reason: impl Into<String>) -> StateError {
    StateError::IllegalTransition {
        operator: operator.to_string(),
        reason: reason.into(),
    }
}

// ── Built-in operators ──────────────────────────────────────────────

pub fn identity() -> TransitionOperator {
    TransitionOperator::new("identity", |state| Ok(state.clone()))
}

/// Run one lap.
///
/// Running cars outside the pits burn fuel and wear tires (at reduced rates
/// under caution). The running leader is credited with the lap led. An active
/// caution counts down and the race returns to green when it expires.
pub fn advance_lap() -> TransitionOperator {
    TransitionOperator::new("advance_lap", |state| {
        if state.is_final_lap() {
            return Err(illegal(
                "advance_lap",
                format!("race already on final lap {}", state.race_length()),
            ));
        }

        let under_caution = state.segment() == RaceSegment::Caution;
        let (burn, wear) = if under_caution {
            (
                FUEL_BURN_PER_LAP * CAUTION_FUEL_FACTOR,
                TIRE_WEAR_PER_LAP * CAUTION_TIRE_FACTOR,
            )
        } else {
            (FUEL_BURN_PER_LAP, TIRE_WEAR_PER_LAP)
        };
        let leader_id = state.leader().map(|(id, _)| id.to_string());

        let mut drivers = state.drivers().clone();
        for (id, driver) in drivers.iter_mut() {
            if driver.dnf() {
                continue;
            }
            let mut next = driver.clone();
            if !driver.in_pit() {
                next = next
                    .with_fuel_level((driver.fuel_level() - burn).max(0.0))?
                    .with_tire_wear((driver.tire_wear() + wear).min(1.0))?;
            }
            if leader_id.as_deref() == Some(id.as_str()) {
                let laps_led = driver.laps_led().checked_add(1).ok_or_else(|| {
                    illegal("advance_lap", format!("laps led by '{id}' overflows u32"))
                })?;
                next = next.with_laps_led(laps_led)?;
            }
            *driver = next;
        }

        let (segment, caution_left) = match state.segment() {
            RaceSegment::Caution => match state.active_caution_laps() - 1 {
                0 => (RaceSegment::GreenFlag, 0),
                left => (RaceSegment::Caution, left),
            },
            other => (other, 0),
        };

        RaceState::new(
            state.lap() + 1,
            state.race_length(),
            segment,
            drivers,
            caution_left,
        )
    })
}

/// Throw a caution lasting `laps` laps.
pub fn deploy_caution(laps: u32) -> TransitionOperator {
    TransitionOperator::new(format!("deploy_caution({laps})"), move |state| {
        if laps == 0 {
            return Err(illegal("deploy_caution", "caution must last at least one lap"));
        }
        state.with_segment(RaceSegment::Caution, laps)
    })
}

/// Back to green, dropping any remaining caution laps.
pub fn clear_caution() -> TransitionOperator {
    TransitionOperator::new("clear_caution", |state| {
        state.with_segment(RaceSegment::GreenFlag, 0)
    })
}

fn open_green_segment(name: &'static str, segment: RaceSegment) -> TransitionOperator {
    TransitionOperator::new(name, move |state| {
        if state.segment() == RaceSegment::Caution {
            return Err(illegal(
                name,
                format!(
                    "{} caution laps still active; clear the caution first",
                    state.active_caution_laps()
                ),
            ));
        }
        state.with_segment(segment, 0)
    })
}

pub fn open_pit_cycle() -> TransitionOperator {
    open_green_segment("open_pit_cycle", RaceSegment::PitCycle)
}

pub fn open_fuel_window() -> TransitionOperator {
    open_green_segment("open_fuel_window", RaceSegment::FuelWindow)
}

/// Bring `driver_id` onto pit road: full tank, fresh tires.
pub fn enter_pit(driver_id: &str) -> TransitionOperator {
    let id = driver_id.to_string();
    TransitionOperator::new(format!("enter_pit({id})"), move |state| {
        let driver = state.driver(&id)?;
        if driver.dnf() {
            return Err(illegal("enter_pit", format!("'{id}' has retired")));
        }
        let serviced = DriverState::new(
            driver.position(),
            1.0,
            0.0,
            driver.laps_led(),
            true,
            false,
        )?;
        state.with_driver(&id, serviced)
    })
}

pub fn exit_pit(driver_id: &str) -> TransitionOperator {
    let id = driver_id.to_string();
    TransitionOperator::new(format!("exit_pit({id})"), move |state| {
        let driver = state.driver(&id)?;
        if !driver.in_pit() {
            return Err(illegal("exit_pit", format!("'{id}' is not in the pits")));
        }
        state.with_driver(&id, driver.with_in_pit(false)?)
    })
}

/// Retire `driver_id`. A car retiring from pit road leaves the pits first.
pub fn retire(driver_id: &str) -> TransitionOperator {
    let id = driver_id.to_string();
    TransitionOperator::new(format!("retire({id})"), move |state| {
        let driver = state.driver(&id)?;
        let retired = driver.with_in_pit(false)?.with_dnf(true)?;
        state.with_driver(&id, retired)
    })
}

/// Exchange the positions of two running drivers (an overtake).
pub fn swap_positions(first: &str, second: &str) -> TransitionOperator {
    let (a, b) = (first.to_string(), second.to_string());
    TransitionOperator::new(format!("swap_positions({a}, {b})"), move |state| {
        if a == b {
            return Err(illegal("swap_positions", "a driver cannot pass itself"));
        }
        let (da, db) = (state.driver(&a)?, state.driver(&b)?);
        if da.dnf() || db.dnf() {
            return Err(illegal("swap_positions", "retired drivers hold no position"));
        }
        let mut drivers = state.drivers().clone();
        drivers.insert(a.clone(), da.with_position(db.position())?);
        drivers.insert(b.clone(), db.with_position(da.position())?);
        state.with_drivers(drivers)
    })
}
