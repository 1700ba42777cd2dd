//! Immutable race snapshots: [`DriverState`], [`RaceState`] and [`RaceSegment`].
//!
//! Both snapshot types are self-validating. The only ways to obtain one are the
//! checked constructors and the `with_*` copy-constructors, all of which re-run
//! the full invariant check and return [`StateError`] instead of a half-built
//! value. There are no setters.
//!
//! Invariants:
//! - driver: `position >= 1`, `fuel_level` and `tire_wear` in [0, 1], a retired
//!   (`dnf`) driver is never `in_pit`;
//! - race: `1 <= lap <= race_length`, at least one driver,
//!   `active_caution_laps > 0` iff the segment is [`RaceSegment::Caution`],
//!   non-retired positions are pairwise distinct.
//!
//! `lap == race_length` is the natural terminal condition. It is exposed via
//! [`RaceState::is_final_lap`] but not enforced here.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::StateError;

// ── Segment ─────────────────────────────────────────────────────────

/// Phase of the race the snapshot was taken in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceSegment {
    GreenFlag,
    Caution,
    PitCycle,
    FuelWindow,
}

impl RaceSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            RaceSegment::GreenFlag => "green_flag",
            RaceSegment::Caution => "caution",
            RaceSegment::PitCycle => "pit_cycle",
            RaceSegment::FuelWindow => "fuel_window",
        }
    }
}

impl fmt::Display for RaceSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Driver ──────────────────────────────────────────────────────────

/// One competitor's race state at a single instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DriverState {
    position: u32,
    fuel_level: f64,
    tire_wear: f64,
    laps_led: u32,
    in_pit: bool,
    dnf: bool,
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), StateError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(StateError::driver(format!("{name} must be in [0, 1], got {value}")))
    }
}

impl DriverState {
    pub fn new(
        position: u32,
        fuel_level: f64,
        tire_wear: f64,
        laps_led: u32,
        in_pit: bool,
        dnf: bool,
    ) -> Result<Self, StateError> {
        if position < 1 {
            return Err(StateError::driver("position must be >= 1"));
        }
        check_unit_interval("fuel_level", fuel_level)?;
        check_unit_interval("tire_wear", tire_wear)?;
        if dnf && in_pit {
            return Err(StateError::driver("a retired driver cannot be in the pits"));
        }
        Ok(Self {
            position,
            fuel_level,
            tire_wear,
            laps_led,
            in_pit,
            dnf,
        })
    }

    /// Fresh car on the grid: full tank, new tires, running.
    pub fn on_grid(position: u32) -> Result<Self, StateError> {
        Self::new(position, 1.0, 0.0, 0, false, false)
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn fuel_level(&self) -> f64 {
        self.fuel_level
    }

    pub fn tire_wear(&self) -> f64 {
        self.tire_wear
    }

    pub fn laps_led(&self) -> u32 {
        self.laps_led
    }

    pub fn in_pit(&self) -> bool {
        self.in_pit
    }

    pub fn dnf(&self) -> bool {
        self.dnf
    }

    /// Still classified as running (not retired).
    pub fn is_running(&self) -> bool {
        !self.dnf
    }

    pub fn with_position(&self, position: u32) -> Result<Self, StateError> {
        Self::new(
            position,
            self.fuel_level,
            self.tire_wear,
            self.laps_led,
            self.in_pit,
            self.dnf,
        )
    }

    pub fn with_fuel_level(&self, fuel_level: f64) -> Result<Self, StateError> {
        Self::new(
            self.position,
            fuel_level,
            self.tire_wear,
            self.laps_led,
            self.in_pit,
            self.dnf,
        )
    }

    pub fn with_tire_wear(&self, tire_wear: f64) -> Result<Self, StateError> {
        Self::new(
            self.position,
            self.fuel_level,
            tire_wear,
            self.laps_led,
            self.in_pit,
            self.dnf,
        )
    }

    pub fn with_laps_led(&self, laps_led: u32) -> Result<Self, StateError> {
        Self::new(
            self.position,
            self.fuel_level,
            self.tire_wear,
            laps_led,
            self.in_pit,
            self.dnf,
        )
    }

    pub fn with_in_pit(&self, in_pit: bool) -> Result<Self, StateError> {
        Self::new(
            self.position,
            self.fuel_level,
            self.tire_wear,
            self.laps_led,
            in_pit,
            self.dnf,
        )
    }

    pub fn with_dnf(&self, dnf: bool) -> Result<Self, StateError> {
        Self::new(
            self.position,
            self.fuel_level,
            self.tire_wear,
            self.laps_led,
            self.in_pit,
            dnf,
        )
    }
}

// ── Race ────────────────────────────────────────────────────────────

/// Whole-race snapshot keyed by competitor id.
///
/// Drivers are held in a `BTreeMap` so iteration order (and therefore every
/// derived quantity) is deterministic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RaceState {
    lap: u32,
    race_length: u32,
    segment: RaceSegment,
    drivers: BTreeMap<String, DriverState>,
    active_caution_laps: u32,
}

impl RaceState {
    pub fn new(
        lap: u32,
        race_length: u32,
        segment: RaceSegment,
        drivers: BTreeMap<String, DriverState>,
        active_caution_laps: u32,
    ) -> Result<Self, StateError> {
        if race_length < 1 {
            return Err(StateError::race("race_length must be >= 1"));
        }
        if lap < 1 || lap > race_length {
            return Err(StateError::race(format!(
                "lap {lap} outside 1..={race_length}"
            )));
        }
        if drivers.is_empty() {
            return Err(StateError::race("at least one driver is required"));
        }
        match segment {
            RaceSegment::Caution if active_caution_laps == 0 => {
                return Err(StateError::race(
                    "caution segment requires active_caution_laps > 0",
                ));
            }
            RaceSegment::GreenFlag | RaceSegment::PitCycle | RaceSegment::FuelWindow
                if active_caution_laps > 0 =>
            {
                return Err(StateError::race(format!(
                    "{segment} segment cannot carry {active_caution_laps} active caution laps"
                )));
            }
            _ => {}
        }

        let mut seen: HashMap<u32, &str> = HashMap::with_capacity(drivers.len());
        for (id, driver) in drivers.iter().filter(|(_, d)| d.is_running()) {
            if let Some(other) = seen.insert(driver.position(), id.as_str()) {
                return Err(StateError::race(format!(
                    "drivers '{other}' and '{id}' share position {}",
                    driver.position()
                )));
            }
        }

        Ok(Self {
            lap,
            race_length,
            segment,
            drivers,
            active_caution_laps,
        })
    }

    /// Lap 1 under green with `ids` gridded in order (first id on pole).
    pub fn starting_grid<S: AsRef<str>>(race_length: u32, ids: &[S]) -> Result<Self, StateError> {
        let mut drivers = BTreeMap::new();
        for (i, id) in ids.iter().enumerate() {
            let id = id.as_ref().to_string();
            if drivers.contains_key(&id) {
                return Err(StateError::race(format!("duplicate driver id '{id}'")));
            }
            drivers.insert(id, DriverState::on_grid(i as u32 + 1)?);
        }
        Self::new(1, race_length, RaceSegment::GreenFlag, drivers, 0)
    }

    pub fn lap(&self) -> u32 {
        self.lap
    }

    pub fn race_length(&self) -> u32 {
        self.race_length
    }

    pub fn segment(&self) -> RaceSegment {
        self.segment
    }

    pub fn drivers(&self) -> &BTreeMap<String, DriverState> {
        &self.drivers
    }

    pub fn active_caution_laps(&self) -> u32 {
        self.active_caution_laps
    }

    pub fn driver(&self, id: &str) -> Result<&DriverState, StateError> {
        self.drivers
            .get(id)
            .ok_or_else(|| StateError::UnknownDriver(id.to_string()))
    }

    pub fn is_final_lap(&self) -> bool {
        self.lap == self.race_length
    }

    /// Non-retired driver holding the lowest position, if any.
    pub fn leader(&self) -> Option<(&str, &DriverState)> {
        self.drivers
            .iter()
            .filter(|(_, d)| d.is_running())
            .min_by_key(|(_, d)| d.position())
            .map(|(id, d)| (id.as_str(), d))
    }

    /// Positions of all non-retired drivers.
    pub fn running_positions(&self) -> Vec<u32> {
        self.drivers
            .values()
            .filter(|d| d.is_running())
            .map(DriverState::position)
            .collect()
    }

    pub fn total_laps_led(&self) -> u64 {
        self.drivers.values().map(|d| u64::from(d.laps_led())).sum()
    }

    /// Segment and caution counter change together so the pair stays consistent.
    pub fn with_segment(
        &self,
        segment: RaceSegment,
        active_caution_laps: u32,
    ) -> Result<Self, StateError> {
        Self::new(
            self.lap,
            self.race_length,
            segment,
            self.drivers.clone(),
            active_caution_laps,
        )
    }

    /// Replace one existing driver's state.
    pub fn with_driver(&self, id: &str, driver: DriverState) -> Result<Self, StateError> {
        if !self.drivers.contains_key(id) {
            return Err(StateError::UnknownDriver(id.to_string()));
        }
        let mut drivers = self.drivers.clone();
        drivers.insert(id.to_string(), driver);
        self.with_drivers(drivers)
    }

    pub fn with_drivers(&self, drivers: BTreeMap<String, DriverState>) -> Result<Self, StateError> {
        Self::new(
            self.lap,
            self.race_length,
            self.segment,
            drivers,
            self.active_caution_laps,
        )
    }
}
