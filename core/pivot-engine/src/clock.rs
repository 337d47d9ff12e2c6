//! FILENAME: core/pivot-engine/src/clock.rs
//! Source of "today" for relative-period filters.
//!
//! Relative-period operators ("is current month", ...) depend on when they
//! run, so filter evaluation takes a `Clock`. Production code uses the local
//! wall clock; tests pin a date with `FixedClock`.

use chrono::{Local, NaiveDate};

pub trait Clock {
    /// The current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
