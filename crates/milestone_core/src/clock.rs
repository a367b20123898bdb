//! Injectable "today" and horizon resolution.
//!
//! # Invariants
//! - Core generation never reads the wall clock directly; callers thread a
//!   `Clock` (or an explicit horizon date) through every call.

use crate::config::HorizonConfig;
use chrono::{Days, NaiveDate, Utc};

/// Supplies the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock date in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Farthest date generation considers: `today + lookahead_days`, saturating
/// at the last representable date.
pub fn horizon_end(today: NaiveDate, horizon: &HorizonConfig) -> NaiveDate {
    today
        .checked_add_days(Days::new(u64::from(horizon.lookahead_days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Resolves the horizon end for `clock`'s current date.
pub fn resolve_horizon(clock: &dyn Clock, horizon: &HorizonConfig) -> NaiveDate {
    horizon_end(clock.today(), horizon)
}
