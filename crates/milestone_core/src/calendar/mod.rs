//! Calendar arithmetic over date-only anchors.
//!
//! # Responsibility
//! - Convert between calendar dates and unit-denominated elapsed quantities.
//! - Provide calendar-correct month/year addition with day-of-month clamping.
//!
//! # Invariants
//! - Time-of-day is never modeled; hour quantities collapse to whole days.
//! - All functions are pure and never panic for dates chrono can represent.
//! - `decompose_calendar` is the exact inverse of `add_calendar` for
//!   canonical (greedy, largest-unit-first) breakdowns.

mod arithmetic;

pub use arithmetic::{add_calendar, add_unit, decompose_calendar, elapsed_units};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Unit a milestone interval is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 5] = [
        TimeUnit::Hour,
        TimeUnit::Day,
        TimeUnit::Week,
        TimeUnit::Month,
        TimeUnit::Year,
    ];

    /// Stable lowercase name used in storage and label params.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Years/months/days breakdown applied in that fixed order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalendarBreakdown {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl CalendarBreakdown {
    pub fn new(years: u32, months: u32, days: u32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }
}

/// Arithmetic left the representable calendar range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    OutOfRange {
        date: NaiveDate,
        amount: u64,
        unit: TimeUnit,
    },
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { date, amount, unit } => write!(
                f,
                "date arithmetic out of range: {date} + {amount} {unit}(s)"
            ),
        }
    }
}

impl Error for CalendarError {}
