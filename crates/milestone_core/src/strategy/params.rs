//! Typed per-kind strategy parameters.
//!
//! Raw JSON parameters are decoded into these structs at registry build
//! time. Unknown fields are rejected and every struct is range-checked by
//! `validate()` before a strategy can become active.

use crate::calendar::{add_calendar, decompose_calendar, CalendarBreakdown, TimeUnit};
use crate::strategy::patterns::MAX_DIGITS;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const MAX_ANNIVERSARY_YEARS: u32 = 1_000;
const MAX_COMPOUND_YEARS: u32 = 1_000;
// First day of every month of a common year: a granularity that round-trips
// from each of them carries no months a year could absorb and no days a
// February could absorb.
const CANONICAL_REFERENCE_YEAR: i32 = 2021;
const MAX_RUN_LENGTH: u32 = 9;

fn default_units() -> Vec<TimeUnit> {
    vec![TimeUnit::Day]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnniversaryParams {
    pub max_years: u32,
}

impl Default for AnniversaryParams {
    fn default() -> Self {
        Self { max_years: 100 }
    }
}

impl AnniversaryParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_years == 0 || self.max_years > MAX_ANNIVERSARY_YEARS {
            return Err(format!(
                "max_years must be within 1..={MAX_ANNIVERSARY_YEARS}, got {}",
                self.max_years
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepdigitParams {
    pub min_digits: u32,
    pub max_digits: u32,
    pub units: Vec<TimeUnit>,
    /// Values skipped even though they are repdigits.
    pub exclude: Vec<u64>,
}

impl Default for RepdigitParams {
    fn default() -> Self {
        Self {
            min_digits: 3,
            max_digits: 6,
            units: default_units(),
            exclude: Vec::new(),
        }
    }
}

impl RepdigitParams {
    pub fn validate(&self) -> Result<(), String> {
        validate_bounds("digits", self.min_digits, self.max_digits, MAX_DIGITS)?;
        validate_units(&self.units)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PalindromeParams {
    pub min_digits: u32,
    pub max_digits: u32,
    pub units: Vec<TimeUnit>,
}

impl Default for PalindromeParams {
    fn default() -> Self {
        Self {
            min_digits: 3,
            max_digits: 6,
            units: default_units(),
        }
    }
}

impl PalindromeParams {
    pub fn validate(&self) -> Result<(), String> {
        validate_bounds("digits", self.min_digits, self.max_digits, MAX_DIGITS)?;
        validate_units(&self.units)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerOfTwoParams {
    pub min_exponent: u32,
    pub units: Vec<TimeUnit>,
}

impl Default for PowerOfTwoParams {
    fn default() -> Self {
        Self {
            min_exponent: 1,
            units: default_units(),
        }
    }
}

impl PowerOfTwoParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_exponent >= u64::BITS {
            return Err(format!(
                "min_exponent must be below {}, got {}",
                u64::BITS,
                self.min_exponent
            ));
        }
        validate_units(&self.units)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SequenceParams {
    pub min_length: u32,
    pub max_length: u32,
    pub units: Vec<TimeUnit>,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: MAX_RUN_LENGTH,
            units: default_units(),
        }
    }
}

impl SequenceParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_length < 2 {
            return Err(format!(
                "min_length must be at least 2, got {}",
                self.min_length
            ));
        }
        validate_bounds("length", self.min_length, self.max_length, MAX_RUN_LENGTH)?;
        validate_units(&self.units)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoundMultipleParams {
    pub bases: Vec<u64>,
    pub units: Vec<TimeUnit>,
    /// Optional cap below the horizon magnitude.
    pub max_value: Option<u64>,
}

impl Default for RoundMultipleParams {
    fn default() -> Self {
        Self {
            bases: vec![100, 500, 1_000, 5_000, 10_000],
            units: default_units(),
            max_value: None,
        }
    }
}

impl RoundMultipleParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.bases.is_empty() {
            return Err("bases must not be empty".to_string());
        }
        if self.bases.contains(&0) {
            return Err("bases must be greater than zero".to_string());
        }
        if self.max_value == Some(0) {
            return Err("max_value must be greater than zero".to_string());
        }
        validate_units(&self.units)
    }
}

/// One curated `(value, unit)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuratedValue {
    pub value: u64,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecialParams {
    pub curated_values: Vec<CuratedValue>,
}

impl SpecialParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.curated_values.is_empty() {
            return Err("curated_values must not be empty".to_string());
        }
        let mut seen = BTreeSet::new();
        for curated in &self.curated_values {
            if curated.value == 0 {
                return Err("curated values must be greater than zero".to_string());
            }
            if !seen.insert(*curated) {
                return Err(format!(
                    "duplicate curated value {} {}",
                    curated.value, curated.unit
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompoundParams {
    pub granularities: Vec<CalendarBreakdown>,
}

impl CompoundParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.granularities.is_empty() {
            return Err("granularities must not be empty".to_string());
        }
        let mut seen = BTreeSet::new();
        for granularity in &self.granularities {
            if granularity.is_zero() {
                return Err("granularity must not be all zero".to_string());
            }
            if granularity.years > MAX_COMPOUND_YEARS {
                return Err(format!(
                    "granularity {}y {}m {}d out of range (years <= {MAX_COMPOUND_YEARS})",
                    granularity.years, granularity.months, granularity.days
                ));
            }
            if !is_canonical(granularity) {
                return Err(format!(
                    "granularity {}y {}m {}d is not a canonical breakdown (months <= 11, days <= 27)",
                    granularity.years, granularity.months, granularity.days
                ));
            }
            if !seen.insert((granularity.years, granularity.months, granularity.days)) {
                return Err(format!(
                    "duplicate granularity {}y {}m {}d",
                    granularity.years, granularity.months, granularity.days
                ));
            }
        }
        Ok(())
    }
}

/// True when `decompose_calendar` recovers `granularity` from every
/// reference anchor.
fn is_canonical(granularity: &CalendarBreakdown) -> bool {
    (1..=12).all(|month| {
        let Some(anchor) = NaiveDate::from_ymd_opt(CANONICAL_REFERENCE_YEAR, month, 1) else {
            return false;
        };
        add_calendar(
            anchor,
            granularity.years,
            granularity.months,
            granularity.days,
        )
        .and_then(|target| decompose_calendar(anchor, target))
        .is_ok_and(|breakdown| breakdown == *granularity)
    })
}

fn validate_bounds(name: &str, min: u32, max: u32, cap: u32) -> Result<(), String> {
    if min == 0 || min > max || max > cap {
        return Err(format!(
            "{name} bounds must satisfy 1 <= min <= max <= {cap}, got {min}..={max}"
        ));
    }
    Ok(())
}

fn validate_units(units: &[TimeUnit]) -> Result<(), String> {
    if units.is_empty() {
        return Err("units must not be empty".to_string());
    }
    let mut seen = BTreeSet::new();
    for unit in units {
        if !seen.insert(*unit) {
            return Err(format!("duplicate unit `{unit}`"));
        }
    }
    Ok(())
}
