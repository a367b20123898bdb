//! Milestone discovery strategies.
//!
//! # Responsibility
//! - Model the eight discovery rules as one closed tagged variant, each
//!   carrying its own typed parameters.
//! - Enumerate candidates directly within `[anchor, horizon_end]`.
//!
//! # Invariants
//! - `generate` is deterministic and side-effect free.
//! - No candidate has a target date outside `[anchor, horizon_end]`.
//! - Numeric patterns are capped by the elapsed-unit magnitude of the
//!   horizon before any date arithmetic runs.

pub mod params;
pub mod patterns;

use crate::calendar::{
    add_calendar, add_unit, elapsed_units, CalendarBreakdown, CalendarError, TimeUnit,
};
use crate::model::milestone::{Candidate, StrategyKind};
use chrono::NaiveDate;
use params::{
    AnniversaryParams, CompoundParams, PalindromeParams, PowerOfTwoParams, RepdigitParams,
    RoundMultipleParams, SequenceParams, SpecialParams,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Unit recorded in the natural key of compound milestones.
pub const COMPOUND_KEY_UNIT: TimeUnit = TimeUnit::Day;

/// Malformed or out-of-range parameters for one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    /// Human-readable strategy label, e.g. `repdigit[2]`.
    pub strategy: String,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            message: message.into(),
        }
    }
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid strategy `{}`: {}", self.strategy, self.message)
    }
}

impl Error for ConfigurationError {}

/// One configured discovery rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyConfig {
    Anniversary(AnniversaryParams),
    Repdigit(RepdigitParams),
    Palindrome(PalindromeParams),
    PowerOfTwo(PowerOfTwoParams),
    Sequence(SequenceParams),
    RoundMultiple(RoundMultipleParams),
    Special(SpecialParams),
    Compound(CompoundParams),
}

impl StrategyConfig {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Anniversary(_) => StrategyKind::Anniversary,
            Self::Repdigit(_) => StrategyKind::Repdigit,
            Self::Palindrome(_) => StrategyKind::Palindrome,
            Self::PowerOfTwo(_) => StrategyKind::PowerOfTwo,
            Self::Sequence(_) => StrategyKind::Sequence,
            Self::RoundMultiple(_) => StrategyKind::RoundMultiple,
            Self::Special(_) => StrategyKind::Special,
            Self::Compound(_) => StrategyKind::Compound,
        }
    }

    /// Decodes raw JSON parameters into the typed variant for `kind`.
    ///
    /// `null` parameters decode to the kind's defaults.
    ///
    /// # Errors
    /// - Unknown kind names.
    /// - Unknown fields, wrong types or negative numbers.
    /// - Values rejected by the kind's range validation.
    pub fn decode(label: &str, kind: &str, params: &Value) -> Result<Self, ConfigurationError> {
        let kind = StrategyKind::parse(kind.trim())
            .ok_or_else(|| ConfigurationError::new(label, format!("unknown kind `{kind}`")))?;

        let config = match kind {
            StrategyKind::Anniversary => Self::Anniversary(decode_params(label, params)?),
            StrategyKind::Repdigit => Self::Repdigit(decode_params(label, params)?),
            StrategyKind::Palindrome => Self::Palindrome(decode_params(label, params)?),
            StrategyKind::PowerOfTwo => Self::PowerOfTwo(decode_params(label, params)?),
            StrategyKind::Sequence => Self::Sequence(decode_params(label, params)?),
            StrategyKind::RoundMultiple => Self::RoundMultiple(decode_params(label, params)?),
            StrategyKind::Special => Self::Special(decode_params(label, params)?),
            StrategyKind::Compound => Self::Compound(decode_params(label, params)?),
        };
        config
            .validate()
            .map_err(|message| ConfigurationError::new(label, message))?;
        Ok(config)
    }

    /// Range-checks the typed parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Anniversary(params) => params.validate(),
            Self::Repdigit(params) => params.validate(),
            Self::Palindrome(params) => params.validate(),
            Self::PowerOfTwo(params) => params.validate(),
            Self::Sequence(params) => params.validate(),
            Self::RoundMultiple(params) => params.validate(),
            Self::Special(params) => params.validate(),
            Self::Compound(params) => params.validate(),
        }
    }

    /// Enumerates every candidate in `[anchor, horizon_end]`.
    ///
    /// Returns an empty list when the horizon precedes the anchor.
    pub fn generate(
        &self,
        anchor: NaiveDate,
        horizon_end: NaiveDate,
    ) -> Result<Vec<Candidate>, CalendarError> {
        let window = Window {
            anchor,
            horizon_end,
        };
        let kind = self.kind();

        match self {
            Self::Anniversary(params) => {
                window.per_unit(kind, &[TimeUnit::Year], |limit| {
                    (1..=u64::from(params.max_years).min(limit)).collect()
                })
            }
            Self::Repdigit(params) => window.per_unit(kind, &params.units, |limit| {
                patterns::repdigits(params.min_digits, params.max_digits, limit)
                    .into_iter()
                    .filter(|value| !params.exclude.contains(value))
                    .collect()
            }),
            Self::Palindrome(params) => window.per_unit(kind, &params.units, |limit| {
                patterns::palindromes(params.min_digits, params.max_digits, limit)
            }),
            Self::PowerOfTwo(params) => window.per_unit(kind, &params.units, |limit| {
                patterns::powers_of_two(params.min_exponent, limit)
            }),
            Self::Sequence(params) => window.per_unit(kind, &params.units, |limit| {
                patterns::ascending_runs(params.min_length, params.max_length, limit)
            }),
            Self::RoundMultiple(params) => window.per_unit(kind, &params.units, |limit| {
                let cap = params.max_value.map_or(limit, |max| max.min(limit));
                patterns::round_multiples(&params.bases, cap)
            }),
            Self::Special(params) => {
                let mut candidates = Vec::new();
                for curated in &params.curated_values {
                    if curated.value > window.limit(curated.unit) {
                        continue;
                    }
                    window.push_interval(&mut candidates, kind, curated.unit, curated.value)?;
                }
                Ok(candidates)
            }
            Self::Compound(params) => {
                let mut candidates = Vec::new();
                if horizon_end < anchor {
                    return Ok(candidates);
                }
                for granularity in &params.granularities {
                    let target = add_calendar(
                        anchor,
                        granularity.years,
                        granularity.months,
                        granularity.days,
                    )?;
                    if window.contains(target) {
                        candidates.push(Candidate::compound(
                            COMPOUND_KEY_UNIT,
                            compound_key_value(granularity),
                            *granularity,
                            target,
                        ));
                    }
                }
                Ok(candidates)
            }
        }
    }
}

/// Packs a compound breakdown into a stable, anchor-independent key value:
/// `years * 10_000 + months * 100 + days`.
pub fn compound_key_value(breakdown: &CalendarBreakdown) -> u64 {
    u64::from(breakdown.years) * 10_000
        + u64::from(breakdown.months) * 100
        + u64::from(breakdown.days)
}

fn decode_params<T: DeserializeOwned + Default>(
    label: &str,
    params: &Value,
) -> Result<T, ConfigurationError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone())
        .map_err(|err| ConfigurationError::new(label, format!("invalid params: {err}")))
}

#[derive(Debug, Clone, Copy)]
struct Window {
    anchor: NaiveDate,
    horizon_end: NaiveDate,
}

impl Window {
    fn contains(&self, target: NaiveDate) -> bool {
        self.anchor <= target && target <= self.horizon_end
    }

    fn limit(&self, unit: TimeUnit) -> u64 {
        elapsed_units(self.anchor, self.horizon_end, unit)
    }

    fn per_unit(
        &self,
        kind: StrategyKind,
        units: &[TimeUnit],
        enumerate: impl Fn(u64) -> Vec<u64>,
    ) -> Result<Vec<Candidate>, CalendarError> {
        let mut candidates = Vec::new();
        for &unit in units {
            let limit = self.limit(unit);
            if limit == 0 {
                continue;
            }
            for value in enumerate(limit) {
                self.push_interval(&mut candidates, kind, unit, value)?;
            }
        }
        Ok(candidates)
    }

    fn push_interval(
        &self,
        candidates: &mut Vec<Candidate>,
        kind: StrategyKind,
        unit: TimeUnit,
        value: u64,
    ) -> Result<(), CalendarError> {
        if value == 0 {
            return Ok(());
        }
        let target = add_unit(self.anchor, value, unit)?;
        if self.contains(target) {
            candidates.push(Candidate::interval(kind, unit, value, target));
        }
        Ok(())
    }
}
