//! Candidate and milestone records.
//!
//! # Invariants
//! - `Milestone::validate()` must pass before a row is persisted.
//! - `label_params` always mirrors the natural key, so a localizer never
//!   needs calendar arithmetic to render a label.

use crate::calendar::{CalendarBreakdown, TimeUnit};
use crate::model::event::EventId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// The eight milestone discovery rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Anniversary,
    Repdigit,
    Palindrome,
    PowerOfTwo,
    Sequence,
    RoundMultiple,
    Special,
    Compound,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anniversary => "anniversary",
            Self::Repdigit => "repdigit",
            Self::Palindrome => "palindrome",
            Self::PowerOfTwo => "power_of_two",
            Self::Sequence => "sequence",
            Self::RoundMultiple => "round_multiple",
            Self::Special => "special",
            Self::Compound => "compound",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "anniversary" => Some(Self::Anniversary),
            "repdigit" => Some(Self::Repdigit),
            "palindrome" => Some(Self::Palindrome),
            "power_of_two" => Some(Self::PowerOfTwo),
            "sequence" => Some(Self::Sequence),
            "round_multiple" => Some(Self::RoundMultiple),
            "special" => Some(Self::Special),
            "compound" => Some(Self::Compound),
            _ => None,
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a milestone within one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub kind: StrategyKind,
    pub unit: TimeUnit,
    pub value: u64,
}

impl Display for NaturalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.unit, self.value)
    }
}

/// Structured data an external localizer needs to render a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelParams {
    pub kind: StrategyKind,
    pub unit: TimeUnit,
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<CalendarBreakdown>,
}

impl LabelParams {
    pub fn for_key(key: NaturalKey, breakdown: Option<CalendarBreakdown>) -> Self {
        Self {
            kind: key.kind,
            unit: key.unit,
            value: key.value,
            breakdown,
        }
    }
}

/// Ephemeral generation-time proposal, never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub key: NaturalKey,
    pub target_date: NaiveDate,
    pub label_params: LabelParams,
    pub compound_breakdown: Option<CalendarBreakdown>,
}

impl Candidate {
    /// Builds a unit-denominated candidate (every kind except compound).
    pub fn interval(
        kind: StrategyKind,
        unit: TimeUnit,
        value: u64,
        target_date: NaiveDate,
    ) -> Self {
        let key = NaturalKey { kind, unit, value };
        Self {
            key,
            target_date,
            label_params: LabelParams::for_key(key, None),
            compound_breakdown: None,
        }
    }

    /// Builds a compound candidate carrying its calendar breakdown.
    pub fn compound(
        unit: TimeUnit,
        value: u64,
        breakdown: CalendarBreakdown,
        target_date: NaiveDate,
    ) -> Self {
        let key = NaturalKey {
            kind: StrategyKind::Compound,
            unit,
            value,
        };
        Self {
            key,
            target_date,
            label_params: LabelParams::for_key(key, Some(breakdown)),
            compound_breakdown: Some(breakdown),
        }
    }
}

/// Opaque public identifier of one milestone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    /// Generates a fresh random token.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an existing token string, rejecting blank values.
    pub fn from_string(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ShareToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted milestone owned by one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub event_id: EventId,
    pub key: NaturalKey,
    /// Derived from the anchor; recomputed whenever the anchor changes.
    pub target_date: NaiveDate,
    pub label_params: LabelParams,
    pub compound_breakdown: Option<CalendarBreakdown>,
    /// Stable while the natural key persists.
    pub share_token: ShareToken,
}

/// Milestone invariant violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MilestoneValidationError {
    ZeroIntervalValue,
    LabelParamsMismatch(NaturalKey),
    MissingCompoundBreakdown,
    UnexpectedCompoundBreakdown(StrategyKind),
}

impl Display for MilestoneValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroIntervalValue => write!(f, "interval_value must be greater than zero"),
            Self::LabelParamsMismatch(key) => {
                write!(f, "label params do not match natural key {key}")
            }
            Self::MissingCompoundBreakdown => {
                write!(f, "compound milestone requires a calendar breakdown")
            }
            Self::UnexpectedCompoundBreakdown(kind) => {
                write!(f, "{kind} milestone must not carry a calendar breakdown")
            }
        }
    }
}

impl Error for MilestoneValidationError {}

impl Milestone {
    /// Materializes a candidate for `event_id` under `share_token`.
    pub fn from_candidate(
        event_id: EventId,
        candidate: Candidate,
        share_token: ShareToken,
    ) -> Self {
        Self {
            event_id,
            key: candidate.key,
            target_date: candidate.target_date,
            label_params: candidate.label_params,
            compound_breakdown: candidate.compound_breakdown,
            share_token,
        }
    }

    /// Returns whether the derived fields differ from `candidate`.
    pub fn differs_from(&self, candidate: &Candidate) -> bool {
        self.target_date != candidate.target_date
            || self.label_params != candidate.label_params
            || self.compound_breakdown != candidate.compound_breakdown
    }

    /// Checks persisted-row invariants.
    pub fn validate(&self) -> Result<(), MilestoneValidationError> {
        if self.key.value == 0 {
            return Err(MilestoneValidationError::ZeroIntervalValue);
        }
        if self.label_params != LabelParams::for_key(self.key, self.compound_breakdown) {
            return Err(MilestoneValidationError::LabelParamsMismatch(self.key));
        }
        match (self.key.kind, self.compound_breakdown) {
            (StrategyKind::Compound, None) => {
                Err(MilestoneValidationError::MissingCompoundBreakdown)
            }
            (StrategyKind::Compound, Some(_)) | (_, None) => Ok(()),
            (kind, Some(_)) => Err(MilestoneValidationError::UnexpectedCompoundBreakdown(kind)),
        }
    }
}
