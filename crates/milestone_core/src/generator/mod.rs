//! Milestone generator.
//!
//! # Responsibility
//! - Run every active strategy over one anchor and merge the candidates.
//! - Diff candidates against stored milestones into a `WritePlan`.
//!
//! # Invariants
//! - Candidates from different kinds are never merged, even on equal
//!   `(unit, value)`; the natural key already includes the kind.
//! - Duplicate natural keys within one pass collapse to the first candidate
//!   (registry order) and are logged as a strategy warning.
//! - Regenerating with unchanged inputs after applying a plan yields an
//!   empty plan.
//! - Share tokens of surviving natural keys are never replaced.

mod plan;

pub use plan::{PlanSummary, WritePlan};

use crate::calendar::CalendarError;
use crate::model::event::EventId;
use crate::model::milestone::{Candidate, Milestone, NaturalKey, ShareToken};
use crate::registry::StrategyRegistry;
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of share tokens for newly inserted milestones.
pub trait ShareTokenMinter {
    fn mint(&self) -> ShareToken;
}

/// Mints random opaque tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShareTokens;

impl ShareTokenMinter for RandomShareTokens {
    fn mint(&self) -> ShareToken {
        ShareToken::random()
    }
}

/// Mints `<prefix>-<n>` tokens in sequence, for reproducible plans.
#[derive(Debug)]
pub struct SequentialShareTokens {
    prefix: String,
    next: AtomicU64,
}

impl SequentialShareTokens {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl ShareTokenMinter for SequentialShareTokens {
    fn mint(&self) -> ShareToken {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ShareToken::from_string(format!("{}-{n}", self.prefix))
            .unwrap_or_else(ShareToken::random)
    }
}

/// Generation failure for one event. No partial plan is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    Calendar(CalendarError),
    /// A stored milestone passed in belongs to another event.
    ForeignMilestone { expected: EventId, found: EventId },
    /// Stored milestones already violate natural-key uniqueness.
    DuplicateExistingKey(NaturalKey),
}

impl Display for GenerateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar(err) => write!(f, "{err}"),
            Self::ForeignMilestone { expected, found } => write!(
                f,
                "milestone of event {found} passed to regeneration of event {expected}"
            ),
            Self::DuplicateExistingKey(key) => {
                write!(f, "stored milestones contain duplicate natural key {key}")
            }
        }
    }
}

impl Error for GenerateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Calendar(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CalendarError> for GenerateError {
    fn from(value: CalendarError) -> Self {
        Self::Calendar(value)
    }
}

/// Orchestrates the registry over one anchor.
pub struct MilestoneGenerator<'r, M = RandomShareTokens> {
    registry: &'r StrategyRegistry,
    minter: M,
}

impl<'r> MilestoneGenerator<'r, RandomShareTokens> {
    /// Creates a generator that mints random share tokens.
    pub fn new(registry: &'r StrategyRegistry) -> Self {
        Self::with_minter(registry, RandomShareTokens)
    }
}

impl<'r, M: ShareTokenMinter> MilestoneGenerator<'r, M> {
    pub fn with_minter(registry: &'r StrategyRegistry, minter: M) -> Self {
        Self { registry, minter }
    }

    /// Runs every active strategy in registry order and merges the results.
    ///
    /// # Errors
    /// - `GenerateError::Calendar` when any strategy leaves the calendar range.
    pub fn generate_candidates(
        &self,
        anchor: NaiveDate,
        horizon_end: NaiveDate,
    ) -> Result<Vec<Candidate>, GenerateError> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();

        for strategy in self.registry.active_strategies() {
            for candidate in strategy.config.generate(anchor, horizon_end)? {
                if !seen.insert(candidate.key) {
                    warn!(
                        "event=candidate_collapse module=generator status=warn strategy={} key={}",
                        strategy.label, candidate.key
                    );
                    continue;
                }
                merged.push(candidate);
            }
        }

        Ok(merged)
    }

    /// Builds the write plan that brings `existing` in line with a fresh
    /// generation for `anchor`.
    ///
    /// # Errors
    /// - `GenerateError::Calendar` from candidate generation.
    /// - `GenerateError::ForeignMilestone` / `DuplicateExistingKey` when
    ///   `existing` is not a valid row set for `event_id`.
    pub fn regenerate(
        &self,
        event_id: EventId,
        anchor: NaiveDate,
        existing: &[Milestone],
        horizon_end: NaiveDate,
    ) -> Result<WritePlan, GenerateError> {
        let mut stored: BTreeMap<NaturalKey, &Milestone> = BTreeMap::new();
        for milestone in existing {
            if milestone.event_id != event_id {
                return Err(GenerateError::ForeignMilestone {
                    expected: event_id,
                    found: milestone.event_id,
                });
            }
            if stored.insert(milestone.key, milestone).is_some() {
                return Err(GenerateError::DuplicateExistingKey(milestone.key));
            }
        }

        let candidates = self.generate_candidates(anchor, horizon_end)?;
        let mut plan = WritePlan::empty(event_id);

        for candidate in candidates {
            match stored.remove(&candidate.key) {
                None => {
                    let token = self.minter.mint();
                    plan.inserts
                        .push(Milestone::from_candidate(event_id, candidate, token));
                }
                Some(current) if current.differs_from(&candidate) => {
                    let token = current.share_token.clone();
                    plan.updates
                        .push(Milestone::from_candidate(event_id, candidate, token));
                }
                Some(_) => {}
            }
        }
        plan.deletes = stored.into_values().cloned().collect();

        let summary = plan.summary();
        debug!(
            "event=milestones_regenerate module=generator status=ok event_id={} inserts={} updates={} deletes={}",
            event_id, summary.inserted, summary.updated, summary.deleted
        );
        Ok(plan)
    }
}
