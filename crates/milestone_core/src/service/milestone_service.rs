//! Milestone regeneration use-case service.
//!
//! # Responsibility
//! - Regenerate one event's milestones end to end: load, plan, apply.
//! - Retry a conflicting write plan once from freshly loaded rows.
//!
//! # Invariants
//! - Inactive events are never regenerated; their outcome is a skip.
//! - A second `WriteConflict` for the same call is surfaced, never retried.
//! - The horizon is resolved from the injected clock, never from wall time.

use crate::clock::{resolve_horizon, Clock};
use crate::config::HorizonConfig;
use crate::generator::{
    GenerateError, MilestoneGenerator, PlanSummary, RandomShareTokens, ShareTokenMinter,
};
use crate::model::event::{EventId, EventRecord};
use crate::registry::StrategyRegistry;
use crate::repo::event_repo::EventProvider;
use crate::repo::milestone_repo::{MilestoneStore, RepoError};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MAX_CONFLICT_RETRIES: u32 = 1;

pub type ServiceResult<T> = Result<T, MilestoneServiceError>;

/// Service error for milestone use-cases.
#[derive(Debug)]
pub enum MilestoneServiceError {
    /// Event provider has no such event.
    EventNotFound(EventId),
    /// Candidate generation or diffing failed; nothing was written.
    Generate(GenerateError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// The store kept rejecting the plan after the single retry.
    ConflictPersisted { event_id: EventId, detail: String },
}

impl Display for MilestoneServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventNotFound(event_id) => write!(f, "event not found: {event_id}"),
            Self::Generate(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::ConflictPersisted { event_id, detail } => {
                write!(f, "write conflict persisted for event {event_id}: {detail}")
            }
        }
    }
}

impl Error for MilestoneServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Generate(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::EventNotFound(_) | Self::ConflictPersisted { .. } => None,
        }
    }
}

impl From<GenerateError> for MilestoneServiceError {
    fn from(value: GenerateError) -> Self {
        Self::Generate(value)
    }
}

impl From<RepoError> for MilestoneServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(event_id) => Self::EventNotFound(event_id),
            other => Self::Repo(other),
        }
    }
}

/// Result of one event regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegenerateOutcome {
    pub event_id: EventId,
    /// Horizon end the plan was computed against.
    pub horizon_end: NaiveDate,
    pub summary: PlanSummary,
    /// `true` when the event is inactive and nothing was touched.
    pub skipped: bool,
    /// Number of conflict retries taken (0 or 1).
    pub retries: u32,
}

/// Use-case service wrapper for milestone regeneration.
pub struct MilestoneService<'a, P, S, M = RandomShareTokens> {
    events: P,
    store: S,
    generator: MilestoneGenerator<'a, M>,
    clock: &'a dyn Clock,
    horizon: HorizonConfig,
}

impl<'a, P: EventProvider, S: MilestoneStore> MilestoneService<'a, P, S> {
    /// Creates a service that mints random share tokens.
    pub fn new(
        events: P,
        store: S,
        registry: &'a StrategyRegistry,
        clock: &'a dyn Clock,
        horizon: HorizonConfig,
    ) -> Self {
        Self::with_generator(
            events,
            store,
            MilestoneGenerator::new(registry),
            clock,
            horizon,
        )
    }
}

impl<'a, P: EventProvider, S: MilestoneStore, M: ShareTokenMinter> MilestoneService<'a, P, S, M> {
    pub fn with_generator(
        events: P,
        store: S,
        generator: MilestoneGenerator<'a, M>,
        clock: &'a dyn Clock,
        horizon: HorizonConfig,
    ) -> Self {
        Self {
            events,
            store,
            generator,
            clock,
            horizon,
        }
    }

    pub fn events(&self) -> &P {
        &self.events
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Brings one event's stored milestones in line with a fresh generation.
    ///
    /// # Contract
    /// - Inactive events return a skipped outcome with an empty summary.
    /// - On `WriteConflict` the whole regeneration reruns once against
    ///   freshly loaded rows.
    ///
    /// # Errors
    /// - `EventNotFound` when the provider has no such event.
    /// - `Generate` when generation fails; no partial plan is written.
    /// - `ConflictPersisted` when the retry conflicts again.
    pub fn regenerate_event(&self, event_id: EventId) -> ServiceResult<RegenerateOutcome> {
        let event = self
            .events
            .get_event(event_id)?
            .ok_or(MilestoneServiceError::EventNotFound(event_id))?;
        self.regenerate_record(&event)
    }

    /// Regenerates every event of one owner, sequentially.
    ///
    /// Stops at the first failing event.
    pub fn regenerate_for_owner(&self, owner_id: i64) -> ServiceResult<Vec<RegenerateOutcome>> {
        let events = self.events.list_events_for_owner(owner_id)?;
        let mut outcomes = Vec::with_capacity(events.len());
        for event in &events {
            outcomes.push(self.regenerate_record(event)?);
        }
        Ok(outcomes)
    }

    /// Removes every stored milestone of one event.
    pub fn delete_event(&self, event_id: EventId) -> ServiceResult<usize> {
        Ok(self.store.delete_all_for_event(event_id)?)
    }

    fn regenerate_record(&self, event: &EventRecord) -> ServiceResult<RegenerateOutcome> {
        let started_at = Instant::now();
        let horizon_end = resolve_horizon(self.clock, &self.horizon);
        let mut outcome = RegenerateOutcome {
            event_id: event.event_id,
            horizon_end,
            summary: PlanSummary::default(),
            skipped: false,
            retries: 0,
        };

        if !event.is_active {
            info!(
                "event=milestones_regenerate module=service status=skip event_id={} reason=inactive",
                event.event_id
            );
            outcome.skipped = true;
            return Ok(outcome);
        }

        loop {
            let existing = self.store.load_existing(event.event_id)?;
            let plan = match self.generator.regenerate(
                event.event_id,
                event.anchor_date,
                &existing,
                horizon_end,
            ) {
                Ok(plan) => plan,
                Err(err) => {
                    error!(
                        "event=milestones_regenerate module=service status=error event_id={} error={}",
                        event.event_id, err
                    );
                    return Err(err.into());
                }
            };

            match self.store.apply_write_plan(&plan) {
                Ok(()) => {
                    outcome.summary = plan.summary();
                    info!(
                        "event=milestones_regenerate module=service status=ok event_id={} inserts={} updates={} deletes={} retries={} duration_ms={}",
                        event.event_id,
                        outcome.summary.inserted,
                        outcome.summary.updated,
                        outcome.summary.deleted,
                        outcome.retries,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(outcome);
                }
                Err(RepoError::WriteConflict { event_id, detail }) => {
                    if outcome.retries >= MAX_CONFLICT_RETRIES {
                        error!(
                            "event=write_conflict_retry module=service status=error event_id={} retries={}",
                            event_id, outcome.retries
                        );
                        return Err(MilestoneServiceError::ConflictPersisted { event_id, detail });
                    }
                    warn!(
                        "event=write_conflict_retry module=service status=start event_id={}",
                        event_id
                    );
                    outcome.retries += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MilestoneService, MilestoneServiceError};
    use crate::clock::FixedClock;
    use crate::config::HorizonConfig;
    use crate::db::open_db_in_memory;
    use crate::generator::{MilestoneGenerator, SequentialShareTokens, WritePlan};
    use crate::model::event::{EventId, EventRecord};
    use crate::model::milestone::{Milestone, ShareToken};
    use crate::registry::{StrategyDefinition, StrategyRegistry};
    use crate::repo::event_repo::SqliteEventRepository;
    use crate::repo::milestone_repo::{
        DateRange, FeedQuery, MilestoneStore, RepoError, RepoResult, SqliteMilestoneStore,
    };
    use chrono::NaiveDate;
    use serde_json::json;
    use std::cell::Cell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn anniversary_registry(max_years: u32) -> StrategyRegistry {
        let build = StrategyRegistry::build(&[StrategyDefinition::new(
            "anniversary",
            0,
            json!({ "max_years": max_years }),
        )]);
        assert!(build.errors.is_empty());
        build.registry
    }

    fn horizon(days: u32) -> HorizonConfig {
        HorizonConfig {
            lookahead_days: days,
        }
    }

    /// Store that reports a conflict for the first `conflicts` applies.
    struct ConflictingStore<'conn> {
        inner: SqliteMilestoneStore<'conn>,
        conflicts: Cell<u32>,
        applies: Cell<u32>,
    }

    impl MilestoneStore for ConflictingStore<'_> {
        fn load_existing(&self, event_id: EventId) -> RepoResult<Vec<Milestone>> {
            self.inner.load_existing(event_id)
        }

        fn apply_write_plan(&self, plan: &WritePlan) -> RepoResult<()> {
            self.applies.set(self.applies.get() + 1);
            if self.conflicts.get() > 0 {
                self.conflicts.set(self.conflicts.get() - 1);
                return Err(RepoError::WriteConflict {
                    event_id: plan.event_id,
                    detail: "simulated".to_string(),
                });
            }
            self.inner.apply_write_plan(plan)
        }

        fn query_due(&self, range: &DateRange) -> RepoResult<Vec<Milestone>> {
            self.inner.query_due(range)
        }

        fn find_by_share_token(&self, token: &ShareToken) -> RepoResult<Option<Milestone>> {
            self.inner.find_by_share_token(token)
        }

        fn delete_all_for_event(&self, event_id: EventId) -> RepoResult<usize> {
            self.inner.delete_all_for_event(event_id)
        }

        fn list_upcoming_for_owner(&self, query: &FeedQuery) -> RepoResult<Vec<Milestone>> {
            self.inner.list_upcoming_for_owner(query)
        }

        fn count_upcoming_for_owner(&self, owner_id: i64, from: NaiveDate) -> RepoResult<u64> {
            self.inner.count_upcoming_for_owner(owner_id, from)
        }

        fn list_for_event(&self, event_id: EventId, from: NaiveDate) -> RepoResult<Vec<Milestone>> {
            self.inner.list_for_event(event_id, from)
        }
    }

    #[test]
    fn single_conflict_is_retried_and_applied() {
        let conn = open_db_in_memory().unwrap();
        let events = SqliteEventRepository::try_new(&conn).unwrap();
        let event = EventRecord::new(7, date(2020, 1, 1));
        events.upsert_event(&event).unwrap();

        let registry = anniversary_registry(3);
        let clock = FixedClock(date(2020, 1, 1));
        let store = ConflictingStore {
            inner: SqliteMilestoneStore::try_new(&conn).unwrap(),
            conflicts: Cell::new(1),
            applies: Cell::new(0),
        };
        let service = MilestoneService::new(events, store, &registry, &clock, horizon(3 * 366));

        let outcome = service.regenerate_event(event.event_id).unwrap();
        assert_eq!(outcome.retries, 1);
        assert_eq!(outcome.summary.inserted, 3);
        assert_eq!(service.store().applies.get(), 2);
        assert_eq!(service.store().load_existing(event.event_id).unwrap().len(), 3);
    }

    #[test]
    fn second_conflict_is_fatal_and_writes_nothing() {
        let conn = open_db_in_memory().unwrap();
        let events = SqliteEventRepository::try_new(&conn).unwrap();
        let event = EventRecord::new(7, date(2020, 1, 1));
        events.upsert_event(&event).unwrap();

        let registry = anniversary_registry(3);
        let clock = FixedClock(date(2020, 1, 1));
        let store = ConflictingStore {
            inner: SqliteMilestoneStore::try_new(&conn).unwrap(),
            conflicts: Cell::new(2),
            applies: Cell::new(0),
        };
        let service = MilestoneService::new(events, store, &registry, &clock, horizon(3 * 366));

        let err = service.regenerate_event(event.event_id).unwrap_err();
        assert!(matches!(err, MilestoneServiceError::ConflictPersisted { .. }));
        assert_eq!(service.store().applies.get(), 2);
        assert!(service.store().load_existing(event.event_id).unwrap().is_empty());
    }

    #[test]
    fn inactive_event_is_skipped() {
        let conn = open_db_in_memory().unwrap();
        let events = SqliteEventRepository::try_new(&conn).unwrap();
        let mut event = EventRecord::new(7, date(2020, 1, 1));
        event.is_active = false;
        events.upsert_event(&event).unwrap();

        let registry = anniversary_registry(3);
        let clock = FixedClock(date(2020, 1, 1));
        let store = SqliteMilestoneStore::try_new(&conn).unwrap();
        let service = MilestoneService::new(events, store, &registry, &clock, horizon(3 * 366));

        let outcome = service.regenerate_event(event.event_id).unwrap();
        assert!(outcome.skipped);
        assert_eq!(outcome.summary.inserted, 0);
        assert!(service.store().load_existing(event.event_id).unwrap().is_empty());
    }

    #[test]
    fn unknown_event_is_reported() {
        let conn = open_db_in_memory().unwrap();
        let registry = anniversary_registry(3);
        let clock = FixedClock(date(2020, 1, 1));
        let service = MilestoneService::new(
            SqliteEventRepository::try_new(&conn).unwrap(),
            SqliteMilestoneStore::try_new(&conn).unwrap(),
            &registry,
            &clock,
            HorizonConfig::default(),
        );

        let missing = EventId::new_v4();
        let err = service.regenerate_event(missing).unwrap_err();
        assert!(matches!(err, MilestoneServiceError::EventNotFound(id) if id == missing));
    }

    #[test]
    fn owner_regeneration_covers_each_event_with_deterministic_tokens() {
        let conn = open_db_in_memory().unwrap();
        let events = SqliteEventRepository::try_new(&conn).unwrap();
        let first = EventRecord::new(9, date(2020, 1, 1));
        let second = EventRecord::new(9, date(2021, 6, 15));
        let other_owner = EventRecord::new(10, date(2020, 1, 1));
        for event in [&first, &second, &other_owner] {
            events.upsert_event(event).unwrap();
        }

        let registry = anniversary_registry(2);
        let clock = FixedClock(date(2020, 1, 1));
        let generator =
            MilestoneGenerator::with_minter(&registry, SequentialShareTokens::new("owner"));
        let service = MilestoneService::with_generator(
            events,
            SqliteMilestoneStore::try_new(&conn).unwrap(),
            generator,
            &clock,
            horizon(5 * 366),
        );

        let outcomes = service.regenerate_for_owner(9).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|outcome| outcome.summary.inserted == 2));
        assert!(service
            .store()
            .load_existing(other_owner.event_id)
            .unwrap()
            .is_empty());

        let token = ShareToken::from_string("owner-1").unwrap();
        assert!(service.store().find_by_share_token(&token).unwrap().is_some());
    }

    #[test]
    fn delete_event_removes_all_milestones() {
        let conn = open_db_in_memory().unwrap();
        let events = SqliteEventRepository::try_new(&conn).unwrap();
        let event = EventRecord::new(7, date(2020, 1, 1));
        events.upsert_event(&event).unwrap();

        let registry = anniversary_registry(3);
        let clock = FixedClock(date(2020, 1, 1));
        let service = MilestoneService::new(
            events,
            SqliteMilestoneStore::try_new(&conn).unwrap(),
            &registry,
            &clock,
            horizon(3 * 366),
        );

        service.regenerate_event(event.event_id).unwrap();
        assert_eq!(service.delete_event(event.event_id).unwrap(), 3);
        assert!(service.store().load_existing(event.event_id).unwrap().is_empty());
    }
}
