//! Bulk recompute of every active event.
//!
//! # Responsibility
//! - Regenerate all active events after a strategy-configuration change.
//! - Bound parallelism and isolate per-event failures.
//!
//! # Invariants
//! - Each worker owns its own SQLite connection; no connection is shared.
//! - One failing event never stops the others, even when regenerating it
//!   panics; every listed event ends up succeeded, skipped or failed.
//! - All workers see the same "today", read once before any work starts.

use crate::clock::{Clock, FixedClock};
use crate::config::HorizonConfig;
use crate::db::open_db;
use crate::generator::PlanSummary;
use crate::model::event::EventId;
use crate::registry::StrategyRegistry;
use crate::repo::event_repo::{EventProvider, SqliteEventRepository};
use crate::repo::milestone_repo::{RepoError, SqliteMilestoneStore};
use crate::service::milestone_service::{
    MilestoneService, MilestoneServiceError, RegenerateOutcome, ServiceResult,
};
use log::{error, info};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

/// One event that could not be recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeFailure {
    pub event_id: EventId,
    pub error: String,
}

/// Aggregated outcome of `recompute_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeReport {
    /// Active events found when the run started.
    pub total: usize,
    pub succeeded: usize,
    /// Events that turned inactive or vanished mid-run.
    pub skipped: usize,
    pub retried: usize,
    pub summary: PlanSummary,
    pub failures: Vec<RecomputeFailure>,
}

impl RecomputeReport {
    fn merge(&mut self, other: RecomputeReport) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.retried += other.retried;
        self.summary.absorb(other.summary);
        self.failures.extend(other.failures);
    }
}

/// Regenerates every active event in the database at `db_path`.
///
/// Work is spread over at most `concurrency` scoped threads (at least one).
///
/// # Errors
/// - Returns an error when listing events or opening a worker connection
///   fails; no event is touched in that case.
pub fn recompute_all(
    db_path: impl AsRef<Path>,
    registry: &StrategyRegistry,
    clock: &dyn Clock,
    horizon: &HorizonConfig,
    concurrency: usize,
) -> ServiceResult<RecomputeReport> {
    let started_at = Instant::now();
    let db_path = db_path.as_ref();

    let event_ids = {
        let conn = open_db(db_path).map_err(RepoError::from)?;
        SqliteMilestoneStore::try_new(&conn)?;
        SqliteEventRepository::try_new(&conn)?.list_active_event_ids()?
    };
    let worker_count = concurrency.max(1).min(event_ids.len().max(1));
    info!(
        "event=recompute_all module=service status=start events={} workers={}",
        event_ids.len(),
        worker_count
    );

    let mut connections = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        connections.push(open_db(db_path).map_err(RepoError::from)?);
    }

    let snapshot = FixedClock(clock.today());
    let next = AtomicUsize::new(0);
    let mut report = RecomputeReport {
        total: event_ids.len(),
        ..RecomputeReport::default()
    };

    let partials = thread::scope(|scope| {
        let handles: Vec<_> = connections
            .into_iter()
            .map(|conn| {
                let event_ids = &event_ids;
                let next = &next;
                let snapshot = &snapshot;
                scope.spawn(move || {
                    run_worker(&conn, event_ids, next, registry, snapshot, *horizon)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>()
    });

    for partial in partials {
        match partial {
            Ok(partial) => report.merge(partial),
            Err(_) => error!("event=recompute_all module=service status=error reason=worker_panic"),
        }
    }
    report.failures.sort_by_key(|failure| failure.event_id);

    info!(
        "event=recompute_all module=service status=ok events={} succeeded={} skipped={} failed={} inserts={} updates={} deletes={} duration_ms={}",
        report.total,
        report.succeeded,
        report.skipped,
        report.failures.len(),
        report.summary.inserted,
        report.summary.updated,
        report.summary.deleted,
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn run_worker(
    conn: &rusqlite::Connection,
    event_ids: &[EventId],
    next: &AtomicUsize,
    registry: &StrategyRegistry,
    clock: &FixedClock,
    horizon: HorizonConfig,
) -> RecomputeReport {
    let service = match (
        SqliteEventRepository::try_new(conn),
        SqliteMilestoneStore::try_new(conn),
    ) {
        (Ok(events), Ok(store)) => MilestoneService::new(events, store, registry, clock, horizon),
        (Err(err), _) | (_, Err(err)) => {
            error!(
                "event=recompute_all module=service status=error reason=worker_setup error={}",
                err
            );
            return RecomputeReport::default();
        }
    };

    drain_queue(event_ids, next, |event_id| service.regenerate_event(event_id))
}

// Claims events from the shared cursor until none are left. A panic while
// regenerating one event is recorded as that event's failure and the worker
// moves on.
fn drain_queue(
    event_ids: &[EventId],
    next: &AtomicUsize,
    regenerate: impl Fn(EventId) -> ServiceResult<RegenerateOutcome>,
) -> RecomputeReport {
    let mut report = RecomputeReport::default();
    loop {
        let index = next.fetch_add(1, Ordering::Relaxed);
        let Some(&event_id) = event_ids.get(index) else {
            return report;
        };
        let result = match panic::catch_unwind(AssertUnwindSafe(|| regenerate(event_id))) {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "event=recompute_all module=service status=error event_id={} reason=worker_panic",
                    event_id
                );
                report.failures.push(RecomputeFailure {
                    event_id,
                    error: "panicked while regenerating".to_string(),
                });
                continue;
            }
        };
        match result {
            Ok(outcome) if outcome.skipped => report.skipped += 1,
            Ok(outcome) => {
                report.succeeded += 1;
                report.retried += outcome.retries as usize;
                report.summary.absorb(outcome.summary);
            }
            Err(MilestoneServiceError::EventNotFound(_)) => {
                report.skipped += 1;
            }
            Err(err) => {
                error!(
                    "event=recompute_all module=service status=error event_id={} error={}",
                    event_id, err
                );
                report.failures.push(RecomputeFailure {
                    event_id,
                    error: err.to_string(),
                });
            }
        }
    }
}
