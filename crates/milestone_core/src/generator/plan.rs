//! Write plans produced by diffing fresh candidates against stored rows.

use crate::model::event::EventId;
use crate::model::milestone::Milestone;
use serde::Serialize;

/// Three-way upsert/delete plan for one event.
///
/// The plan must be applied atomically; partial application is never
/// observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WritePlan {
    pub event_id: EventId,
    /// New natural keys, each with a freshly minted share token.
    pub inserts: Vec<Milestone>,
    /// Existing natural keys whose derived fields changed; share tokens
    /// are carried over unchanged.
    pub updates: Vec<Milestone>,
    /// Stored rows whose natural key no longer appears.
    pub deletes: Vec<Milestone>,
}

impl WritePlan {
    pub fn empty(event_id: EventId) -> Self {
        Self {
            event_id,
            inserts: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Returns whether applying this plan would change nothing.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            inserted: self.inserts.len(),
            updated: self.updates.len(),
            deleted: self.deletes.len(),
        }
    }
}

/// Row counts of a write plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl PlanSummary {
    pub fn absorb(&mut self, other: PlanSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}
