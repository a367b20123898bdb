//! Event records supplied by the event provider.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of the event that owns a set of milestones.
pub type EventId = Uuid;

/// Read-only view of an event: the anchor and its ownership/activity flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub owner_id: i64,
    /// Calendar date milestones are measured from. Never mutated by core.
    pub anchor_date: NaiveDate,
    pub is_active: bool,
}

impl EventRecord {
    /// Creates an active event with a generated stable ID.
    pub fn new(owner_id: i64, anchor_date: NaiveDate) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            owner_id,
            anchor_date,
            is_active: true,
        }
    }
}
