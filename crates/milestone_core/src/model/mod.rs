//! Domain model for milestone discovery.
//!
//! # Responsibility
//! - Define the generation-time `Candidate` and the persisted `Milestone`.
//! - Define the natural key that identifies a milestone across regenerations.
//!
//! # Invariants
//! - `(event_id, strategy_kind, interval_unit, interval_value)` is unique.
//! - `interval_value > 0` for every persisted milestone.
//! - A share token, once assigned to a natural key, is never reassigned.

pub mod event;
pub mod milestone;
