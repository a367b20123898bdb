//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the milestone store and event provider contracts.
//! - Isolate SQLite query details from generation and service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Milestone::validate()` before persistence.
//! - Write plans are applied in one transaction or not at all.
//! - Repository APIs return semantic errors (`NotFound`, `WriteConflict`) in
//!   addition to DB transport errors.

pub mod event_repo;
pub mod milestone_repo;
