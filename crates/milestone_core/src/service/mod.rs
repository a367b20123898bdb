//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate provider, generator and store calls into use-case APIs.
//! - Keep CLI/host layers decoupled from storage details.

pub mod milestone_service;
pub mod recompute;
