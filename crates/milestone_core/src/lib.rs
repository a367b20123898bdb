//! Milestone discovery engine.
//!
//! Finds the "beautiful" dates of an event: repdigit and palindromic day
//! counts, powers of two, round multiples, anniversaries and compound
//! calendar breakdowns, bounded by a moving horizon, and keeps a persisted
//! milestone set in step with its anchor.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod db;
pub mod generator;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod service;
pub mod strategy;

pub use calendar::{
    add_calendar, add_unit, decompose_calendar, elapsed_units, CalendarBreakdown, CalendarError,
    TimeUnit,
};
pub use clock::{horizon_end, resolve_horizon, Clock, FixedClock, SystemClock};
pub use config::{ConfigError, EngineConfig, HorizonConfig};
pub use generator::{
    GenerateError, MilestoneGenerator, PlanSummary, RandomShareTokens, SequentialShareTokens,
    ShareTokenMinter, WritePlan,
};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogSink};
pub use model::event::{EventId, EventRecord};
pub use model::milestone::{
    Candidate, LabelParams, Milestone, MilestoneValidationError, NaturalKey, ShareToken,
    StrategyKind,
};
pub use registry::{RegistryBuild, StrategyDefinition, StrategyRegistry};
pub use repo::event_repo::{EventProvider, SqliteEventRepository};
pub use repo::milestone_repo::{
    DateRange, FeedQuery, MilestoneStore, RepoError, RepoResult, SqliteMilestoneStore,
};
pub use service::milestone_service::{
    MilestoneService, MilestoneServiceError, RegenerateOutcome, ServiceResult,
};
pub use service::recompute::{recompute_all, RecomputeFailure, RecomputeReport};
pub use strategy::{ConfigurationError, StrategyConfig};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
