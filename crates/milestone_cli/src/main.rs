//! Milestone CLI: the `milestone` command.
//!
//! # Responsibility
//! - Expose preview, event maintenance, regeneration and read queries of
//!   `milestone_core` over a SQLite database path.
//! - Print machine-readable JSON on stdout; diagnostics go to stderr.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, EngineArgs};
use log::info;
use milestone_core::db::open_db;
use milestone_core::{
    init_stderr_logging, recompute_all, resolve_horizon, Clock, DateRange, EngineConfig,
    EventProvider, EventRecord, FeedQuery, FixedClock, MilestoneGenerator, MilestoneService,
    MilestoneStore, ShareToken, SqliteEventRepository, SqliteMilestoneStore, StrategyRegistry,
    SystemClock,
};
use serde::Serialize;
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(level) = cli.log_level.as_deref() {
        if let Err(err) = init_stderr_logging(level) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> CliResult {
    match command {
        Commands::Preview { anchor, engine } => {
            let engine = Engine::load(&engine)?;
            let horizon_end = resolve_horizon(engine.clock.as_ref(), &engine.config.horizon);
            let candidates =
                MilestoneGenerator::new(&engine.registry).generate_candidates(anchor, horizon_end)?;
            print_json(&json!({
                "anchor": anchor,
                "horizon_end": horizon_end,
                "candidates": candidates,
            }))
        }

        Commands::EventUpsert {
            db,
            event_id,
            owner,
            anchor,
            inactive,
        } => {
            let conn = open_db(&db)?;
            let repo = SqliteEventRepository::try_new(&conn)?;
            let mut event = EventRecord::new(owner, anchor);
            if let Some(event_id) = event_id {
                event.event_id = event_id;
            }
            event.is_active = !inactive;
            repo.upsert_event(&event)?;
            print_json(&event)
        }

        Commands::Regenerate {
            db,
            event_id,
            owner,
            engine,
        } => {
            let engine = Engine::load(&engine)?;
            let conn = open_db(&db)?;
            let service = MilestoneService::new(
                SqliteEventRepository::try_new(&conn)?,
                SqliteMilestoneStore::try_new(&conn)?,
                &engine.registry,
                engine.clock.as_ref(),
                engine.config.horizon,
            );
            match (event_id, owner) {
                (Some(event_id), _) => print_json(&service.regenerate_event(event_id)?),
                (None, Some(owner)) => print_json(&service.regenerate_for_owner(owner)?),
                (None, None) => Err("either --event-id or --owner is required".into()),
            }
        }

        Commands::RecomputeAll {
            db,
            concurrency,
            engine,
        } => {
            let engine = Engine::load(&engine)?;
            let report = recompute_all(
                &db,
                &engine.registry,
                engine.clock.as_ref(),
                &engine.config.horizon,
                concurrency,
            )?;
            print_json(&report)
        }

        Commands::Due { db, from, to } => {
            let conn = open_db(&db)?;
            let store = SqliteMilestoneStore::try_new(&conn)?;
            let range = DateRange::new(from, to.unwrap_or(from));
            print_json(&store.query_due(&range)?)
        }

        Commands::Feed {
            db,
            owner,
            from,
            limit,
            offset,
        } => {
            let conn = open_db(&db)?;
            let store = SqliteMilestoneStore::try_new(&conn)?;
            let from_date = from.unwrap_or_else(|| SystemClock.today());
            let query = FeedQuery {
                owner_id: owner,
                from_date,
                limit,
                offset,
            };
            let items = store.list_upcoming_for_owner(&query)?;
            let total = store.count_upcoming_for_owner(owner, from_date)?;
            print_json(&json!({ "total": total, "items": items }))
        }

        Commands::Share { db, token } => {
            let conn = open_db(&db)?;
            let store = SqliteMilestoneStore::try_new(&conn)?;
            let token = ShareToken::from_string(token).ok_or("share token cannot be blank")?;
            match store.find_by_share_token(&token)? {
                Some(milestone) => {
                    let events = SqliteEventRepository::try_new(&conn)?;
                    let event = events.get_event(milestone.event_id)?;
                    print_json(&json!({ "milestone": milestone, "event": event }))
                }
                None => Err(format!("no milestone for share token `{token}`").into()),
            }
        }
    }
}

/// Configuration, registry and clock resolved from command-line options.
struct Engine {
    config: EngineConfig,
    registry: StrategyRegistry,
    clock: Box<dyn Clock>,
}

impl Engine {
    fn load(args: &EngineArgs) -> Result<Self, Box<dyn Error>> {
        let config = match &args.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default_catalog(),
        };
        let build = config.build_registry();
        for rejected in &build.errors {
            eprintln!("warning: {rejected}");
        }
        let clock: Box<dyn Clock> = match args.today {
            Some(today) => Box::new(FixedClock(today)),
            None => Box::new(SystemClock),
        };
        info!(
            "event=cli_engine_load module=cli status=ok strategies={} rejected={}",
            build.registry.len(),
            build.errors.len()
        );
        Ok(Self {
            config,
            registry: build.registry,
            clock,
        })
    }
}

fn print_json(value: &impl Serialize) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
