use chrono::NaiveDate;
use milestone_core::db::{open_db, open_db_in_memory};
use milestone_core::{
    add_calendar, add_unit, recompute_all, EngineConfig, EventRecord, FixedClock, HorizonConfig, MilestoneService,
    MilestoneStore, NaturalKey, SqliteEventRepository, SqliteMilestoneStore, StrategyDefinition,
    StrategyKind, StrategyRegistry, TimeUnit,
};
use serde_json::json;
use std::collections::BTreeMap;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn build(definitions: &[StrategyDefinition]) -> StrategyRegistry {
    let build = StrategyRegistry::build(definitions);
    assert!(build.errors.is_empty(), "{:?}", build.errors);
    build.registry
}

fn horizon(days: u32) -> HorizonConfig {
    HorizonConfig {
        lookahead_days: days,
    }
}

#[test]
fn anchor_edit_moves_targets_and_keeps_share_tokens() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let mut event = EventRecord::new(1, date(2020, 1, 1));
    events.upsert_event(&event).unwrap();

    let registry = build(&[StrategyDefinition::new(
        "anniversary",
        0,
        json!({ "max_years": 1 }),
    )]);
    let clock = FixedClock(date(2020, 1, 1));
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    let service = MilestoneService::new(
        SqliteEventRepository::try_new(&conn).unwrap(),
        store,
        &registry,
        &clock,
        horizon(800),
    );

    service.regenerate_event(event.event_id).unwrap();
    let before = service.store().load_existing(event.event_id).unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].target_date, date(2021, 1, 1));

    event.anchor_date = date(2020, 2, 1);
    events.upsert_event(&event).unwrap();
    let outcome = service.regenerate_event(event.event_id).unwrap();
    assert_eq!(outcome.summary.updated, 1);
    assert_eq!(outcome.summary.inserted, 0);

    let after = service.store().load_existing(event.event_id).unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].target_date, date(2021, 2, 1));
    assert_eq!(
        after[0].key,
        NaturalKey {
            kind: StrategyKind::Anniversary,
            unit: TimeUnit::Year,
            value: 1
        }
    );
    assert_eq!(after[0].share_token, before[0].share_token);
}

#[test]
fn anchor_edit_keeps_compound_and_repdigit_identity() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let mut event = EventRecord::new(1, date(2020, 1, 31));
    events.upsert_event(&event).unwrap();

    let registry = build(&[
        StrategyDefinition::new(
            "compound",
            0,
            json!({ "granularities": [
                { "years": 0, "months": 1, "days": 1 },
                { "years": 1, "months": 2, "days": 3 },
                { "years": 2 }
            ] }),
        ),
        StrategyDefinition::new(
            "repdigit",
            1,
            json!({ "min_digits": 3, "max_digits": 3, "units": ["day"] }),
        ),
    ]);
    let clock = FixedClock(date(2020, 3, 15));
    let service = MilestoneService::new(
        SqliteEventRepository::try_new(&conn).unwrap(),
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        &registry,
        &clock,
        horizon(3650),
    );

    let first = service.regenerate_event(event.event_id).unwrap();
    assert_eq!(first.summary.inserted, 12);
    let before: BTreeMap<_, _> = service
        .store()
        .load_existing(event.event_id)
        .unwrap()
        .into_iter()
        .map(|milestone| (milestone.key, milestone))
        .collect();
    assert_eq!(before.len(), 12);

    event.anchor_date = date(2020, 3, 15);
    events.upsert_event(&event).unwrap();
    let outcome = service.regenerate_event(event.event_id).unwrap();
    assert_eq!(outcome.summary.inserted, 0);
    assert_eq!(outcome.summary.deleted, 0);
    assert_eq!(outcome.summary.updated, 12);

    let after = service.store().load_existing(event.event_id).unwrap();
    assert_eq!(after.len(), before.len());
    for milestone in &after {
        let previous = &before[&milestone.key];
        assert_eq!(milestone.share_token, previous.share_token);
        assert_eq!(milestone.compound_breakdown, previous.compound_breakdown);
        assert_ne!(milestone.target_date, previous.target_date);

        let expected = match (milestone.key.kind, milestone.compound_breakdown) {
            (StrategyKind::Compound, Some(breakdown)) => add_calendar(
                event.anchor_date,
                breakdown.years,
                breakdown.months,
                breakdown.days,
            )
            .unwrap(),
            (StrategyKind::Repdigit, None) => {
                add_unit(event.anchor_date, milestone.key.value, milestone.key.unit).unwrap()
            }
            other => panic!("unexpected milestone shape: {other:?}"),
        };
        assert_eq!(milestone.target_date, expected, "{}", milestone.key);
    }

    let one_month_one_day = after
        .iter()
        .find(|milestone| {
            milestone.key.kind == StrategyKind::Compound && milestone.key.value == 101
        })
        .unwrap();
    assert_eq!(one_month_one_day.target_date, date(2020, 4, 16));
}

#[test]
fn repeated_regeneration_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let event = EventRecord::new(1, date(2015, 3, 14));
    events.upsert_event(&event).unwrap();

    let config = EngineConfig::default_catalog();
    let build = config.build_registry();
    assert!(build.errors.is_empty());
    let clock = FixedClock(date(2024, 3, 14));
    let service = MilestoneService::new(
        events,
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        &build.registry,
        &clock,
        config.horizon,
    );

    let first = service.regenerate_event(event.event_id).unwrap();
    assert!(first.summary.inserted > 0);
    let stored = service.store().load_existing(event.event_id).unwrap();

    let second = service.regenerate_event(event.event_id).unwrap();
    assert_eq!(second.summary.inserted, 0);
    assert_eq!(second.summary.updated, 0);
    assert_eq!(second.summary.deleted, 0);
    assert_eq!(service.store().load_existing(event.event_id).unwrap(), stored);
}

#[test]
fn disabling_a_strategy_deletes_its_milestones() {
    let conn = open_db_in_memory().unwrap();
    let events = SqliteEventRepository::try_new(&conn).unwrap();
    let event = EventRecord::new(1, date(2020, 1, 1));
    events.upsert_event(&event).unwrap();
    let clock = FixedClock(date(2020, 1, 1));

    let repdigit = StrategyDefinition::new(
        "repdigit",
        0,
        json!({ "min_digits": 3, "max_digits": 3, "units": ["day"] }),
    );
    let mut anniversary = StrategyDefinition::new("anniversary", 1, json!({ "max_years": 2 }));

    let full = build(&[repdigit.clone(), anniversary.clone()]);
    let service = MilestoneService::new(
        SqliteEventRepository::try_new(&conn).unwrap(),
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        &full,
        &clock,
        horizon(1000),
    );
    let outcome = service.regenerate_event(event.event_id).unwrap();
    assert_eq!(outcome.summary.inserted, 9 + 2);

    anniversary.enabled = false;
    let reduced = build(&[repdigit, anniversary]);
    let service = MilestoneService::new(
        SqliteEventRepository::try_new(&conn).unwrap(),
        SqliteMilestoneStore::try_new(&conn).unwrap(),
        &reduced,
        &clock,
        horizon(1000),
    );
    let outcome = service.regenerate_event(event.event_id).unwrap();
    assert_eq!(outcome.summary.deleted, 2);
    assert_eq!(outcome.summary.inserted, 0);

    let remaining = service.store().load_existing(event.event_id).unwrap();
    assert_eq!(remaining.len(), 9);
    assert!(remaining
        .iter()
        .all(|milestone| milestone.key.kind == StrategyKind::Repdigit));
}

#[test]
fn recompute_all_covers_active_events_across_workers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("milestones.db");

    let mut expected_ids = Vec::new();
    {
        let conn = open_db(&path).unwrap();
        let events = SqliteEventRepository::try_new(&conn).unwrap();
        for offset in 0..6 {
            let event = EventRecord::new(offset % 2, date(2020, 1, 1 + offset as u32));
            events.upsert_event(&event).unwrap();
            expected_ids.push(event.event_id);
        }
        let mut paused = EventRecord::new(9, date(2020, 1, 1));
        paused.is_active = false;
        events.upsert_event(&paused).unwrap();
    }

    let registry = build(&[StrategyDefinition::new(
        "anniversary",
        0,
        json!({ "max_years": 3 }),
    )]);
    let clock = FixedClock(date(2020, 1, 1));

    let report = recompute_all(&path, &registry, &clock, &horizon(4 * 366), 3).unwrap();
    assert_eq!(report.total, 6);
    assert_eq!(report.succeeded, 6);
    assert!(report.failures.is_empty());
    assert_eq!(report.summary.inserted, 6 * 3);

    let again = recompute_all(&path, &registry, &clock, &horizon(4 * 366), 3).unwrap();
    assert_eq!(again.succeeded, 6);
    assert_eq!(again.summary.inserted, 0);
    assert_eq!(again.summary.updated, 0);

    let conn = open_db(&path).unwrap();
    let store = SqliteMilestoneStore::try_new(&conn).unwrap();
    for event_id in expected_ids {
        assert_eq!(store.load_existing(event_id).unwrap().len(), 3);
    }
}

#[test]
fn recompute_all_with_no_events_reports_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.db");
    drop(open_db(&path).unwrap());

    let registry = build(&[StrategyDefinition::new("anniversary", 0, json!(null))]);
    let clock = FixedClock(date(2020, 1, 1));
    let report = recompute_all(&path, &registry, &clock, &HorizonConfig::default(), 0).unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(report.succeeded, 0);
}
