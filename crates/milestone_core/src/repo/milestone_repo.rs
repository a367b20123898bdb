//! Milestone store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load, diff-apply and query persisted milestones.
//! - Detect natural-key races between concurrent regenerations.
//!
//! # Invariants
//! - `apply_write_plan` runs inside one IMMEDIATE transaction.
//! - Updates and deletes match on natural key *and* share token; a miss
//!   means another writer got there first and is reported as `WriteConflict`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::calendar::{CalendarBreakdown, TimeUnit};
use crate::db::DbError;
use crate::generator::WritePlan;
use crate::model::event::EventId;
use crate::model::milestone::{
    LabelParams, Milestone, MilestoneValidationError, NaturalKey, ShareToken, StrategyKind,
};
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::{ffi, params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

const MILESTONE_SELECT_SQL: &str = "SELECT
    m.event_uuid,
    m.strategy_kind,
    m.interval_unit,
    m.interval_value,
    m.target_date,
    m.label_params,
    m.compound_years,
    m.compound_months,
    m.compound_days,
    m.share_token
FROM milestones m";

const MILESTONE_ORDER_SQL: &str =
    "ORDER BY m.target_date ASC, m.event_uuid ASC, m.strategy_kind ASC, m.interval_unit ASC, m.interval_value ASC";

const DATE_FORMAT: &str = "%Y-%m-%d";
const FEED_DEFAULT_LIMIT: u32 = 10;
const FEED_LIMIT_MAX: u32 = 50;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for milestone and event persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(MilestoneValidationError),
    Db(DbError),
    NotFound(EventId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
    /// A concurrent writer changed the event's milestones first.
    WriteConflict { event_id: EventId, detail: String },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted milestone data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table: {table}"),
            Self::WriteConflict { event_id, detail } => {
                write!(f, "write conflict for event {event_id}: {detail}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidData(_)
            | Self::MissingRequiredTable(_)
            | Self::WriteConflict { .. } => None,
        }
    }
}

impl From<MilestoneValidationError> for RepoError {
    fn from(value: MilestoneValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Single-day range.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }
}

/// Query options for an owner's upcoming-milestone feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub owner_id: i64,
    /// Earliest target date included.
    pub from_date: NaiveDate,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Durable keyed storage of milestones.
pub trait MilestoneStore {
    /// Returns every stored milestone of one event.
    fn load_existing(&self, event_id: EventId) -> RepoResult<Vec<Milestone>>;
    /// Applies inserts, updates and deletes atomically.
    fn apply_write_plan(&self, plan: &WritePlan) -> RepoResult<()>;
    /// Returns milestones of active events due within `range`.
    fn query_due(&self, range: &DateRange) -> RepoResult<Vec<Milestone>>;
    /// Resolves one milestone by its public share token.
    fn find_by_share_token(&self, token: &ShareToken) -> RepoResult<Option<Milestone>>;
    /// Removes every milestone of one event, returning the row count.
    fn delete_all_for_event(&self, event_id: EventId) -> RepoResult<usize>;
    /// Lists upcoming milestones across an owner's active events.
    fn list_upcoming_for_owner(&self, query: &FeedQuery) -> RepoResult<Vec<Milestone>>;
    /// Counts upcoming milestones across an owner's active events.
    fn count_upcoming_for_owner(&self, owner_id: i64, from_date: NaiveDate) -> RepoResult<u64>;
    /// Lists one event's milestones on or after `from_date`.
    fn list_for_event(&self, event_id: EventId, from_date: NaiveDate)
        -> RepoResult<Vec<Milestone>>;
}

/// SQLite-backed milestone store.
pub struct SqliteMilestoneStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMilestoneStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["events", "milestones"])?;
        Ok(Self { conn })
    }

    fn query_milestones(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> RepoResult<Vec<Milestone>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut milestones = Vec::new();
        while let Some(row) = rows.next()? {
            milestones.push(parse_milestone_row(row)?);
        }
        Ok(milestones)
    }
}

impl MilestoneStore for SqliteMilestoneStore<'_> {
    fn load_existing(&self, event_id: EventId) -> RepoResult<Vec<Milestone>> {
        self.query_milestones(
            &format!("{MILESTONE_SELECT_SQL} WHERE m.event_uuid = ?1 {MILESTONE_ORDER_SQL};"),
            [event_id.to_string()],
        )
    }

    fn apply_write_plan(&self, plan: &WritePlan) -> RepoResult<()> {
        let started_at = Instant::now();
        let summary = plan.summary();
        if plan.is_empty() {
            return Ok(());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        // Dropping `tx` on any error path rolls the whole plan back.
        let result = match apply_plan_in_tx(&tx, plan) {
            Ok(()) => tx.commit().map_err(RepoError::from),
            Err(err) => Err(err),
        };

        match &result {
            Ok(()) => info!(
                "event=write_plan_apply module=repo status=ok event_id={} inserts={} updates={} deletes={} duration_ms={}",
                plan.event_id,
                summary.inserted,
                summary.updated,
                summary.deleted,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=write_plan_apply module=repo status=error event_id={} duration_ms={} error={}",
                plan.event_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn query_due(&self, range: &DateRange) -> RepoResult<Vec<Milestone>> {
        self.query_milestones(
            &format!(
                "{MILESTONE_SELECT_SQL}
                 INNER JOIN events e ON e.uuid = m.event_uuid
                 WHERE e.is_active = 1
                   AND m.target_date >= ?1
                   AND m.target_date <= ?2
                 {MILESTONE_ORDER_SQL};"
            ),
            params![date_to_db(range.start), date_to_db(range.end)],
        )
    }

    fn find_by_share_token(&self, token: &ShareToken) -> RepoResult<Option<Milestone>> {
        let mut found = self.query_milestones(
            &format!("{MILESTONE_SELECT_SQL} WHERE m.share_token = ?1;"),
            [token.as_str()],
        )?;
        Ok(found.pop())
    }

    fn delete_all_for_event(&self, event_id: EventId) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM milestones WHERE event_uuid = ?1;",
            [event_id.to_string()],
        )?;
        info!(
            "event=milestones_delete_all module=repo status=ok event_id={} deleted={}",
            event_id, deleted
        );
        Ok(deleted)
    }

    fn list_upcoming_for_owner(&self, query: &FeedQuery) -> RepoResult<Vec<Milestone>> {
        let limit = normalize_feed_limit(query.limit);
        self.query_milestones(
            &format!(
                "{MILESTONE_SELECT_SQL}
                 INNER JOIN events e ON e.uuid = m.event_uuid
                 WHERE e.owner_id = ?1
                   AND e.is_active = 1
                   AND m.target_date >= ?2
                 {MILESTONE_ORDER_SQL}
                 LIMIT ?3 OFFSET ?4;"
            ),
            params![
                query.owner_id,
                date_to_db(query.from_date),
                i64::from(limit),
                i64::from(query.offset)
            ],
        )
    }

    fn count_upcoming_for_owner(&self, owner_id: i64, from_date: NaiveDate) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM milestones m
             INNER JOIN events e ON e.uuid = m.event_uuid
             WHERE e.owner_id = ?1
               AND e.is_active = 1
               AND m.target_date >= ?2;",
            params![owner_id, date_to_db(from_date)],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative milestone count `{count}`")))
    }

    fn list_for_event(
        &self,
        event_id: EventId,
        from_date: NaiveDate,
    ) -> RepoResult<Vec<Milestone>> {
        self.query_milestones(
            &format!(
                "{MILESTONE_SELECT_SQL}
                 WHERE m.event_uuid = ?1
                   AND m.target_date >= ?2
                 {MILESTONE_ORDER_SQL};"
            ),
            params![event_id.to_string(), date_to_db(from_date)],
        )
    }
}

/// Normalizes feed page size: 0 or missing means 10, values above 50 clamp.
pub fn normalize_feed_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => FEED_DEFAULT_LIMIT,
        Some(value) if value > FEED_LIMIT_MAX => FEED_LIMIT_MAX,
        Some(value) => value,
    }
}

fn apply_plan_in_tx(tx: &Transaction<'_>, plan: &WritePlan) -> RepoResult<()> {
    let event_id = plan.event_id;
    let event_text = event_id.to_string();
    let conflict = |detail: String| RepoError::WriteConflict { event_id, detail };

    for milestone in plan
        .inserts
        .iter()
        .chain(&plan.updates)
        .chain(&plan.deletes)
    {
        if milestone.event_id != event_id {
            return Err(RepoError::InvalidData(format!(
                "write plan for event {event_id} contains milestone of event {}",
                milestone.event_id
            )));
        }
    }

    for milestone in &plan.deletes {
        let key = &milestone.key;
        let changed = tx.execute(
            "DELETE FROM milestones
             WHERE event_uuid = ?1
               AND strategy_kind = ?2
               AND interval_unit = ?3
               AND interval_value = ?4
               AND share_token = ?5;",
            params![
                event_text,
                key.kind.as_str(),
                key.unit.as_str(),
                value_to_db(key.value)?,
                milestone.share_token.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(conflict(format!("delete of {key} matched no row")));
        }
    }

    for milestone in &plan.updates {
        milestone.validate()?;
        let key = &milestone.key;
        let breakdown = milestone.compound_breakdown;
        let changed = tx.execute(
            "UPDATE milestones
             SET
                target_date = ?6,
                label_params = ?7,
                compound_years = ?8,
                compound_months = ?9,
                compound_days = ?10,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE event_uuid = ?1
               AND strategy_kind = ?2
               AND interval_unit = ?3
               AND interval_value = ?4
               AND share_token = ?5;",
            params![
                event_text,
                key.kind.as_str(),
                key.unit.as_str(),
                value_to_db(key.value)?,
                milestone.share_token.as_str(),
                date_to_db(milestone.target_date),
                label_params_to_db(&milestone.label_params)?,
                breakdown.map(|b| b.years),
                breakdown.map(|b| b.months),
                breakdown.map(|b| b.days),
            ],
        )?;
        if changed == 0 {
            return Err(conflict(format!("update of {key} matched no row")));
        }
    }

    for milestone in &plan.inserts {
        milestone.validate()?;
        let key = &milestone.key;
        let breakdown = milestone.compound_breakdown;
        let inserted = tx.execute(
            "INSERT INTO milestones (
                event_uuid,
                strategy_kind,
                interval_unit,
                interval_value,
                target_date,
                label_params,
                compound_years,
                compound_months,
                compound_days,
                share_token
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                event_text,
                key.kind.as_str(),
                key.unit.as_str(),
                value_to_db(key.value)?,
                date_to_db(milestone.target_date),
                label_params_to_db(&milestone.label_params)?,
                breakdown.map(|b| b.years),
                breakdown.map(|b| b.months),
                breakdown.map(|b| b.days),
                milestone.share_token.as_str(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(err) => {
                return Err(match constraint_kind(&err) {
                    Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                        conflict(format!("insert of {key} collided with an existing row"))
                    }
                    Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => RepoError::NotFound(event_id),
                    _ => err.into(),
                });
            }
        }
    }

    Ok(())
}

pub(crate) fn ensure_tables_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn constraint_kind(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn parse_milestone_row(row: &Row<'_>) -> RepoResult<Milestone> {
    let event_text: String = row.get(0)?;
    let event_id = Uuid::parse_str(&event_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{event_text}` in milestones.event_uuid"
        ))
    })?;

    let kind_text: String = row.get(1)?;
    let kind = StrategyKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid strategy kind `{kind_text}` in milestones.strategy_kind"
        ))
    })?;

    let unit_text: String = row.get(2)?;
    let unit = TimeUnit::parse(&unit_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid interval unit `{unit_text}` in milestones.interval_unit"
        ))
    })?;

    let value_raw: i64 = row.get(3)?;
    let value = u64::try_from(value_raw).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid interval value `{value_raw}` in milestones.interval_value"
        ))
    })?;

    let target_date = parse_date(&row.get::<_, String>(4)?)?;

    let label_text: String = row.get(5)?;
    let label_params: LabelParams = serde_json::from_str(&label_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid label params in milestones.label_params: {err}"))
    })?;

    let compound_breakdown = match (
        row.get::<_, Option<u32>>(6)?,
        row.get::<_, Option<u32>>(7)?,
        row.get::<_, Option<u32>>(8)?,
    ) {
        (Some(years), Some(months), Some(days)) => {
            Some(CalendarBreakdown::new(years, months, days))
        }
        (None, None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(
                "partially populated compound breakdown in milestones".to_string(),
            ));
        }
    };

    let token_text: String = row.get(9)?;
    let share_token = ShareToken::from_string(token_text).ok_or_else(|| {
        RepoError::InvalidData("blank share token in milestones.share_token".to_string())
    })?;

    let milestone = Milestone {
        event_id,
        key: NaturalKey { kind, unit, value },
        target_date,
        label_params,
        compound_breakdown,
        share_token,
    };
    milestone.validate()?;
    Ok(milestone)
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date value `{value}`")))
}

fn value_to_db(value: u64) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("interval value `{value}` exceeds storage range"))
    })
}

fn label_params_to_db(params: &LabelParams) -> RepoResult<String> {
    serde_json::to_string(params)
        .map_err(|err| RepoError::InvalidData(format!("label params not serializable: {err}")))
}
