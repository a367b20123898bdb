//! Event provider contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose anchors, ownership and activity of events to the engine.
//! - Provide the write side used by hosts that keep events in the same DB.
//!
//! # Invariants
//! - Core never edits an anchor on its own; `upsert_event` is host-driven.
//! - Deleting an event cascades to its milestones through the FK.

use crate::model::event::{EventId, EventRecord};
use crate::repo::milestone_repo::{
    date_to_db, ensure_tables_ready, parse_date, RepoError, RepoResult,
};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const EVENT_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    anchor_date,
    is_active
FROM events";

/// Read access to events, as consumed by regeneration.
pub trait EventProvider {
    /// Gets one event by id.
    fn get_event(&self, event_id: EventId) -> RepoResult<Option<EventRecord>>;
    /// Lists ids of every active event, in stable order.
    fn list_active_event_ids(&self) -> RepoResult<Vec<EventId>>;
    /// Lists every event of one owner, active or not.
    fn list_events_for_owner(&self, owner_id: i64) -> RepoResult<Vec<EventRecord>>;
}

/// SQLite-backed event provider.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["events"])?;
        Ok(Self { conn })
    }

    /// Inserts or replaces one event's anchor, owner and activity flag.
    pub fn upsert_event(&self, event: &EventRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO events (uuid, owner_id, anchor_date, is_active)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(uuid) DO UPDATE SET
                owner_id = excluded.owner_id,
                anchor_date = excluded.anchor_date,
                is_active = excluded.is_active,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                event.event_id.to_string(),
                event.owner_id,
                date_to_db(event.anchor_date),
                bool_to_db(event.is_active),
            ],
        )?;
        info!(
            "event=event_upsert module=repo status=ok event_id={} active={}",
            event.event_id, event.is_active
        );
        Ok(())
    }

    /// Deletes one event and, through the FK, all of its milestones.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no such event exists.
    pub fn delete_event(&self, event_id: EventId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE uuid = ?1;", [event_id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(event_id));
        }
        info!(
            "event=event_delete module=repo status=ok event_id={}",
            event_id
        );
        Ok(())
    }

    fn query_events(&self, sql: &str, bind: impl rusqlite::Params) -> RepoResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

impl EventProvider for SqliteEventRepository<'_> {
    fn get_event(&self, event_id: EventId) -> RepoResult<Option<EventRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EVENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let row = stmt
            .query_row([event_id.to_string()], |row| Ok(parse_event_row(row)))
            .optional()?;
        row.transpose()
    }

    fn list_active_event_ids(&self) -> RepoResult<Vec<EventId>> {
        let events = self.query_events(
            &format!("{EVENT_SELECT_SQL} WHERE is_active = 1 ORDER BY uuid ASC;"),
            [],
        )?;
        Ok(events.into_iter().map(|event| event.event_id).collect())
    }

    fn list_events_for_owner(&self, owner_id: i64) -> RepoResult<Vec<EventRecord>> {
        self.query_events(
            &format!("{EVENT_SELECT_SQL} WHERE owner_id = ?1 ORDER BY anchor_date ASC, uuid ASC;"),
            [owner_id],
        )
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<EventRecord> {
    let uuid_text: String = row.get("uuid")?;
    let event_id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in events.uuid"))
    })?;

    let is_active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in events.is_active"
            )));
        }
    };

    Ok(EventRecord {
        event_id,
        owner_id: row.get("owner_id")?,
        anchor_date: parse_date(&row.get::<_, String>("anchor_date")?)?,
        is_active,
    })
}

fn bool_to_db(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
