use milestone_core::db::{latest_version, open_db, open_db_in_memory, schema_version, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "events");
    assert_table_exists(&conn, "milestones");
    assert_eq!(pragma_i64(&conn, "foreign_keys"), 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("milestones.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "milestones");

    let journal: String = conn_second
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal.to_ascii_lowercase(), "wal");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_zero_interval_and_duplicate_natural_key() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO events (uuid, owner_id, anchor_date, is_active)
         VALUES ('e1', 1, '2020-01-01', 1);",
        [],
    )
    .unwrap();

    let insert = |value: i64, token: &str| {
        conn.execute(
            "INSERT INTO milestones (
                event_uuid, strategy_kind, interval_unit, interval_value,
                target_date, label_params, share_token
            ) VALUES ('e1', 'repdigit', 'day', ?1, '2020-04-21', '{}', ?2);",
            rusqlite::params![value, token],
        )
    };

    assert!(insert(0, "t0").is_err());
    insert(111, "t1").unwrap();
    assert!(insert(111, "t2").is_err());
}

fn pragma_i64(conn: &Connection, name: &str) -> i64 {
    conn.query_row(&format!("PRAGMA {name};"), [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
