use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::error::Result;

pub const DB_FILE: &str = "cardcycle.db";

const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    card_label TEXT NOT NULL,
    issuer_label TEXT NOT NULL,
    login_url TEXT NOT NULL,
    closing_day INTEGER NOT NULL CHECK (closing_day BETWEEN 1 AND 31),
    statement_day INTEGER NOT NULL CHECK (statement_day BETWEEN 1 AND 31),
    is_active INTEGER NOT NULL DEFAULT 1,
    encrypted_credentials BLOB NOT NULL CHECK (length(encrypted_credentials) > 0),
    last_download_at TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS schedules (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL UNIQUE,
    next_occurrence TEXT NOT NULL,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    last_success TEXT,
    last_error TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_schedules_next ON schedules(next_occurrence);

CREATE TABLE IF NOT EXISTS download_runs (
    id INTEGER PRIMARY KEY,
    schedule_id INTEGER NOT NULL,
    target TEXT NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    reported_at TEXT NOT NULL,
    FOREIGN KEY (schedule_id) REFERENCES schedules(id) ON DELETE CASCADE
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    // Concurrent CLI invocations wait on the writer lock instead of failing.
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub fn to_stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

pub fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, STAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Read a stored timestamp column, failing the row if it is malformed.
pub fn stamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_stamp(&raw).ok_or_else(|| bad_stamp(idx, raw))
}

pub fn opt_stamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_stamp(&raw).map(Some).ok_or_else(|| bad_stamp(idx, raw)),
    }
}

fn bad_stamp(idx: usize, raw: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("malformed timestamp: {raw}").into(),
    )
}
