//! Schedule registry: the source of truth for when each account's next
//! statement download fires, and how the last attempt went.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::cycle;
use crate::db::{opt_stamp_column, stamp_column, to_stamp};
use crate::error::{CycleError, Result};
use crate::models::{DownloadRun, Schedule, ScheduleView};

const SCHEDULE_COLUMNS: &str =
    "s.id, s.account_id, s.next_occurrence, s.is_enabled, s.last_success, s.last_error, s.created_at";

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    Ok(Schedule {
        id: row.get(0)?,
        account_id: row.get(1)?,
        next_occurrence: stamp_column(row, 2)?,
        enabled: row.get(3)?,
        last_success: opt_stamp_column(row, 4)?,
        last_error: row.get(5)?,
        created_at: stamp_column(row, 6)?,
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleView> {
    Ok(ScheduleView {
        schedule: schedule_from_row(row)?,
        card_label: row.get(7)?,
        issuer_label: row.get(8)?,
        account_active: row.get(9)?,
    })
}

fn query_views(conn: &Connection, filter: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<ScheduleView>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEDULE_COLUMNS}, a.card_label, a.issuer_label, a.is_active \
         FROM schedules s JOIN accounts a ON s.account_id = a.id \
         {filter} ORDER BY s.next_occurrence, s.id"
    ))?;
    let rows = stmt
        .query_map(params, view_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_schedules(conn: &Connection) -> Result<Vec<Schedule>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules s ORDER BY s.created_at, s.id"
    ))?;
    let rows = stmt
        .query_map([], schedule_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every schedule with its account labels, soonest first.
pub fn list_schedule_views(conn: &Connection) -> Result<Vec<ScheduleView>> {
    query_views(conn, "", &[])
}

/// Enabled schedules of active accounts whose occurrence has arrived.
pub fn due_schedules(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<ScheduleView>> {
    query_views(
        conn,
        "WHERE s.is_enabled = 1 AND a.is_active = 1 AND s.next_occurrence <= ?1",
        &[&to_stamp(now) as &dyn rusqlite::ToSql],
    )
}

pub fn get_schedule(conn: &Connection, id: i64) -> Result<Schedule> {
    conn.query_row(
        &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.id = ?1"),
        [id],
        schedule_from_row,
    )
    .optional()?
    .ok_or(CycleError::UnknownSchedule(id))
}

pub fn schedule_for_account(conn: &Connection, account_id: i64) -> Result<Option<Schedule>> {
    let schedule = conn
        .query_row(
            &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules s WHERE s.account_id = ?1"),
            [account_id],
            schedule_from_row,
        )
        .optional()?;
    Ok(schedule)
}

/// Insert an enabled schedule with no history.
///
/// The existence check and the insert are one statement, so a concurrent
/// caller that loses the race gets [`CycleError::Conflict`] instead of a
/// second schedule.
pub fn create_schedule(conn: &Connection, account_id: i64, next_occurrence: DateTime<Utc>) -> Result<Schedule> {
    let inserted = conn.execute(
        "INSERT INTO schedules (account_id, next_occurrence, is_enabled) VALUES (?1, ?2, 1) \
         ON CONFLICT(account_id) DO NOTHING",
        rusqlite::params![account_id, to_stamp(next_occurrence)],
    )?;
    if inserted == 0 {
        return Err(CycleError::Conflict { account_id });
    }
    let schedule = get_schedule(conn, conn.last_insert_rowid())?;
    tracing::info!(
        schedule_id = schedule.id,
        account_id,
        next = %to_stamp(schedule.next_occurrence),
        "schedule created"
    );
    Ok(schedule)
}

pub fn set_enabled(conn: &Connection, id: i64, enabled: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE schedules SET is_enabled = ?1 WHERE id = ?2",
        rusqlite::params![enabled, id],
    )?;
    if changed == 0 {
        return Err(CycleError::UnknownSchedule(id));
    }
    tracing::info!(schedule_id = id, enabled, "schedule toggled");
    Ok(())
}

/// Flip the enabled flag and return the new value.
pub fn toggle(conn: &Connection, id: i64) -> Result<bool> {
    let enabled: bool = conn
        .query_row(
            "UPDATE schedules SET is_enabled = 1 - is_enabled WHERE id = ?1 RETURNING is_enabled",
            [id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(CycleError::UnknownSchedule(id))?;
    tracing::info!(schedule_id = id, enabled, "schedule toggled");
    Ok(enabled)
}

fn log_run(tx: &Transaction<'_>, id: i64, target: DateTime<Utc>, error: Option<&str>, at: DateTime<Utc>) -> Result<()> {
    tx.execute(
        "INSERT INTO download_runs (schedule_id, target, success, error, reported_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id, to_stamp(target), error.is_none(), error, to_stamp(at)],
    )?;
    Ok(())
}

/// A download completed: clear the error and move one month past the prior target.
pub fn record_success(conn: &Connection, id: i64, at: DateTime<Utc>) -> Result<Schedule> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let (account_id, prior, statement_day): (i64, DateTime<Utc>, u32) = tx
        .query_row(
            "SELECT s.account_id, s.next_occurrence, a.statement_day \
             FROM schedules s JOIN accounts a ON s.account_id = a.id WHERE s.id = ?1",
            [id],
            |row| Ok((row.get(0)?, stamp_column(row, 1)?, row.get(2)?)),
        )
        .optional()?
        .ok_or(CycleError::UnknownSchedule(id))?;

    let next = cycle::advance(prior, statement_day);
    tx.execute(
        "UPDATE schedules SET next_occurrence = ?1, last_success = ?2, last_error = NULL WHERE id = ?3",
        rusqlite::params![to_stamp(next), to_stamp(at), id],
    )?;
    tx.execute(
        "UPDATE accounts SET last_download_at = ?1 WHERE id = ?2",
        rusqlite::params![to_stamp(at), account_id],
    )?;
    log_run(&tx, id, prior, None, at)?;
    tx.commit()?;

    tracing::info!(schedule_id = id, next = %to_stamp(next), "download succeeded");
    get_schedule(conn, id)
}

/// A download failed: keep the target so the next trigger retries it.
pub fn record_failure(conn: &Connection, id: i64, message: &str, at: DateTime<Utc>) -> Result<Schedule> {
    let message = match message.trim() {
        "" => "download failed",
        trimmed => trimmed,
    };
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let target: DateTime<Utc> = tx
        .query_row(
            "SELECT next_occurrence FROM schedules WHERE id = ?1",
            [id],
            |row| stamp_column(row, 0),
        )
        .optional()?
        .ok_or(CycleError::UnknownSchedule(id))?;

    tx.execute(
        "UPDATE schedules SET last_error = ?1 WHERE id = ?2",
        rusqlite::params![message, id],
    )?;
    log_run(&tx, id, target, Some(message), at)?;
    tx.commit()?;

    tracing::warn!(schedule_id = id, error = message, "download failed");
    get_schedule(conn, id)
}

pub fn run_history(conn: &Connection, id: i64, limit: usize) -> Result<Vec<DownloadRun>> {
    get_schedule(conn, id)?;
    let mut stmt = conn.prepare(
        "SELECT target, success, error, reported_at FROM download_runs \
         WHERE schedule_id = ?1 ORDER BY reported_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![id, limit as i64], |row| {
            Ok(DownloadRun {
                target: stamp_column(row, 0)?,
                success: row.get(1)?,
                error: row.get(2)?,
                reported_at: stamp_column(row, 3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_schedule(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM schedules WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(CycleError::UnknownSchedule(id));
    }
    tracing::info!(schedule_id = id, "schedule deleted");
    Ok(())
}
