use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::accounts::{list_accounts, AccountFilter};
use crate::cycle;
use crate::error::{CycleError, Result};
use crate::models::{Account, Schedule};
use crate::schedules::{create_schedule, schedule_for_account};

#[derive(Debug)]
pub struct AccountFailure {
    pub account_id: i64,
    pub card_label: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub created: Vec<Schedule>,
    pub already_scheduled: usize,
    pub failures: Vec<AccountFailure>,
}

/// Make sure every active account has exactly one schedule.
///
/// Existing schedules are never touched, whatever their state. Each account
/// is handled on its own; a failure is recorded in the summary and the pass
/// moves on to the next account.
pub fn reconcile_all(conn: &Connection, now: DateTime<Utc>) -> Result<ReconcileSummary> {
    let accounts = list_accounts(conn, AccountFilter::Active)?;
    let mut summary = ReconcileSummary::default();

    for account in &accounts {
        match reconcile_account(conn, account, now) {
            Ok(Some(schedule)) => summary.created.push(schedule),
            Ok(None) => summary.already_scheduled += 1,
            Err(e) => {
                tracing::warn!(account_id = account.id, error = %e, "could not reconcile account");
                summary.failures.push(AccountFailure {
                    account_id: account.id,
                    card_label: account.card_label.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        created = summary.created.len(),
        existing = summary.already_scheduled,
        failed = summary.failures.len(),
        "reconciliation finished"
    );
    Ok(summary)
}

fn reconcile_account(conn: &Connection, account: &Account, now: DateTime<Utc>) -> Result<Option<Schedule>> {
    if schedule_for_account(conn, account.id)?.is_some() {
        return Ok(None);
    }
    let next = cycle::next_occurrence(account.statement_day, now);
    match create_schedule(conn, account.id, next) {
        Ok(schedule) => Ok(Some(schedule)),
        // Another reconciliation created it between our check and insert.
        Err(CycleError::Conflict { .. }) => {
            tracing::debug!(account_id = account.id, "schedule created concurrently");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::accounts::{create_account, set_active, NewAccount};
    use crate::db::{get_connection, init_db, DB_FILE};
    use crate::schedules::{list_schedules, record_failure, set_enabled};
    use crate::vault::{Credentials, KeyFileVault};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join(DB_FILE)).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_account(conn: &Connection, label: &str, statement_day: u32) -> i64 {
        let vault = KeyFileVault::from_key([3u8; 32]);
        let input = NewAccount {
            card_label: label.into(),
            issuer_label: "Test Bank".into(),
            login_url: "https://bank.example".into(),
            closing_day: 1,
            statement_day,
        };
        create_account(conn, &vault, &input, &Credentials::new("user", "pw")).unwrap().id
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn schedules_per_account(conn: &Connection, account_id: i64) -> i64 {
        conn.query_row(
            "SELECT count(*) FROM schedules WHERE account_id = ?1",
            [account_id],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_creates_schedule_from_statement_day() {
        let (_dir, conn) = test_db();
        let early = add_account(&conn, "Early", 15);
        let late = add_account(&conn, "Passed", 5);

        let summary = reconcile_all(&conn, now()).unwrap();
        assert_eq!(summary.created.len(), 2);
        assert_eq!(summary.already_scheduled, 0);
        assert!(summary.failures.is_empty());

        let by_account = |id: i64| summary.created.iter().find(|s| s.account_id == id).unwrap();
        assert_eq!(by_account(early).next_occurrence, at(2024, 1, 15));
        assert_eq!(by_account(late).next_occurrence, at(2024, 2, 5));
        assert!(summary.created.iter().all(|s| s.enabled && s.last_error.is_none() && s.last_success.is_none()));
    }

    #[test]
    fn test_only_missing_schedule_is_created() {
        let (_dir, conn) = test_db();
        let scheduled = add_account(&conn, "Scheduled", 15);
        let missing = add_account(&conn, "Missing", 20);
        create_schedule(&conn, scheduled, at(2024, 1, 15)).unwrap();

        let summary = reconcile_all(&conn, now()).unwrap();
        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.created[0].account_id, missing);
        assert_eq!(summary.already_scheduled, 1);
    }

    #[test]
    fn test_is_idempotent() {
        let (_dir, conn) = test_db();
        add_account(&conn, "A", 15);
        add_account(&conn, "B", 31);

        reconcile_all(&conn, now()).unwrap();
        let first = list_schedules(&conn).unwrap();

        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let summary = reconcile_all(&conn, later).unwrap();
        assert!(summary.created.is_empty());
        assert_eq!(summary.already_scheduled, 2);
        assert_eq!(list_schedules(&conn).unwrap(), first);
    }

    #[test]
    fn test_inactive_accounts_are_skipped() {
        let (_dir, conn) = test_db();
        let active = add_account(&conn, "Active", 15);
        let inactive = add_account(&conn, "Inactive", 15);
        set_active(&conn, inactive, false).unwrap();

        reconcile_all(&conn, now()).unwrap();
        assert_eq!(schedules_per_account(&conn, active), 1);
        assert_eq!(schedules_per_account(&conn, inactive), 0);
    }

    #[test]
    fn test_existing_state_is_preserved() {
        let (_dir, conn) = test_db();
        let acct = add_account(&conn, "Card", 15);
        let s = create_schedule(&conn, acct, at(2023, 12, 15)).unwrap();
        set_enabled(&conn, s.id, false).unwrap();
        record_failure(&conn, s.id, "bad password", at(2023, 12, 15)).unwrap();
        let before = list_schedules(&conn).unwrap();

        let summary = reconcile_all(&conn, now()).unwrap();
        assert!(summary.created.is_empty());
        assert_eq!(list_schedules(&conn).unwrap(), before);
    }

    #[test]
    fn test_one_bad_account_does_not_stop_the_pass() {
        let (_dir, conn) = test_db();
        let broken = add_account(&conn, "Broken", 15);
        let healthy = add_account(&conn, "Healthy", 15);
        // A corrupt stored timestamp makes the existence check fail for this account only.
        conn.execute(
            "INSERT INTO schedules (account_id, next_occurrence) VALUES (?1, 'garbage')",
            [broken],
        )
        .unwrap();

        let summary = reconcile_all(&conn, now()).unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].account_id, broken);
        assert_eq!(summary.failures[0].card_label, "Broken");
        assert_eq!(summary.created.len(), 1);
        assert_eq!(summary.created[0].account_id, healthy);
    }

    #[test]
    fn test_every_active_account_has_exactly_one_schedule() {
        let (_dir, conn) = test_db();
        let ids: Vec<i64> = (1..=6).map(|d| add_account(&conn, &format!("Card {d}"), d * 5)).collect();
        set_active(&conn, ids[2], false).unwrap();
        create_schedule(&conn, ids[4], at(2024, 1, 25)).unwrap();

        for _ in 0..3 {
            reconcile_all(&conn, now()).unwrap();
        }
        for (i, id) in ids.iter().enumerate() {
            let expected = if i == 2 { 0 } else { 1 };
            assert_eq!(schedules_per_account(&conn, *id), expected, "account {id}");
        }
    }

    #[test]
    fn test_concurrent_reconciliations_do_not_duplicate() {
        let (dir, conn) = test_db();
        let ids: Vec<i64> = (1..=12).map(|d| add_account(&conn, &format!("Card {d}"), d)).collect();
        let db_path = dir.path().join(DB_FILE);

        let connections: Vec<Connection> = (0..4).map(|_| get_connection(&db_path).unwrap()).collect();
        let handles: Vec<_> = connections
            .into_iter()
            .map(|c| std::thread::spawn(move || reconcile_all(&c, now()).unwrap()))
            .collect();
        let summaries: Vec<ReconcileSummary> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created: usize = summaries.iter().map(|s| s.created.len()).sum();
        assert_eq!(created, ids.len());
        assert!(summaries.iter().all(|s| s.failures.is_empty()));
        for id in &ids {
            assert_eq!(schedules_per_account(&conn, *id), 1);
        }
    }
}
