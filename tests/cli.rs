use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cardcycle(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cardcycle").unwrap();
    cmd.env("HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data = home.path().join("data");
    cardcycle(&home)
        .args(["init", "--data-dir", data.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized cardcycle"));
    home
}

fn add_card(home: &TempDir, card: &str, statement_day: &str) {
    cardcycle(home)
        .args([
            "accounts",
            "add",
            card,
            "--issuer",
            "Chase",
            "--login-url",
            "https://secure.chase.example/login",
            "--closing-day",
            "3",
            "--statement-day",
            statement_day,
            "--username",
            "alice",
            "--password",
            "hunter2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{card} (Chase)")));
}

#[test]
fn commands_need_init() {
    let home = tempfile::tempdir().unwrap();
    cardcycle(&home)
        .args(["accounts", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cardcycle init"));
}

#[test]
fn init_creates_database_and_key() {
    let home = initialized();
    let data = home.path().join("data");
    assert!(data.join("cardcycle.db").exists());
    assert!(data.join("vault.key").exists());

    cardcycle(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Accounts:    0 (0 active)"));
}

#[test]
fn added_account_is_listed_without_credentials() {
    let home = initialized();
    add_card(&home, "Sapphire", "15");

    cardcycle(&home)
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sapphire"))
        .stdout(predicate::str::contains("15th"))
        .stdout(predicate::str::contains("Added"))
        .stdout(predicate::str::contains("hunter2").not())
        .stdout(predicate::str::contains("alice").not());
}

#[test]
fn invalid_statement_day_is_rejected() {
    let home = initialized();
    cardcycle(&home)
        .args([
            "accounts",
            "add",
            "Broken",
            "--issuer",
            "Chase",
            "--login-url",
            "https://chase.example",
            "--closing-day",
            "3",
            "--statement-day",
            "32",
            "--username",
            "alice",
            "--password",
            "pw",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("statement day must be between 1 and 31"));

    cardcycle(&home)
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts added yet"));
}

#[test]
fn reconcile_is_idempotent() {
    let home = initialized();
    add_card(&home, "Sapphire", "15");
    add_card(&home, "Freedom", "28");

    cardcycle(&home)
        .args(["schedules", "reconcile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 created, 0 already scheduled"));
    cardcycle(&home)
        .args(["schedules", "reconcile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 created, 2 already scheduled"));

    cardcycle(&home)
        .args(["schedules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sapphire"))
        .stdout(predicate::str::contains("Freedom"))
        .stdout(predicate::str::contains("pending"));
}

#[test]
fn reported_failure_keeps_target_and_shows_error() {
    let home = initialized();
    add_card(&home, "Sapphire", "15");
    cardcycle(&home).args(["schedules", "reconcile"]).assert().success();

    cardcycle(&home)
        .args(["schedules", "report", "1", "--error", "login rejected"])
        .assert()
        .success()
        .stdout(predicate::str::contains("will retry"));
    cardcycle(&home)
        .args(["schedules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login rejected"));
    cardcycle(&home)
        .args(["schedules", "history", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login rejected"));
}

#[test]
fn toggle_flips_schedule() {
    let home = initialized();
    add_card(&home, "Sapphire", "15");
    cardcycle(&home).args(["schedules", "reconcile"]).assert().success();

    cardcycle(&home)
        .args(["schedules", "toggle", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule 1 disabled"));
    cardcycle(&home)
        .args(["schedules", "toggle", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule 1 enabled"));
    cardcycle(&home)
        .args(["schedules", "toggle", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("99"));
}

#[test]
fn run_without_downloader_fails() {
    let home = initialized();
    cardcycle(&home)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No downloader configured"));
}

#[test]
fn backup_writes_copy_of_database() {
    let home = initialized();
    add_card(&home, "Sapphire", "15");
    let out = home.path().join("copy.db");

    cardcycle(&home)
        .args(["backup", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup saved to"));
    assert!(out.exists());
}

#[test]
fn backup_refuses_to_overwrite() {
    let home = initialized();
    let out = home.path().join("copy.db");
    std::fs::write(&out, b"keep me").unwrap();

    cardcycle(&home)
        .args(["backup", "--output", out.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read(&out).unwrap(), b"keep me");
}

#[test]
fn load_switches_and_flags_missing_key() {
    let home = initialized();
    let other = home.path().join("other");
    cardcycle(&home)
        .args(["init", "--data-dir", other.to_str().unwrap()])
        .assert()
        .success();
    std::fs::remove_file(other.join("vault.key")).unwrap();

    cardcycle(&home)
        .args(["load", home.path().join("data").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vault key"));
    cardcycle(&home)
        .args(["load", other.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("no vault key"));
}

#[test]
fn load_rejects_foreign_database() {
    let home = tempfile::tempdir().unwrap();
    let foreign = home.path().join("foreign");
    std::fs::create_dir_all(&foreign).unwrap();
    rusqlite::Connection::open(foreign.join("cardcycle.db"))
        .unwrap()
        .execute_batch("CREATE TABLE notes (body TEXT);")
        .unwrap();

    cardcycle(&home)
        .args(["load", foreign.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a cardcycle database"));
}

#[test]
fn status_due_count_skips_inactive_accounts() {
    let home = initialized();
    add_card(&home, "Sapphire", "15");
    add_card(&home, "Freedom", "15");
    cardcycle(&home).args(["schedules", "reconcile"]).assert().success();

    let db = home.path().join("data").join("cardcycle.db");
    rusqlite::Connection::open(&db)
        .unwrap()
        .execute_batch("UPDATE schedules SET next_occurrence = '2020-01-15T00:00:00Z';")
        .unwrap();
    cardcycle(&home).args(["accounts", "disable", "2"]).assert().success();

    cardcycle(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("(2 enabled, 1 due)"));
}
