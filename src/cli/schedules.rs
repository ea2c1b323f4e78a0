use chrono::Utc;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::{date, date_opt, relative};
use crate::models::ScheduleState;
use crate::reconciler::reconcile_all;
use crate::schedules;

pub fn reconcile() -> Result<()> {
    let conn = super::open_db()?;
    let summary = reconcile_all(&conn, Utc::now())?;

    for s in &summary.created {
        println!("Scheduled account {} for {}", s.account_id, date(s.next_occurrence));
    }
    println!(
        "{} created, {} already scheduled",
        summary.created.len(),
        summary.already_scheduled
    );
    for f in &summary.failures {
        println!("{} {} (account {}): {}", "Failed".red(), f.card_label, f.account_id, f.message);
    }
    Ok(())
}

fn state_cell(state: ScheduleState, account_active: bool) -> String {
    if !account_active {
        return "paused (account inactive)".dimmed().to_string();
    }
    let label = state.to_string();
    match state {
        ScheduleState::Pending => label.green().to_string(),
        ScheduleState::Failed => label.red().to_string(),
        ScheduleState::Disabled => label.dimmed().to_string(),
    }
}

pub fn list() -> Result<()> {
    let conn = super::open_db()?;
    let views = schedules::list_schedule_views(&conn)?;
    if views.is_empty() {
        println!("No download schedules created yet.");
        println!("Run `cardcycle schedules reconcile` to schedule downloads for all active accounts.");
        return Ok(());
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.set_header(vec!["ID", "Card", "Issuer", "Next Download", "When", "State", "Last Success", "Last Error"]);
    for v in views {
        let s = &v.schedule;
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(&v.card_label),
            Cell::new(&v.issuer_label),
            Cell::new(date(s.next_occurrence)),
            Cell::new(relative(s.next_occurrence, now)),
            Cell::new(state_cell(s.state(), v.account_active)),
            Cell::new(date_opt(s.last_success)),
            Cell::new(s.last_error.as_deref().unwrap_or("")),
        ]);
    }
    println!("Schedules\n{table}");
    Ok(())
}

pub fn set_enabled(id: i64, enabled: bool) -> Result<()> {
    let conn = super::open_db()?;
    schedules::set_enabled(&conn, id, enabled)?;
    println!("Schedule {id} {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub fn toggle(id: i64) -> Result<()> {
    let conn = super::open_db()?;
    let enabled = schedules::toggle(&conn, id)?;
    println!("Schedule {id} {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub fn report(id: i64, success: bool, error: Option<String>) -> Result<()> {
    let conn = super::open_db()?;
    let now = Utc::now();
    let updated = match error {
        Some(message) if !success => schedules::record_failure(&conn, id, &message, now)?,
        _ => schedules::record_success(&conn, id, now)?,
    };
    match updated.state() {
        ScheduleState::Failed => println!(
            "Schedule {id} failed; will retry on {}",
            date(updated.next_occurrence)
        ),
        _ => println!(
            "Schedule {id} succeeded; next download {}",
            date(updated.next_occurrence)
        ),
    }
    Ok(())
}

pub fn history(id: i64, limit: usize) -> Result<()> {
    let conn = super::open_db()?;
    let runs = schedules::run_history(&conn, id, limit)?;
    if runs.is_empty() {
        println!("No download attempts recorded for schedule {id}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Reported", "Target", "Result", "Error"]);
    for r in runs {
        table.add_row(vec![
            Cell::new(r.reported_at.format("%Y-%m-%d %H:%M")),
            Cell::new(date(r.target)),
            Cell::new(if r.success { "ok".green().to_string() } else { "failed".red().to_string() }),
            Cell::new(r.error.unwrap_or_default()),
        ]);
    }
    println!("History for schedule {id}\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = super::open_db()?;
    schedules::delete_schedule(&conn, id)?;
    println!("Deleted schedule {id}");
    Ok(())
}
