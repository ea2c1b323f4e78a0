use chrono::Utc;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::accounts::{self, AccountFilter, NewAccount};
use crate::cycle::next_occurrence;
use crate::error::Result;
use crate::fmt::{date, date_opt, ordinal};
use crate::settings::key_path;
use crate::vault::{Credentials, KeyFileVault};

pub fn add(account: NewAccount, username: &str, password: Option<String>) -> Result<()> {
    account.validate()?;
    let conn = super::open_db()?;
    let vault = KeyFileVault::open(&key_path())?;

    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Bank password: ")?,
    };
    let credentials = Credentials::new(username, password);
    let created = accounts::create_account(&conn, &vault, &account, &credentials)?;
    drop(credentials);

    println!("Added account {}: {} ({})", created.id, created.card_label, created.issuer_label);
    println!("Credentials encrypted; they cannot be viewed after saving.");
    println!("Run `cardcycle schedules reconcile` to schedule its statement downloads.");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = super::open_db()?;
    let rows = accounts::list_accounts(&conn, AccountFilter::All)?;
    if rows.is_empty() {
        println!("No accounts added yet. Add one with `cardcycle accounts add`.");
        return Ok(());
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.set_header(vec!["ID", "Card", "Issuer", "Closes", "Statement", "Next Statement", "Status", "Last Download", "Added"]);
    for a in rows {
        table.add_row(vec![
            Cell::new(a.id),
            Cell::new(&a.card_label),
            Cell::new(&a.issuer_label),
            Cell::new(ordinal(a.closing_day)),
            Cell::new(ordinal(a.statement_day)),
            Cell::new(date(next_occurrence(a.statement_day, now))),
            Cell::new(if a.active { "Active" } else { "Inactive" }),
            Cell::new(date_opt(a.last_download_at)),
            Cell::new(date(a.created_at)),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

pub fn set_active(id: i64, active: bool) -> Result<()> {
    let conn = super::open_db()?;
    accounts::set_active(&conn, id, active)?;
    if active {
        println!("Account {id} is active.");
    } else {
        println!("Account {id} is inactive; its schedule will not fire.");
    }
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = super::open_db()?;
    let account = accounts::get_account(&conn, id)?;
    accounts::delete_account(&conn, id)?;
    println!("{} account {id}: {}", "Deleted".red(), account.card_label);
    Ok(())
}
