use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::{opt_stamp_column, stamp_column};
use crate::error::{CycleError, Result};
use crate::models::Account;
use crate::vault::{CredentialVault, Credentials, EncryptedPayload};

const ACCOUNT_COLUMNS: &str = "id, card_label, issuer_label, login_url, closing_day, statement_day, \
     is_active, encrypted_credentials, last_download_at, created_at";

/// User input for a new account, minus the credentials.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub card_label: String,
    pub issuer_label: String,
    pub login_url: String,
    pub closing_day: u32,
    pub statement_day: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountFilter {
    All,
    Active,
}

pub fn validate_day(field: &str, day: u32) -> Result<()> {
    if (1..=31).contains(&day) {
        Ok(())
    } else {
        Err(CycleError::Validation(format!("{field} must be between 1 and 31, got {day}")))
    }
}

fn validate_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| CycleError::Validation(format!("login URL must start with http:// or https://: {url}")))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(CycleError::Validation(format!("login URL has no host: {url}")));
    }
    Ok(())
}

impl NewAccount {
    pub fn validate(&self) -> Result<()> {
        if self.card_label.trim().is_empty() {
            return Err(CycleError::Validation("card label is required".into()));
        }
        if self.issuer_label.trim().is_empty() {
            return Err(CycleError::Validation("issuer label is required".into()));
        }
        validate_url(self.login_url.trim())?;
        validate_day("closing day", self.closing_day)?;
        validate_day("statement day", self.statement_day)?;
        Ok(())
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let sealed: Vec<u8> = row.get(7)?;
    Ok(Account {
        id: row.get(0)?,
        card_label: row.get(1)?,
        issuer_label: row.get(2)?,
        login_url: row.get(3)?,
        closing_day: row.get(4)?,
        statement_day: row.get(5)?,
        active: row.get(6)?,
        encrypted_credentials: EncryptedPayload::from_stored(sealed),
        last_download_at: opt_stamp_column(row, 8)?,
        created_at: stamp_column(row, 9)?,
    })
}

/// Validate, encrypt, then insert. Any failure leaves the store untouched.
pub fn create_account(
    conn: &Connection,
    vault: &dyn CredentialVault,
    account: &NewAccount,
    credentials: &Credentials,
) -> Result<Account> {
    account.validate()?;
    if !credentials.is_complete() {
        return Err(CycleError::Validation("username and password are required".into()));
    }

    let sealed = vault.encrypt(credentials)?;
    if sealed.is_empty() {
        return Err(CycleError::Encryption("vault returned an empty payload".into()));
    }

    conn.execute(
        "INSERT INTO accounts (card_label, issuer_label, login_url, closing_day, statement_day, encrypted_credentials) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            account.card_label.trim(),
            account.issuer_label.trim(),
            account.login_url.trim(),
            account.closing_day,
            account.statement_day,
            sealed.as_bytes(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(account_id = id, card = %account.card_label.trim(), "account created");
    get_account(conn, id)
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id],
        account_from_row,
    )
    .optional()?
    .ok_or(CycleError::UnknownAccount(id))
}

pub fn list_accounts(conn: &Connection, filter: AccountFilter) -> Result<Vec<Account>> {
    let clause = match filter {
        AccountFilter::All => "",
        AccountFilter::Active => "WHERE is_active = 1",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts {clause} ORDER BY created_at, id"
    ))?;
    let rows = stmt
        .query_map([], account_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET is_active = ?1 WHERE id = ?2",
        rusqlite::params![active, id],
    )?;
    if changed == 0 {
        return Err(CycleError::UnknownAccount(id));
    }
    tracing::info!(account_id = id, active, "account toggled");
    Ok(())
}

/// Delete an account along with its schedule and run history.
pub fn delete_account(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(CycleError::UnknownAccount(id));
    }
    tracing::info!(account_id = id, "account deleted");
    Ok(())
}
