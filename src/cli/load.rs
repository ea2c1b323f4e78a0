use std::path::PathBuf;

use colored::Colorize;

use crate::db::{get_connection, DB_FILE};
use crate::error::{CycleError, Result};
use crate::settings::{load_settings, save_settings, shellexpand_path};
use crate::vault::{KeyFileVault, KEY_FILE};

/// Point the settings at another data directory holding a cardcycle database.
pub fn run(path: &str) -> Result<()> {
    let data_dir = PathBuf::from(shellexpand_path(path));
    let db_path = data_dir.join(DB_FILE);
    if !db_path.exists() {
        return Err(CycleError::Settings(format!(
            "No database found at {}\nRun `cardcycle init --data-dir {}` to create one.",
            db_path.display(),
            data_dir.display()
        )));
    }

    let conn = get_connection(&db_path)?;
    let tables: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name IN ('accounts', 'schedules')",
        [],
        |r| r.get(0),
    )?;
    if tables < 2 {
        return Err(CycleError::Settings(format!(
            "{} is not a cardcycle database",
            db_path.display()
        )));
    }

    let mut settings = load_settings();
    settings.data_dir = data_dir.to_string_lossy().to_string();
    save_settings(&settings)?;
    println!("Switched to {}", data_dir.display());

    match KeyFileVault::open(&data_dir.join(KEY_FILE)) {
        Ok(vault) => println!("Vault key {}", vault.fingerprint()),
        Err(_) => println!(
            "{} no vault key in {}; new accounts cannot be added until one is restored.",
            "Warning:".yellow(),
            data_dir.display()
        ),
    }
    Ok(())
}
