use chrono::Utc;
use colored::Colorize;

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::models::ScheduleState;
use crate::schedules::{due_schedules, list_schedules};
use crate::settings::load_settings;
use crate::vault::{KeyFileVault, KEY_FILE};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join(crate::db::DB_FILE);
    let key_path = data_dir.join(KEY_FILE);

    println!("Data dir:    {}", data_dir.display());
    println!("Database:    {}", db_path.display());
    println!(
        "Downloader:  {}",
        settings.downloader.as_deref().unwrap_or("(not set)")
    );
    match KeyFileVault::open(&key_path) {
        Ok(vault) => println!("Vault key:   {} ({})", key_path.display(), vault.fingerprint()),
        Err(_) => println!("Vault key:   {}", "missing".red()),
    }

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:     {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };

        let accounts = count("SELECT count(*) FROM accounts")?;
        let active = count("SELECT count(*) FROM accounts WHERE is_active = 1")?;
        let schedules = list_schedules(&conn)?;
        let enabled = schedules.iter().filter(|s| s.enabled).count();
        let failing = schedules
            .iter()
            .filter(|s| s.state() == ScheduleState::Failed)
            .count();
        // Only what `cardcycle run` would fire right now.
        let due = due_schedules(&conn, Utc::now())?.len();

        println!();
        println!("Accounts:    {accounts} ({active} active)");
        println!("Schedules:   {} ({enabled} enabled, {due} due)", schedules.len());
        if failing > 0 {
            println!("Failing:     {}", failing.to_string().red());
        } else {
            println!("Failing:     0");
        }
    } else {
        println!();
        println!("Database not found. Run `cardcycle init` to set up.");
    }

    Ok(())
}
