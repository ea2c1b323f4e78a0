use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::Connection;

use crate::error::{CycleError, Result};
use crate::fmt::format_bytes;
use crate::settings::get_data_dir;

fn default_destination(data_dir: &Path) -> Result<PathBuf> {
    let dir = data_dir.join("backups");
    std::fs::create_dir_all(&dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("cardcycle-{stamp}.db")))
}

/// Row counts read back from the copy, so a truncated backup is noticed here.
fn copied_counts(dest: &Connection) -> rusqlite::Result<(i64, i64)> {
    let accounts = dest.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0))?;
    let schedules = dest.query_row("SELECT count(*) FROM schedules", [], |r| r.get(0))?;
    Ok((accounts, schedules))
}

pub fn run(output: Option<String>) -> Result<()> {
    let conn = super::open_db()?;
    let dest_path = match output {
        Some(p) => PathBuf::from(p),
        None => default_destination(&get_data_dir())?,
    };
    if dest_path.exists() {
        return Err(CycleError::Settings(format!(
            "{} already exists; choose another --output",
            dest_path.display()
        )));
    }

    let mut dest = Connection::open(&dest_path)?;
    Backup::new(&conn, &mut dest)?.run_to_completion(100, Duration::from_millis(10), None)?;
    let (accounts, schedules) = copied_counts(&dest)?;

    let size = std::fs::metadata(&dest_path)?.len();
    tracing::info!(path = %dest_path.display(), size, accounts, schedules, "backup written");
    println!("Backup saved to {} ({})", dest_path.display(), format_bytes(size));
    println!("Copied {accounts} accounts and {schedules} schedules.");
    println!("The vault key is not part of the backup; copy it separately if you need it.");
    Ok(())
}
