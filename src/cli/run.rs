use std::time::Duration;

use chrono::Utc;
use colored::Colorize;

use crate::error::{CycleError, Result};
use crate::runner::{run_due, CommandDownloader};
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let program = settings.downloader.clone().ok_or_else(|| {
        CycleError::Settings(
            "No downloader configured. Set \"downloader\" in ~/.config/cardcycle/settings.json.".into(),
        )
    })?;
    let conn = super::open_db()?;
    let downloader = CommandDownloader::new(program, settings.downloader_args)
        .with_timeout(Duration::from_secs(settings.downloader_timeout_secs));

    let summary = run_due(&conn, &downloader, Utc::now())?;
    let attempted = summary.succeeded.len() + summary.failed.len() + summary.errors.len();
    if attempted == 0 {
        println!("Nothing due.");
        return Ok(());
    }

    println!(
        "{} downloaded, {} failed",
        summary.succeeded.len(),
        summary.failed.len() + summary.errors.len()
    );
    for f in summary.failed.iter().chain(&summary.errors) {
        println!("{} {} (schedule {}): {}", "Failed".red(), f.card_label, f.schedule_id, f.message);
    }
    Ok(())
}
