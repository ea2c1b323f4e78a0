pub mod accounts;
pub mod backup;
pub mod init;
pub mod load;
pub mod run;
pub mod schedules;
pub mod status;

use clap::{Parser, Subcommand};

use crate::db::{get_connection, init_db};
use crate::error::{CycleError, Result};
use crate::settings::db_path;

/// Open the configured database, creating any missing tables.
pub(crate) fn open_db() -> Result<rusqlite::Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(CycleError::Settings(format!(
            "No database found at {}\nRun `cardcycle init` to set up.",
            path.display()
        )));
    }
    let conn = get_connection(&path)?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(name = "cardcycle", about = "Schedule recurring credit card statement downloads.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up cardcycle: choose a data directory, create the database and vault key.
    Init {
        /// Path for cardcycle data (default: ~/Documents/cardcycle)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Switch to an existing cardcycle data directory.
    Load {
        /// Path to data directory containing cardcycle.db
        path: String,
    },
    /// Manage card accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage statement download schedules.
    Schedules {
        #[command(subcommand)]
        command: SchedulesCommands,
    },
    /// Run the downloader for every schedule that is due.
    Run,
    /// Show current database and summary statistics.
    Status,
    /// Back up the database.
    Backup {
        /// Output path (default: <data_dir>/backups/cardcycle-YYYYMMDD-HHMMSS.db)
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a card account. Credentials are encrypted before they are stored.
    Add {
        /// Card name, e.g. 'Sapphire Preferred'
        card: String,
        /// Issuing bank, e.g. 'Chase'
        #[arg(long)]
        issuer: String,
        /// Bank login page
        #[arg(long = "login-url")]
        login_url: String,
        /// Statement closing day of month (1-31)
        #[arg(long = "closing-day")]
        closing_day: u32,
        /// Statement issue day of month (1-31)
        #[arg(long = "statement-day")]
        statement_day: u32,
        /// Bank login username or email
        #[arg(long)]
        username: String,
        /// Bank login password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// List all accounts.
    List,
    /// Mark an account active so reconciliation schedules it.
    Enable { id: i64 },
    /// Mark an account inactive; its schedule stops firing.
    Disable { id: i64 },
    /// Delete an account, its schedule and its download history.
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum SchedulesCommands {
    /// Create a schedule for every active account that lacks one.
    Reconcile,
    /// List schedules, soonest first.
    List,
    /// Enable a schedule.
    Enable { id: i64 },
    /// Disable a schedule without losing its history.
    Disable { id: i64 },
    /// Flip a schedule between enabled and disabled.
    Toggle { id: i64 },
    /// Record a download outcome reported by the downloader.
    Report {
        id: i64,
        /// The statement was fetched
        #[arg(long, conflicts_with = "error", required_unless_present = "error")]
        success: bool,
        /// The attempt failed with this message
        #[arg(long)]
        error: Option<String>,
    },
    /// Show recent download attempts for a schedule.
    History {
        id: i64,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Delete a schedule. The next reconcile recreates it if the account is active.
    Delete { id: i64 },
}
