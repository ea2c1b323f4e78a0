mod accounts;
mod cli;
mod cycle;
mod db;
mod error;
mod fmt;
mod models;
mod reconciler;
mod runner;
mod schedules;
mod settings;
mod vault;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use accounts::NewAccount;
use cli::{AccountsCommands, Cli, Commands, SchedulesCommands};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings::load_settings().log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Load { path } => cli::load::run(&path),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                card,
                issuer,
                login_url,
                closing_day,
                statement_day,
                username,
                password,
            } => cli::accounts::add(
                NewAccount {
                    card_label: card,
                    issuer_label: issuer,
                    login_url,
                    closing_day,
                    statement_day,
                },
                &username,
                password,
            ),
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::Enable { id } => cli::accounts::set_active(id, true),
            AccountsCommands::Disable { id } => cli::accounts::set_active(id, false),
            AccountsCommands::Delete { id } => cli::accounts::delete(id),
        },
        Commands::Schedules { command } => match command {
            SchedulesCommands::Reconcile => cli::schedules::reconcile(),
            SchedulesCommands::List => cli::schedules::list(),
            SchedulesCommands::Enable { id } => cli::schedules::set_enabled(id, true),
            SchedulesCommands::Disable { id } => cli::schedules::set_enabled(id, false),
            SchedulesCommands::Toggle { id } => cli::schedules::toggle(id),
            SchedulesCommands::Report { id, success, error } => {
                cli::schedules::report(id, success, error)
            }
            SchedulesCommands::History { id, limit } => cli::schedules::history(id, limit),
            SchedulesCommands::Delete { id } => cli::schedules::delete(id),
        },
        Commands::Run => cli::run::run(),
        Commands::Status => cli::status::run(),
        Commands::Backup { output } => cli::backup::run(output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
