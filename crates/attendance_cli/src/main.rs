//! `attendance` command-line entry point.
//!
//! # Responsibility
//! - Parse flags, build the core config and open the store.
//! - Print JSON results on stdout and errors on stderr with exit code 1.

use anyhow::Context;
use attendance_core::{init_logging, open_db};
use clap::Parser;
use log::info;

mod cli;
mod commands;

fn main() {
    if let Err(error) = run() {
        eprintln!("attendance error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = cli.core_config()?;

    if let Some(log_dir) = &config.log_dir {
        init_logging(config.log_level, log_dir)?;
    }
    info!(
        "event=cli_start module=cli status=start command={}",
        command_name(&cli.command)
    );

    let conn = open_db(&config.db_path)
        .with_context(|| format!("cannot open store at `{}`", config.db_path.display()))?;
    commands::dispatch(cli.command, cli.actor, &conn, &config)
}

fn command_name(command: &cli::Commands) -> &'static str {
    match command {
        cli::Commands::Register(_) => "register",
        cli::Commands::Users => "users",
        cli::Commands::Profile => "profile",
        cli::Commands::Mark => "mark",
        cli::Commands::List(_) => "list",
        cli::Commands::Edit { .. } => "edit",
        cli::Commands::Delete { .. } => "delete",
        cli::Commands::Audit(_) => "audit",
        cli::Commands::Summary(cli::SummaryCommand::Subject { .. }) => "summary_subject",
        cli::Commands::Summary(cli::SummaryCommand::Team { .. }) => "summary_team",
    }
}
