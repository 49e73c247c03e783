mod cli;
mod commands;
mod config;
mod events;

use clap::Parser;
use engine_logging::LogDestination;
use log::LevelFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(LogDestination::Both, level);

    let config = config::load(&cli.config)?;
    let job_dir = cli.job_dir.as_deref();
    match cli.command {
        Command::Run => commands::run(config, job_dir).await,
        Command::Diagnose { all } => commands::diagnose(config, job_dir, all).await,
        Command::Status => commands::status(&config, job_dir),
        Command::Check => commands::check(&config, job_dir),
    }
}
