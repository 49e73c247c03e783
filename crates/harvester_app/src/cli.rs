use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(about = "Resumable harvesting of paginated listings", long_about = None)]
pub struct Cli {
    /// RON file with the start URL, fetch limits and job description
    #[arg(short, long, global = true, default_value = "harvester.ron")]
    pub config: PathBuf,

    /// Directory for progress files and records, overriding the config file
    #[arg(long, global = true)]
    pub job_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk every page from the resume point; Ctrl-C stops after the current step
    Run,
    /// Exercise the sub-operations selected in the config's diagnostics section
    Diagnose {
        /// Exercise every sub-operation regardless of the config
        #[arg(long)]
        all: bool,
    },
    /// Print the persisted progress of the job
    Status,
    /// Load and validate the config file
    Check,
}
