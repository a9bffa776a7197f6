//! CLI wiring for the initbox binary.

use crate::boot::{self, BootOutcome};
use crate::config::types::Result;
use crate::env::EnvSnapshot;
use crate::exec::handoff::ExecLauncher;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "initbox",
    author,
    version,
    about = "Declarative container entrypoint: synthesizes the application config from \
             environment variables, waits for storage, drops privileges, and execs the app"
)]
pub struct Cli {
    /// Validate the environment and write the configuration file, then exit
    /// without dropping privileges, probing storage, or exec'ing the
    /// application.
    #[arg(long)]
    pub check: bool,
}

/// Parse arguments, capture the environment snapshot, and run the pipeline.
pub fn run() -> Result<BootOutcome> {
    env_logger::init();
    let cli = Cli::parse();
    let env = EnvSnapshot::capture();
    boot::run(&env, cli.check, &ExecLauncher)
}
