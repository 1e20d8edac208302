// src/main.rs

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use discovery_curb::{
    accessors::{self, Accessors},
    cli::Cli,
    orchestrator::Orchestrator,
    profile::{default_state_dir, Profile},
    report::Report,
    snapshot::SnapshotStore,
};
use tracing::{debug, error, warn};

fn run(cli: &Cli) -> Result<Report> {
    for flag in cli.ignored_flags() {
        warn!("{} has no effect with --undo and is ignored.", flag);
    }

    let system = accessors::native()?;
    let profile = match &cli.profile {
        Some(path) => Profile::load(path)?,
        None => Profile::builtin(),
    };
    let state_dir = cli.state_dir.clone().unwrap_or_else(default_state_dir);
    debug!("Using snapshot directory '{}'.", state_dir.display());

    let orchestrator = Orchestrator::new(
        SnapshotStore::new(state_dir),
        Accessors::from_system(&system),
        &system,
        profile,
    );
    Ok(orchestrator.run(cli.command())?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(report) => {
            if report.has_failures() {
                warn!("Some resources could not be changed; see the report for details.");
            }
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
