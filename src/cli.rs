// src/cli.rs

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::Level;

use crate::{
    constants::STATE_DIR_ENV,
    orchestrator::{ApplyOptions, Command},
};

#[derive(Parser, Debug)]
#[command(name = "discovery-curb", version)]
#[command(
    about = "Suppress Gaming Services game discovery, and undo it",
    long_about = None
)]
pub struct Cli {
    /// Restore the state saved by the last apply
    #[arg(long)]
    pub undo: bool,

    /// Also delete cached discovery files (cannot be undone)
    #[arg(long)]
    pub clear_cache: bool,

    /// Also set companion and telemetry services to Manual and stop them
    #[arg(long)]
    pub deep_clean: bool,

    /// Snapshot base directory (defaults to %ProgramData%\DiscoveryCurb\snapshots)
    #[arg(long, env = STATE_DIR_ENV)]
    pub state_dir: Option<PathBuf>,

    /// JSON file overriding the built-in service, flag, task and cache lists
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn command(&self) -> Command {
        if self.undo {
            Command::Undo
        } else {
            Command::Apply(ApplyOptions {
                clear_cache: self.clear_cache,
                deep_clean: self.deep_clean,
            })
        }
    }

    /// Apply-only flags given together with `--undo`.
    pub fn ignored_flags(&self) -> Vec<&'static str> {
        if !self.undo {
            return Vec::new();
        }
        let mut ignored = Vec::new();
        if self.clear_cache {
            ignored.push("--clear-cache");
        }
        if self.deep_clean {
            ignored.push("--deep-clean");
        }
        ignored
    }

    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
