//! NovaControl CLI
//!
//! Runs the gesture/gaze pointer pipeline with a dry-run pointer backend.
//!
//! # Configuration
//!
//! 1. CLI arguments (highest priority)
//! 2. `--config PATH`, or `<config dir>/novacontrol/config.toml` when present
//! 3. Built-in defaults
//!
//! Log level: `--debug` > `--verbose` > `RUST_LOG` > `logging.level`.

mod keyboard;
mod logging;
mod orchestrator;
mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use novacontrol_core::event::{ArmMode, ControlMode};
use novacontrol_core::AppConfig;

use crate::orchestrator::{Orchestrator, RunOptions};

/// NovaControl - gesture and gaze pointer control
#[derive(Parser, Debug)]
#[command(name = "novacontrol")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to <config dir>/novacontrol/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline (default)
    Run(RunArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Replay perception events from a JSON-lines file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Do not read arm/emergency keys from the terminal
    #[arg(long)]
    no_keyboard: bool,

    /// Start armed regardless of safety.default_mode
    #[arg(long)]
    armed: bool,

    /// Initial control mode (eye or hand)
    #[arg(long, value_name = "MODE", value_parser = parse_control_mode)]
    control_mode: Option<ControlMode>,
}

fn parse_control_mode(value: &str) -> Result<ControlMode, String> {
    ControlMode::parse(value).ok_or_else(|| format!("unknown control mode '{value}'"))
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if self.armed {
            config.safety.default_mode = ArmMode::Armed;
        }
        if let Some(mode) = self.control_mode {
            config.intent.initial_control_mode = mode;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("Config error")?;

    match args.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Config => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{rendered}");
            Ok(())
        }
        Command::Run(run) => {
            run.apply(&mut config);
            logging::init(&config.logging, args.debug, args.verbose)?;

            info!(version = env!("CARGO_PKG_VERSION"), "NovaControl starting");
            if config.logging.file {
                info!(path = %config.logging.log_file_path().display(), "File logging enabled");
            }

            let options = RunOptions {
                replay: run.replay,
                keyboard: !run.no_keyboard,
            };
            Orchestrator::new(config, options).run().await
        }
    }
}
