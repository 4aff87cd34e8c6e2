//! Vivid CLI — command-line host for the creative-coding runtime.
//!
//! `vivid <project-dir>` runs a chain project live (hot-reload, audio,
//! editor bridge); `vivid render` produces frames and audio offline.
//! Windowed presentation is owned by GUI hosts — this binary drives the
//! engine against the headless backend.

mod commands;
mod host;
mod project;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Clean exit.
pub const EXIT_OK: i32 = 0;
/// Compilation or initialization failure.
pub const EXIT_INIT_FAILURE: i32 = 1;
/// An operator panicked during `process`.
pub const EXIT_OPERATOR_PANIC: i32 = 2;

#[derive(Parser)]
#[command(name = "vivid")]
#[command(author, version, about = "Vivid creative-coding runtime", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Chain project directory (shorthand for `vivid run <dir>`).
    project: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a chain project live with hot-reload
    Run(commands::run::RunArgs),

    /// Render a chain project offline to frames and WAV
    Render(commands::render::RenderArgs),

    /// List the registered operator types
    Operators(commands::operators::OperatorsArgs),
}

fn main() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let result = match (cli.command, cli.project) {
        (Some(Commands::Run(args)), _) => commands::run::run(args),
        (Some(Commands::Render(args)), _) => commands::render::run(args),
        (Some(Commands::Operators(args)), _) => commands::operators::run(args),
        (None, Some(project)) => commands::run::run(commands::run::RunArgs {
            project,
            no_audio: false,
            fps: 60.0,
            no_bridge: false,
        }),
        (None, None) => {
            eprintln!("usage: vivid <project-dir> | vivid run ... | vivid render ...");
            std::process::exit(EXIT_INIT_FAILURE);
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(EXIT_INIT_FAILURE);
        }
    }
}
