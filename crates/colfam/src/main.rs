//! Colfam command-line interface
//!
//! Works entirely offline on TOML model files:
//! - **plan**: diff a model against a live snapshot (or nothing) and print the DDL
//! - **ddl**: print the statements that create a model's table and indexes
//! - **compile**: print the statements a mutation compiles to, with bound values

use clap::{Parser, Subcommand};
use colfam_logging::{init_logging, LogConfig, RotationPolicy};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "colfam", version, about = "Schema planning and statement compilation for column-family tables")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Configuration file [default: $COLFAM_HOME/config.toml]
    #[arg(long, global = true, env = "COLFAM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the DDL that would bring a live table in line with a model
    Plan {
        /// Model file (TOML)
        model: PathBuf,

        /// Live table snapshot (TOML); the table is treated as absent without one
        #[arg(long)]
        live: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the statements that create a model's table
    Ddl {
        /// Model file (TOML)
        model: PathBuf,
    },

    /// Compile an insert, update or delete into statements
    Compile(cli::compile::CompileArgs),

    /// Show resolved configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "colfam",
        verbose: cli.verbose,
        log_to_file: true,
        rotation: RotationPolicy::default(),
    }) {
        eprintln!("warning: file logging disabled: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(cli::config::default_config_path);
    let config = cli::config::ColfamConfig::load(&config_path)?;

    match cli.command {
        Commands::Plan { model, live, json } => cli::plan::run(cli::plan::PlanArgs { model, live, json }, &config),
        Commands::Ddl { model } => cli::ddl::run(cli::ddl::DdlArgs { model }, &config),
        Commands::Compile(args) => cli::compile::run(args, &config),
        Commands::Config { json } => cli::config::run(cli::config::ConfigArgs { json }, &config_path, &config),
    }
}
