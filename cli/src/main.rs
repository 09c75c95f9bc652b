//! # pipeworks-cli
//!
//! Command-line driver for the Pipeworks pipeline compiler.
//!
//! ## Installation
//!
//! ```bash
//! cargo install pipeworks-cli
//! ```
//!
//! ## Commands
//!
//! - `pw init` - Write a starter pipeworks.toml
//! - `pw compile` - Resolve the pipeline, write artifacts and plan.json
//! - `pw order` - Print the expanded execution order
//! - `pw check` - Resolve only; exit non-zero when a step fails
//!
//! See `pw --help` for the full command reference.

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::process;

mod commands;
mod config;
mod loader;
mod logging;
mod plan;
mod ui;

use config::InputOverrides;

#[derive(Parser)]
#[command(name = "pw")]
#[command(about = "Pipeworks - resolve pipeline steps against their service schemas", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to pipeworks.toml configuration file
    #[arg(short, long, global = true, default_value = "pipeworks.toml")]
    config: String,

    /// Output as JSON (machine-readable format)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "PIPEWORKS_JSON_LOGS")]
    json_logs: bool,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

#[derive(Args, Debug, Clone, Default)]
struct InputArgs {
    /// Pipeline description (TOML), overrides [inputs] pipeline
    #[arg(short, long)]
    pipeline: Option<PathBuf>,

    /// Binary FileDescriptorSet, overrides [inputs] descriptors
    #[arg(short, long)]
    descriptors: Option<PathBuf>,

    /// Module override properties, overrides [inputs] modules
    #[arg(short, long)]
    modules: Option<PathBuf>,
}

impl InputArgs {
    fn into_overrides(self, output: Option<PathBuf>) -> InputOverrides {
        InputOverrides {
            pipeline: self.pipeline,
            descriptors: self.descriptors,
            modules: self.modules,
            output,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Pipeworks project
    Init {
        /// Project name (defaults to the current directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Resolve the pipeline and write artifacts plus plan.json
    Compile {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output directory (overrides [output] dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the expanded execution order
    Order {
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Resolve without writing files; exits with status 1 if any step fails
    Check {
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Validate the configuration file
    Validate,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "pw", &mut io::stdout());
        return;
    }

    if let Err(e) = logging::init(logging::LoggingConfig {
        verbose: cli.verbose,
        json_logs: cli.json_logs,
    }) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

/// `Ok(false)` means the command ran but reported failure.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(true);
    };

    match command {
        Commands::Init { name } => commands::config::init(&cli.config, name).map(|_| true),
        Commands::Compile { inputs, output } => {
            commands::compile::compile(&cli.config, inputs.into_overrides(output), cli.json)
                .map(|_| true)
        }
        Commands::Order { inputs } => {
            commands::order::order(&cli.config, inputs.into_overrides(None), cli.json).map(|_| true)
        }
        Commands::Check { inputs } => {
            commands::check::check(&cli.config, inputs.into_overrides(None), cli.json)
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Validate => commands::config::validate(&cli.config).map(|_| true),
        },
    }
}
