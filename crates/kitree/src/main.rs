use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod build;
mod config;
mod export;
mod init;
mod parts;
mod project;

#[derive(Parser)]
#[command(name = "kitree")]
#[command(about = "Keep KiCad projects in sync with an InvenTree parts catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// KiCad project directory
    #[arg(short = 'C', long = "project", global = true, value_name = "DIR", default_value = ".")]
    project: PathBuf,

    /// User configuration file (default: ~/.kitree/config.toml)
    #[arg(long = "config", global = true, value_name = "PATH", hide = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the kitree project file in a KiCad project
    Init(init::InitArgs),

    /// Manage the parts registered for this project
    #[command(alias = "p")]
    Parts(parts::PartsArgs),

    /// Set the master part whose BOM mirrors the schematic
    Master(parts::MasterArgs),

    /// Build project libraries or the master part's BOM
    #[command(alias = "b")]
    Build(build::BuildArgs),

    /// Export assembly files
    Export(export::ExportArgs),
}

/// Options shared by every subcommand.
pub struct Globals {
    pub project_dir: PathBuf,
    pub config_path: PathBuf,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {}", cause.to_string().red());
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug, RUST_LOG overrides
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    let globals = Globals {
        project_dir: cli.project,
        config_path: match cli.config {
            Some(path) => path,
            None => config::UserConfig::default_path()?,
        },
    };

    match cli.command {
        Commands::Init(args) => init::execute(args, &globals),
        Commands::Parts(args) => parts::execute(args, &globals),
        Commands::Master(args) => parts::execute_master(args, &globals),
        Commands::Build(args) => build::execute(args, &globals),
        Commands::Export(args) => export::execute(args, &globals),
    }
}

/// `err` followed by its sources, separated by `: `.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
