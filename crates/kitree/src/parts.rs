use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::Globals;
use crate::project::Project;

#[derive(Args, Debug)]
pub struct PartsArgs {
    #[command(subcommand)]
    command: PartsCommand,
}

#[derive(Subcommand, Debug)]
enum PartsCommand {
    /// List registered parts
    #[command(alias = "ls")]
    List,

    /// Register parts by IPN
    Add {
        #[arg(required = true, value_name = "IPN")]
        ipns: Vec<String>,
    },

    /// Unregister parts by IPN
    #[command(alias = "remove")]
    Rm {
        #[arg(required = true, value_name = "IPN")]
        ipns: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct MasterArgs {
    /// IPN of the master part
    pub ipn: String,
}

pub fn execute(args: PartsArgs, globals: &Globals) -> Result<()> {
    let mut project = Project::open(&globals.project_dir)?;

    match args.command {
        PartsCommand::List => {
            if project.config.parts.is_empty() {
                println!("No parts in the project's part list");
            }
            for ipn in &project.config.parts {
                println!("- {ipn}");
            }
            return Ok(());
        }
        PartsCommand::Add { ipns } => {
            for ipn in ipns {
                if project.config.add_part(&ipn) {
                    println!("{} {ipn}", "Added".green());
                } else {
                    println!("{} {ipn} is already registered", "Skipped".yellow());
                }
            }
        }
        PartsCommand::Rm { ipns } => {
            for ipn in ipns {
                if project.config.remove_part(&ipn) {
                    println!("{} {ipn}", "Removed".green());
                } else {
                    println!("{} {ipn} is not registered", "Skipped".yellow());
                }
            }
        }
    }

    project.save()
}

pub fn execute_master(args: MasterArgs, globals: &Globals) -> Result<()> {
    let mut project = Project::open(&globals.project_dir)?;
    project.config.master_part = Some(args.ipn.clone());
    project.save()?;
    println!("Master part set to {}", args.ipn.bold());
    Ok(())
}
