use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use kitree_sync::ProjectLayout;

use crate::Globals;
use crate::config::{PROJECT_FILE, ProjectConfig, UserConfig};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Id of the InvenTree server from the user configuration
    #[arg(long, value_name = "ID")]
    pub server: Option<String>,

    /// IPN of the master part
    #[arg(long, value_name = "IPN")]
    pub master: Option<String>,

    /// Replace an existing project file
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: InitArgs, globals: &Globals) -> Result<()> {
    let dir = globals
        .project_dir
        .canonicalize()
        .with_context(|| format!("No such directory {}", globals.project_dir.display()))?;
    let layout = ProjectLayout::discover(&dir)?;

    let path = dir.join(PROJECT_FILE);
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, use --force to replace it",
            path.display()
        );
    }

    let mut user = UserConfig::load_from(&globals.config_path)?;
    if let Some(server) = &args.server {
        if user.server(server).is_none() {
            anyhow::bail!(
                "InvenTree server {server} is not configured in {}",
                globals.config_path.display()
            );
        }
    }

    let mut config = ProjectConfig::new(args.server, args.master);
    config.save(&path)?;

    user.remember_project(&layout.name, &dir);
    user.save_to(&globals.config_path)?;

    println!(
        "{} kitree project {} in {}",
        "Created".green(),
        layout.name.bold(),
        dir.display()
    );
    Ok(())
}
