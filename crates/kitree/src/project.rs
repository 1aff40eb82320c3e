use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use kitree_catalog::InvenTreeClient;
use kitree_sync::ProjectLayout;

use crate::config::{PROJECT_FILE, ProjectConfig, UserConfig};

/// A KiCad project directory with its `.kitree` file loaded.
pub struct Project {
    pub layout: ProjectLayout,
    pub config: ProjectConfig,
    config_path: PathBuf,
}

impl Project {
    pub fn open(dir: &Path) -> Result<Self> {
        let layout = ProjectLayout::discover(dir)?;
        let config_path = dir.join(PROJECT_FILE);
        if !config_path.exists() {
            anyhow::bail!(
                "{} is not a kitree project, run `kitree init` first",
                dir.display()
            );
        }
        let config = ProjectConfig::load(&config_path)?;
        Ok(Self {
            layout,
            config,
            config_path,
        })
    }

    pub fn save(&mut self) -> Result<()> {
        self.config.save(&self.config_path)
    }

    pub fn master_part(&self) -> Result<&str> {
        self.config
            .master_part
            .as_deref()
            .filter(|ipn| !ipn.is_empty())
            .context("No master part set, run `kitree master IPN` first")
    }

    /// Open a catalog session with the server this project is bound to.
    pub fn connect(&self, user: &UserConfig) -> Result<InvenTreeClient> {
        let server_id = self
            .config
            .inventree_server_id
            .as_deref()
            .context("Project has no InvenTree server configured")?;
        let credentials = user
            .server(server_id)
            .with_context(|| format!("InvenTree server {server_id} is not configured"))?;

        eprint!("Connecting to {} .. ", credentials.domain);
        match InvenTreeClient::connect(credentials) {
            Ok(client) => {
                eprintln!("{}", "Done!".green());
                Ok(client)
            }
            Err(e) => {
                eprintln!("{}", "Failed!".red());
                Err(e).with_context(|| format!("Could not connect to server {server_id}"))
            }
        }
    }
}
