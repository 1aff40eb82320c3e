//! User configuration (`~/.kitree/config.toml`) and project files (`.kitree`).

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use chrono::{Local, NaiveDate};
use kitree_catalog::Credentials;
use kitree_sync::FieldNames;
use serde::{Deserialize, Serialize};

pub const PROJECT_FILE: &str = ".kitree";

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(contents))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Name of the project used most recently.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_project: Option<String>,
    pub servers: Vec<Credentials>,
    pub fields: FieldNames,
    /// Known projects by name.
    pub projects: BTreeMap<String, PathBuf>,
}

impl UserConfig {
    pub fn default_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home_dir.join(".kitree").join("config.toml"))
    }

    /// Read the configuration at `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No user configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .with_context(|| format!("Invalid user configuration {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string(self)?;
        write_atomic(path, contents.as_bytes())
    }

    pub fn server(&self, id: &str) -> Option<&Credentials> {
        self.servers.iter().find(|server| server.id == id)
    }

    pub fn remember_project(&mut self, name: &str, dir: &Path) {
        self.projects.insert(name.to_string(), dir.to_path_buf());
        self.last_project = Some(name.to_string());
    }
}

/// Contents of a project's `.kitree` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub created_date: NaiveDate,
    pub last_edited_date: NaiveDate,
    #[serde(default)]
    pub inventree_server_id: Option<String>,
    #[serde(default)]
    pub master_part: Option<String>,
    /// Registered IPNs, in the order they were added.
    #[serde(default)]
    pub parts: Vec<String>,
}

impl ProjectConfig {
    pub fn new(server_id: Option<String>, master_part: Option<String>) -> Self {
        let today = Local::now().date_naive();
        Self {
            created_date: today,
            last_edited_date: today,
            inventree_server_id: server_id,
            master_part,
            parts: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("No project configuration at {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid project configuration {}", path.display()))
    }

    /// Write the file, stamping today's date as the last edit.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_edited_date = Local::now().date_naive();
        write_atomic(path, self.to_json()?.as_bytes())
    }

    fn to_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8(out)?)
    }

    /// Register `ipn`. Returns false if it was already registered.
    pub fn add_part(&mut self, ipn: &str) -> bool {
        if self.parts.iter().any(|p| p == ipn) {
            return false;
        }
        self.parts.push(ipn.to_string());
        true
    }

    /// Unregister `ipn`. Returns false if it was not registered.
    pub fn remove_part(&mut self, ipn: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p != ipn);
        self.parts.len() != before
    }
}
