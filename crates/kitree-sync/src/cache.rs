//! Flat on-disk cache for downloaded CAD assets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CACHE_DIR_ENV: &str = "KITREE_CACHE_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Symbol,
    Footprint,
    Model,
}

impl AssetKind {
    fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Symbol => "symbols",
            AssetKind::Footprint => "footprints",
            AssetKind::Model => "models",
        }
    }
}

/// One subdirectory per asset kind. Files are overwritten on every download.
#[derive(Debug, Clone)]
pub struct AssetCache {
    root: PathBuf,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$KITREE_CACHE_DIR`, else the platform cache dir, else the temp dir.
    pub fn from_env() -> Self {
        let root = std::env::var_os(CACHE_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("kitree")))
            .unwrap_or_else(|| std::env::temp_dir().join("kitree"));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `bytes` as `file_name` under `kind`, returning the cached path.
    pub fn store(&self, kind: AssetKind, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let dir = self.root.join(kind.dir_name());
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);

        if is_kicad_text(&path) {
            // Normalize line endings for KiCad files
            let text = String::from_utf8_lossy(bytes);
            fs::write(&path, text.replace("\r\n", "\n"))?;
        } else {
            fs::write(&path, bytes)?;
        }
        log::debug!("Cached {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

fn is_kicad_text(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("kicad_sym" | "kicad_mod" | "kicad_pcb" | "kicad_sch")
    )
}

/// File name for a stored file reference: its last path segment.
pub fn file_name_of(reference: &str) -> &str {
    let trimmed = reference.split(['?', '#']).next().unwrap_or(reference);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
