//! File locations of a KiCad project and the library kitree generates for it.

use std::path::{Path, PathBuf};

use kitree_sexpr::kicad::LibraryTableKind;

/// KiCad's variable for the project directory, used in every generated URI.
pub const PROJECT_DIR_VAR: &str = "${KIPRJMOD}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub dir: PathBuf,
    pub name: String,
}

impl ProjectLayout {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn schematic(&self) -> PathBuf {
        self.dir.join(format!("{}.kicad_sch", self.name))
    }

    pub fn board(&self) -> PathBuf {
        self.dir.join(format!("{}.kicad_pcb", self.name))
    }

    pub fn library_dir_name(&self) -> String {
        format!("{}-libraries", self.name)
    }

    pub fn library_dir(&self) -> PathBuf {
        self.dir.join(self.library_dir_name())
    }

    pub fn symbol_lib_name(&self) -> String {
        format!("{}-symbols", self.name)
    }

    pub fn footprint_lib_name(&self) -> String {
        format!("{}-footprints", self.name)
    }

    pub fn symbol_lib_path(&self) -> PathBuf {
        self.library_dir()
            .join(format!("{}.kicad_sym", self.symbol_lib_name()))
    }

    pub fn footprint_dir(&self) -> PathBuf {
        self.library_dir()
            .join(format!("{}.pretty", self.footprint_lib_name()))
    }

    pub fn model_dir(&self) -> PathBuf {
        self.library_dir().join("3dmodels")
    }

    /// `sym-lib-table` or `fp-lib-table` next to the project file.
    pub fn registry_path(&self, kind: LibraryTableKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Library name and project-relative URI registered for `kind`.
    pub fn registry_entry(&self, kind: LibraryTableKind) -> (String, String) {
        let lib_dir = self.library_dir_name();
        match kind {
            LibraryTableKind::Symbol => (
                self.symbol_lib_name(),
                format!("{PROJECT_DIR_VAR}/{lib_dir}/{}.kicad_sym", self.symbol_lib_name()),
            ),
            LibraryTableKind::Footprint => (
                self.footprint_lib_name(),
                format!("{PROJECT_DIR_VAR}/{lib_dir}/{}.pretty", self.footprint_lib_name()),
            ),
        }
    }

    /// Project-relative path a footprint uses to reference a copied model.
    pub fn model_uri(&self, file_name: &str) -> String {
        format!("{PROJECT_DIR_VAR}/{}/3dmodels/{file_name}", self.library_dir_name())
    }

    /// Find the single `*.kicad_pro` in `dir` and derive the layout from it.
    pub fn discover(dir: &Path) -> anyhow::Result<Self> {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("kicad_pro") {
                found.push(path);
            }
        }
        match found.as_slice() {
            [project] => {
                let name = project
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| anyhow::anyhow!("Invalid project file name {}", project.display()))?;
                Ok(Self::new(dir, name))
            }
            [] => anyhow::bail!("No KiCad project file found in {}", dir.display()),
            _ => anyhow::bail!(
                "Found {} KiCad project files in {}, expected exactly one",
                found.len(),
                dir.display()
            ),
        }
    }
}
