//! Typed views of the KiCad files kitree touches.
//!
//! - [`props`] - common "property-like" query helpers
//! - [`schematic`] - `.kicad_sch` components, sheet links and instance paths
//! - [`symbol`] - `.kicad_sym` libraries and symbol rewriting
//! - [`footprint`] - `.kicad_mod` footprints and their 3D model references
//! - [`lib_table`] - `sym-lib-table` / `fp-lib-table` registries
//!
//! Every document is loaded through [`read_document`] and persisted through
//! [`write_document`], which formats the tree KiCad-style and replaces the
//! target file atomically.

pub mod footprint;
pub mod lib_table;
pub mod props;
pub mod schematic;
pub mod symbol;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use atomicwrites::{AtomicFile, OverwriteBehavior};

use crate::formatter::{FormatMode, format_tree};
use crate::{ParseError, Sexpr};

pub use footprint::{Footprint, Model3d, parse_footprint};
pub use lib_table::{LibraryEntry, LibraryTable, LibraryTableKind};
pub use props::{child_list, int_prop, properties, property_value, text_prop, yes_no_prop};
pub use schematic::{
    InstanceEntry, SchematicComponent, SchematicDocument, SheetLink, parse_schematic,
};
pub use symbol::{SymbolLibrary, parse_symbol_library};

/// Failure to load or store a KiCad document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("{}: expected a `{expected}` document, found `{found}`", path.display())]
    WrongRoot {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
    #[error("{}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read and parse a document whose root list must be tagged `expected`.
pub fn read_document(path: &Path, expected: &'static str) -> Result<Sexpr, DocumentError> {
    let source = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&source, path, expected)
}

/// Parse document text, checking the root tag. `path` is only used for errors.
pub fn parse_document(
    source: &str,
    path: &Path,
    expected: &'static str,
) -> Result<Sexpr, DocumentError> {
    let root = crate::parse(source).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match root.tag() {
        Some(tag) if tag == expected => Ok(root),
        other => Err(DocumentError::WrongRoot {
            path: path.to_path_buf(),
            expected,
            found: other.unwrap_or("<atom>").to_string(),
        }),
    }
}

/// Format `root` and atomically replace `path` with it.
pub fn write_document(path: &Path, root: &Sexpr, mode: FormatMode) -> Result<(), DocumentError> {
    let text = format_tree(root, mode);
    log::debug!("Writing {} ({} bytes)", path.display(), text.len());
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| {
            f.write_all(text.as_bytes())?;
            f.flush()
        })
        .map_err(|err| DocumentError::Write {
            path: path.to_path_buf(),
            source: match err {
                atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_root() {
        let err = parse_document("(kicad_pcb)", Path::new("x.kicad_sch"), "kicad_sch").unwrap_err();
        assert!(matches!(err, DocumentError::WrongRoot { ref found, .. } if found == "kicad_pcb"));
        assert_eq!(
            err.to_string(),
            "x.kicad_sch: expected a `kicad_sch` document, found `kicad_pcb`"
        );
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.kicad_sym");
        let root = crate::parse("(kicad_symbol_lib (version 20211014))").unwrap();
        write_document(&path, &root, FormatMode::Normal).unwrap();
        let reread = read_document(&path, "kicad_symbol_lib").unwrap();
        assert_eq!(reread, root);
    }
}
