//! Project library registries (`sym-lib-table` and `fp-lib-table`).

use std::path::Path;

use super::props::text_prop;
use super::{DocumentError, parse_document, write_document};
use crate::formatter::FormatMode;
use crate::{ListBuilder, Sexpr, kv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryTableKind {
    Symbol,
    Footprint,
}

impl LibraryTableKind {
    /// Root tag of the table document.
    pub fn tag(self) -> &'static str {
        match self {
            LibraryTableKind::Symbol => "sym_lib_table",
            LibraryTableKind::Footprint => "fp_lib_table",
        }
    }

    /// File name KiCad looks for next to the project file.
    pub fn file_name(self) -> &'static str {
        match self {
            LibraryTableKind::Symbol => "sym-lib-table",
            LibraryTableKind::Footprint => "fp-lib-table",
        }
    }
}

/// Keys of a `(lib ...)` row that [`LibraryEntry`] reads into fields.
const ROW_KEYS: &[&str] = &["name", "type", "uri", "options", "descr"];

/// One `(lib ...)` row.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub name: String,
    pub lib_type: String,
    pub uri: String,
    pub options: String,
    pub descr: String,
    /// Remaining children such as `(disabled)` or `(hidden)`, written back as read.
    pub flags: Vec<Sexpr>,
}

impl LibraryEntry {
    /// A `KiCad`-typed entry with empty options and description.
    pub fn kicad(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lib_type: "KiCad".to_string(),
            uri: uri.into(),
            options: String::new(),
            descr: String::new(),
            flags: Vec::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.flags.iter().any(|flag| flag.tag() == Some("disabled"))
    }

    fn from_list(list: &[Sexpr]) -> Option<Self> {
        let flags = list
            .iter()
            .skip(1)
            .filter(|child| !child.tag().is_some_and(|tag| ROW_KEYS.contains(&tag)))
            .cloned()
            .collect();
        Some(Self {
            name: text_prop(list, "name")?,
            lib_type: text_prop(list, "type").unwrap_or_else(|| "KiCad".to_string()),
            uri: text_prop(list, "uri")?,
            options: text_prop(list, "options").unwrap_or_default(),
            descr: text_prop(list, "descr").unwrap_or_default(),
            flags,
        })
    }

    fn to_sexpr(&self) -> Sexpr {
        let mut builder = ListBuilder::node("lib");
        builder
            .extend([
                kv("name", Sexpr::string(self.name.as_str())),
                kv("type", Sexpr::string(self.lib_type.as_str())),
                kv("uri", Sexpr::string(self.uri.as_str())),
                kv("options", Sexpr::string(self.options.as_str())),
                kv("descr", Sexpr::string(self.descr.as_str())),
            ])
            .extend(self.flags.iter().cloned());
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Row {
    Lib(LibraryEntry),
    /// `(version ..)` and rows this reader does not understand.
    Verbatim(Sexpr),
}

/// A library table. Children are kept in file order and everything that is not
/// a well-formed `(lib ...)` row is written back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryTable {
    pub kind: LibraryTableKind,
    rows: Vec<Row>,
}

impl LibraryTable {
    pub fn new(kind: LibraryTableKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }

    /// Load the table at `path`, or start an empty one when the file is missing.
    pub fn load_or_new(path: &Path, kind: LibraryTableKind) -> Result<Self, DocumentError> {
        match std::fs::read_to_string(path) {
            Ok(source) => Self::parse_str(&source, path, kind),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::new(kind)),
            Err(source) => Err(DocumentError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse_str(
        source: &str,
        path: &Path,
        kind: LibraryTableKind,
    ) -> Result<Self, DocumentError> {
        let root = parse_document(source, path, kind.tag())?;
        let mut table = Self::new(kind);
        for node in root.as_list().unwrap_or_default().iter().skip(1) {
            let entry = match node.tag() {
                Some("lib") => node.as_list().and_then(LibraryEntry::from_list),
                _ => None,
            };
            match entry {
                Some(entry) => table.rows.push(Row::Lib(entry)),
                None => {
                    if node.tag() == Some("lib") {
                        log::warn!("{}: lib row without name or uri kept as is", path.display());
                    }
                    table.rows.push(Row::Verbatim(node.clone()));
                }
            }
        }
        Ok(table)
    }

    /// Well-formed `(lib ...)` rows in file order.
    pub fn entries(&self) -> impl Iterator<Item = &LibraryEntry> {
        self.rows.iter().filter_map(|row| match row {
            Row::Lib(entry) => Some(entry),
            Row::Verbatim(_) => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries().any(|entry| entry.name == name)
    }

    pub fn push(&mut self, entry: LibraryEntry) {
        self.rows.push(Row::Lib(entry));
    }

    pub fn to_sexpr(&self) -> Sexpr {
        let mut builder = ListBuilder::node(self.kind.tag());
        builder.extend(self.rows.iter().map(|row| match row {
            Row::Lib(entry) => entry.to_sexpr(),
            Row::Verbatim(node) => node.clone(),
        }));
        builder.build()
    }

    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        write_document(path, &self.to_sexpr(), FormatMode::LibraryTable)
    }
}
