//! KiCad schematic (`.kicad_sch`) documents.
//!
//! A root schematic carries the flat `(symbol_instances ...)` table that maps
//! every placed component of the whole hierarchy, addressed as
//! `/<sheet uuid>/.../<component uuid>`, to its reference designator. Child
//! sheets are linked through `(sheet ...)` nodes that name their file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::props::{int_prop, properties, text_prop, yes_no_prop};
use super::{DocumentError, parse_document, read_document};
use crate::Sexpr;

const ROOT_TAG: &str = "kicad_sch";

/// A placed symbol on one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SchematicComponent {
    pub uuid: String,
    pub lib_id: Option<String>,
    /// Unit index for multi-unit symbols; `1` is the primary unit.
    pub unit: i64,
    pub in_bom: bool,
    pub properties: BTreeMap<String, String>,
}

impl SchematicComponent {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A `(sheet ...)` link to a child schematic.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLink {
    pub uuid: String,
    pub name: Option<String>,
    /// File name relative to the directory of the linking schematic.
    pub file: String,
}

/// One row of the root `(symbol_instances ...)` table.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceEntry {
    pub path: String,
    pub reference: String,
    pub unit: i64,
}

impl InstanceEntry {
    /// Split the path at its final separator into `(sheet path, component uuid)`.
    ///
    /// Components on the root sheet have an empty sheet path. Returns `None`
    /// for a path without any separator.
    pub fn split(&self) -> Option<(&str, &str)> {
        self.path.rsplit_once('/')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchematicDocument {
    pub path: PathBuf,
    pub components: Vec<SchematicComponent>,
    pub sheets: Vec<SheetLink>,
    pub instances: Vec<InstanceEntry>,
}

/// Load a `.kicad_sch` file.
pub fn parse_schematic(path: &Path) -> Result<SchematicDocument, DocumentError> {
    let root = read_document(path, ROOT_TAG)?;
    SchematicDocument::from_sexpr(&root, path)
}

impl SchematicDocument {
    /// Parse schematic text as if it had been read from `path`.
    pub fn parse_str(source: &str, path: &Path) -> Result<Self, DocumentError> {
        let root = parse_document(source, path, ROOT_TAG)?;
        Self::from_sexpr(&root, path)
    }

    pub fn from_sexpr(root: &Sexpr, path: &Path) -> Result<Self, DocumentError> {
        let items = root.as_list().ok_or_else(|| DocumentError::Malformed {
            path: path.to_path_buf(),
            message: "schematic root is not a list".to_string(),
        })?;

        let mut doc = SchematicDocument {
            path: path.to_path_buf(),
            components: Vec::new(),
            sheets: Vec::new(),
            instances: Vec::new(),
        };

        for node in items.iter().skip(1) {
            let Some(list) = node.as_list() else {
                continue;
            };
            match list.first().and_then(Sexpr::as_sym) {
                Some("symbol") => {
                    if let Some(component) = component_from_list(list) {
                        doc.components.push(component);
                    } else {
                        log::debug!("{}: ignoring symbol without uuid", path.display());
                    }
                }
                Some("sheet") => match sheet_from_list(list) {
                    Some(sheet) => doc.sheets.push(sheet),
                    None => log::warn!(
                        "{}: ignoring sheet without uuid or file name",
                        path.display()
                    ),
                },
                Some("symbol_instances") => {
                    doc.instances.extend(instances_from_list(list, path));
                }
                _ => {}
            }
        }

        Ok(doc)
    }

    /// Component whose uuid equals `uuid` exactly.
    pub fn component(&self, uuid: &str) -> Option<&SchematicComponent> {
        self.components.iter().find(|c| c.uuid == uuid)
    }

    /// Sheet link whose uuid equals `uuid` exactly.
    pub fn sheet(&self, uuid: &str) -> Option<&SheetLink> {
        self.sheets.iter().find(|s| s.uuid == uuid)
    }

    /// Location on disk of the schematic a sheet link points at.
    pub fn sheet_file_path(&self, sheet: &SheetLink) -> PathBuf {
        self.path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&sheet.file)
    }
}

fn component_from_list(list: &[Sexpr]) -> Option<SchematicComponent> {
    Some(SchematicComponent {
        uuid: text_prop(list, "uuid")?,
        lib_id: text_prop(list, "lib_id"),
        unit: int_prop(list, "unit").unwrap_or(1),
        in_bom: yes_no_prop(list, "in_bom").unwrap_or(true),
        properties: properties(list),
    })
}

fn sheet_from_list(list: &[Sexpr]) -> Option<SheetLink> {
    let props = properties(list);
    let file = props
        .get("Sheet file")
        .or_else(|| props.get("Sheetfile"))?
        .clone();
    Some(SheetLink {
        uuid: text_prop(list, "uuid")?,
        name: props
            .get("Sheet name")
            .or_else(|| props.get("Sheetname"))
            .cloned(),
        file,
    })
}

fn instances_from_list(list: &[Sexpr], path: &Path) -> Vec<InstanceEntry> {
    let mut out = Vec::new();
    for entry in list.iter().skip(1).filter_map(Sexpr::as_list) {
        if entry.first().and_then(Sexpr::as_sym) != Some("path") {
            continue;
        }
        let Some(instance_path) = entry.get(1).and_then(Sexpr::as_text) else {
            continue;
        };
        let Some(reference) = text_prop(entry, "reference") else {
            log::warn!(
                "{}: instance {instance_path} has no reference",
                path.display()
            );
            continue;
        };
        out.push(InstanceEntry {
            path: instance_path,
            reference,
            unit: int_prop(entry, "unit").unwrap_or(1),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = r##"(kicad_sch (version 20211123) (generator eeschema)
      (uuid 0a0a0a0a-0000-0000-0000-000000000001)
      (lib_symbols
        (symbol "Device:R" (property "Reference" "R" (id 0)))
      )
      (symbol (lib_id "Device:R") (at 10 10 0) (unit 1)
        (in_bom yes) (on_board yes)
        (uuid 11111111-aaaa-bbbb-cccc-000000000001)
        (property "Reference" "R1" (id 0) (at 10 8 0))
        (property "Internal Nr." "R-100" (id 4) (at 10 12 0))
      )
      (symbol (lib_id "power:GND") (at 20 20 0) (unit 1)
        (in_bom no) (on_board yes)
        (uuid 11111111-aaaa-bbbb-cccc-000000000002)
        (property "Reference" "#PWR01" (id 0) (at 20 18 0))
      )
      (sheet (at 50 50) (size 20 10)
        (uuid 22222222-aaaa-bbbb-cccc-000000000001)
        (property "Sheet name" "Power" (id 0) (at 50 49 0))
        (property "Sheet file" "power.kicad_sch" (id 1) (at 50 61 0))
      )
      (symbol_instances
        (path "/11111111-aaaa-bbbb-cccc-000000000001" (reference "R1") (unit 1) (value "10k"))
        (path "/11111111-aaaa-bbbb-cccc-000000000002" (reference "#PWR01") (unit 1))
        (path "/22222222-aaaa-bbbb-cccc-000000000001/33333333-aaaa-bbbb-cccc-000000000001" (reference "C1") (unit 1))
      )
    )"##;

    #[test]
    fn extracts_components_sheets_and_instances() {
        let doc = SchematicDocument::parse_str(ROOT, Path::new("/proj/demo.kicad_sch")).unwrap();

        assert_eq!(doc.components.len(), 2);
        let r1 = doc.component("11111111-aaaa-bbbb-cccc-000000000001").unwrap();
        assert_eq!(r1.lib_id.as_deref(), Some("Device:R"));
        assert_eq!(r1.unit, 1);
        assert!(r1.in_bom);
        assert_eq!(r1.property("Internal Nr."), Some("R-100"));
        assert!(!doc.component("11111111-aaaa-bbbb-cccc-000000000002").unwrap().in_bom);

        assert_eq!(doc.sheets.len(), 1);
        let sheet = doc.sheet("22222222-aaaa-bbbb-cccc-000000000001").unwrap();
        assert_eq!(sheet.name.as_deref(), Some("Power"));
        assert_eq!(
            doc.sheet_file_path(sheet),
            PathBuf::from("/proj/power.kicad_sch")
        );

        let refs: Vec<_> = doc.instances.iter().map(|i| i.reference.as_str()).collect();
        assert_eq!(refs, ["R1", "#PWR01", "C1"]);
        assert_eq!(
            doc.instances[2].split(),
            Some((
                "/22222222-aaaa-bbbb-cccc-000000000001",
                "33333333-aaaa-bbbb-cccc-000000000001"
            ))
        );
        assert_eq!(doc.instances[0].split().map(|(sheet, _)| sheet), Some(""));
    }

    #[test]
    fn lookups_use_exact_identity() {
        let doc = SchematicDocument::parse_str(ROOT, Path::new("demo.kicad_sch")).unwrap();
        assert!(doc.component("11111111-aaaa-bbbb-cccc-00000000000").is_none());
        assert!(doc.component("11111111").is_none());
        assert!(doc.sheet("22222222-aaaa-bbbb-cccc").is_none());
    }

    #[test]
    fn defaults_unit_and_bom_flag() {
        let doc = SchematicDocument::parse_str(
            "(kicad_sch (symbol (lib_id \"x:y\") (uuid \"abc\")))",
            Path::new("a.kicad_sch"),
        )
        .unwrap();
        let c = doc.component("abc").unwrap();
        assert_eq!(c.unit, 1);
        assert!(c.in_bom);
    }
}
