//! KiCad board file (.kicad_pcb) utilities.
//!
//! Boards are flat: every placed part is a top-level `(footprint ...)` node
//! (`(module ...)` in KiCad 5 files) carrying its reference, position, layer,
//! mounting attributes and the properties copied from the schematic symbol.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::kicad::{DocumentError, parse_document, properties, read_document, text_prop};
use crate::{Sexpr, number_as_f64};

const ROOT_TAG: &str = "kicad_pcb";

/// Mounting technology declared by `(attr smd|through_hole ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountTechnology {
    Smd,
    ThroughHole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementAt {
    pub x: f64,
    pub y: f64,
    pub rot: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub reference: String,
    /// Footprint identifier from `(footprint "<LIB:NAME>" ...)`.
    pub footprint_id: Option<String>,
    pub layer: Option<String>,
    pub at: PlacementAt,
    pub mount: Option<MountTechnology>,
    pub board_only: bool,
    pub exclude_from_pos_files: bool,
    pub exclude_from_bom: bool,
    /// All `(property "NAME" "VALUE" ...)` pairs inside the footprint.
    pub properties: BTreeMap<String, String>,
}

impl Placement {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Entry name part of the footprint id (`R_0402` for `Lib:R_0402`).
    pub fn footprint_name(&self) -> Option<&str> {
        let id = self.footprint_id.as_deref()?;
        Some(id.split_once(':').map_or(id, |(_, name)| name))
    }

    /// Whether the placement sits on the front copper layer.
    pub fn is_top(&self) -> bool {
        self.layer.as_deref() == Some("F.Cu")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardDocument {
    pub path: PathBuf,
    pub placements: Vec<Placement>,
}

/// Load a `.kicad_pcb` file.
pub fn parse_board(path: &Path) -> Result<BoardDocument, DocumentError> {
    let root = read_document(path, ROOT_TAG)?;
    BoardDocument::from_sexpr(&root, path)
}

impl BoardDocument {
    pub fn parse_str(source: &str, path: &Path) -> Result<Self, DocumentError> {
        let root = parse_document(source, path, ROOT_TAG)?;
        Self::from_sexpr(&root, path)
    }

    pub fn from_sexpr(root: &Sexpr, path: &Path) -> Result<Self, DocumentError> {
        let root_list = root.as_list().ok_or_else(|| DocumentError::Malformed {
            path: path.to_path_buf(),
            message: "board root is not a list".to_string(),
        })?;

        let mut placements = Vec::new();
        for node in root_list.iter().skip(1) {
            let Some(items) = node.as_list() else {
                continue;
            };
            if !matches!(
                items.first().and_then(Sexpr::as_sym),
                Some("footprint") | Some("module")
            ) {
                continue;
            }
            match placement_from_list(items) {
                Some(placement) => placements.push(placement),
                None => log::debug!(
                    "{}: ignoring footprint {:?} without reference",
                    path.display(),
                    items.get(1).and_then(Sexpr::as_text)
                ),
            }
        }

        Ok(BoardDocument {
            path: path.to_path_buf(),
            placements,
        })
    }
}

fn placement_from_list(items: &[Sexpr]) -> Option<Placement> {
    let properties = properties(items);
    let reference = properties
        .get("Reference")
        .cloned()
        .or_else(|| fp_text_reference(items))?;

    let mut placement = Placement {
        reference,
        footprint_id: items.get(1).and_then(Sexpr::as_text),
        layer: text_prop(items, "layer"),
        at: PlacementAt {
            x: 0.0,
            y: 0.0,
            rot: 0.0,
        },
        mount: None,
        board_only: false,
        exclude_from_pos_files: false,
        exclude_from_bom: false,
        properties,
    };

    for list in items.iter().skip(2).filter_map(Sexpr::as_list) {
        match list.first().and_then(Sexpr::as_sym) {
            Some("at") => {
                if let Some(at) = parse_at_list(list) {
                    placement.at = at;
                }
            }
            Some("attr") => {
                for flag in list.iter().skip(1).filter_map(Sexpr::as_sym) {
                    match flag {
                        "smd" => placement.mount = Some(MountTechnology::Smd),
                        "through_hole" => placement.mount = Some(MountTechnology::ThroughHole),
                        "board_only" => placement.board_only = true,
                        "exclude_from_pos_files" => placement.exclude_from_pos_files = true,
                        "exclude_from_bom" => placement.exclude_from_bom = true,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Some(placement)
}

// KiCad 6 and older: `(fp_text reference "R1" ...)`
fn fp_text_reference(items: &[Sexpr]) -> Option<String> {
    items.iter().skip(1).filter_map(Sexpr::as_list).find_map(|list| {
        let is_reference = list.first().and_then(Sexpr::as_sym) == Some("fp_text")
            && list.get(1).and_then(Sexpr::as_sym) == Some("reference");
        if is_reference {
            list.get(2).and_then(Sexpr::as_text)
        } else {
            None
        }
    })
}

fn parse_at_list(list: &[Sexpr]) -> Option<PlacementAt> {
    let x = number_as_f64(list.get(1)?)?;
    let y = number_as_f64(list.get(2)?)?;
    let rot = list.get(3).and_then(number_as_f64).unwrap_or(0.0);
    Some(PlacementAt { x, y, rot })
}
