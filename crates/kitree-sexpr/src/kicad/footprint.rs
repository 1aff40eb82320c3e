//! KiCad footprint (`.kicad_mod`) files and their 3D model references.

use std::collections::BTreeMap;
use std::path::Path;

use super::props::properties;
use super::{DocumentError, parse_document, read_document, write_document};
use crate::formatter::FormatMode;
use crate::{ListBuilder, Sexpr, kv, number_as_f64};

/// A `(model "path" (offset ..) (scale ..) (rotate ..))` reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Model3d {
    pub path: String,
    pub offset: [f64; 3],
    pub scale: [f64; 3],
    pub rotate: [f64; 3],
}

impl Model3d {
    /// Model at `path` with identity transforms.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            offset: [0.0; 3],
            scale: [1.0; 3],
            rotate: [0.0; 3],
        }
    }

    fn from_list(list: &[Sexpr]) -> Option<Self> {
        let mut model = Model3d::new(list.get(1)?.as_text()?);
        for child in list.iter().skip(2).filter_map(Sexpr::as_list) {
            let slot = match child.first().and_then(Sexpr::as_sym) {
                // KiCad 5 used `at` for what is now `offset`
                Some("offset") | Some("at") => &mut model.offset,
                Some("scale") => &mut model.scale,
                Some("rotate") => &mut model.rotate,
                _ => continue,
            };
            if let Some(xyz) = xyz_triple(child) {
                *slot = xyz;
            }
        }
        Some(model)
    }

    fn to_sexpr(&self) -> Sexpr {
        let mut builder = ListBuilder::node("model");
        builder.push(Sexpr::string(self.path.as_str())).extend([
            kv("offset", xyz_node(self.offset)),
            kv("scale", xyz_node(self.scale)),
            kv("rotate", xyz_node(self.rotate)),
        ]);
        builder.build()
    }
}

fn xyz_triple(transform: &[Sexpr]) -> Option<[f64; 3]> {
    let xyz = transform.get(1)?.as_list()?;
    if xyz.first().and_then(Sexpr::as_sym) != Some("xyz") {
        return None;
    }
    Some([
        number_as_f64(xyz.get(1)?)?,
        number_as_f64(xyz.get(2)?)?,
        number_as_f64(xyz.get(3)?)?,
    ])
}

fn xyz_node([x, y, z]: [f64; 3]) -> Sexpr {
    Sexpr::list(vec![
        Sexpr::symbol("xyz"),
        Sexpr::float(x),
        Sexpr::float(y),
        Sexpr::float(z),
    ])
}

/// A single footprint document. Unknown content is preserved on write.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    root: Sexpr,
}

/// Load a `.kicad_mod` file.
pub fn parse_footprint(path: &Path) -> Result<Footprint, DocumentError> {
    Footprint::from_root(read_document_any(path)?, path)
}

// KiCad 6+ uses `footprint`, older libraries still ship `module`.
fn read_document_any(path: &Path) -> Result<Sexpr, DocumentError> {
    match read_document(path, "footprint") {
        Err(DocumentError::WrongRoot { found, .. }) if found == "module" => {
            read_document(path, "module")
        }
        other => other,
    }
}

impl Footprint {
    pub fn parse_str(source: &str, path: &Path) -> Result<Self, DocumentError> {
        let root = match parse_document(source, path, "footprint") {
            Err(DocumentError::WrongRoot { found, .. }) if found == "module" => {
                parse_document(source, path, "module")?
            }
            other => other?,
        };
        Self::from_root(root, path)
    }

    fn from_root(root: Sexpr, path: &Path) -> Result<Self, DocumentError> {
        if root.as_list().is_none_or(|items| items.len() < 2) {
            return Err(DocumentError::Malformed {
                path: path.to_path_buf(),
                message: "footprint has no name".to_string(),
            });
        }
        Ok(Self { root })
    }

    fn items(&self) -> &[Sexpr] {
        self.root.as_list().unwrap_or_default()
    }

    /// Footprint name from the header, e.g. `R_0402_1005Metric`.
    pub fn name(&self) -> Option<String> {
        self.items().get(1).and_then(Sexpr::as_text)
    }

    pub fn properties(&self) -> BTreeMap<String, String> {
        properties(self.items())
    }

    /// 3D model references in file order.
    pub fn models(&self) -> Vec<Model3d> {
        self.items()
            .iter()
            .filter_map(Sexpr::as_list)
            .filter(|list| list.first().and_then(Sexpr::as_sym) == Some("model"))
            .filter_map(Model3d::from_list)
            .collect()
    }

    /// Drop every `(model ...)` reference.
    pub fn clear_models(&mut self) {
        if let Some(items) = self.root.as_list_mut() {
            items.retain(|node| node.tag() != Some("model"));
        }
    }

    /// Append a model reference; KiCad keeps models as the last children.
    pub fn add_model(&mut self, model: &Model3d) {
        if let Some(items) = self.root.as_list_mut() {
            items.push(model.to_sexpr());
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        write_document(path, &self.root, FormatMode::CompactTextProperties)
    }
}
