//! KiCad symbol library (`.kicad_sym`) helpers.

use std::path::Path;

use super::{DocumentError, parse_document, read_document, write_document};
use crate::formatter::FormatMode;
use crate::{Sexpr, kv};

const ROOT_TAG: &str = "kicad_symbol_lib";

/// An ordered list of symbol definitions plus the library header.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLibrary {
    root: Sexpr,
}

/// Load a `.kicad_sym` file.
pub fn parse_symbol_library(path: &Path) -> Result<SymbolLibrary, DocumentError> {
    Ok(SymbolLibrary {
        root: read_document(path, ROOT_TAG)?,
    })
}

impl SymbolLibrary {
    /// Empty library with the given format version and generator name.
    pub fn new(version: i64, generator: &str) -> Self {
        Self {
            root: Sexpr::list(vec![
                Sexpr::symbol(ROOT_TAG),
                kv("version", Sexpr::int(version)),
                kv("generator", Sexpr::symbol(generator)),
            ]),
        }
    }

    pub fn parse_str(source: &str, path: &Path) -> Result<Self, DocumentError> {
        Ok(Self {
            root: parse_document(source, path, ROOT_TAG)?,
        })
    }

    fn items(&self) -> &[Sexpr] {
        self.root.as_list().unwrap_or_default()
    }

    /// File format version from `(version N)`.
    pub fn version(&self) -> Option<i64> {
        super::props::int_prop(self.items(), "version")
    }

    /// Top-level `(symbol ...)` definitions in file order.
    pub fn symbols(&self) -> impl Iterator<Item = &Sexpr> {
        self.items().iter().filter(|node| is_symbol(node))
    }

    pub fn symbol_names(&self) -> Vec<String> {
        self.symbols()
            .filter_map(|s| s.as_list().and_then(symbol_name))
            .collect()
    }

    /// Consume the library, returning its symbol definitions.
    pub fn into_symbols(self) -> Vec<Sexpr> {
        match self.root.kind {
            crate::SexprKind::List(items) => items.into_iter().filter(is_symbol).collect(),
            _ => Vec::new(),
        }
    }

    pub fn push_symbol(&mut self, symbol: Sexpr) {
        if let Some(items) = self.root.as_list_mut() {
            items.push(symbol);
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        write_document(path, &self.root, FormatMode::CompactTextProperties)
    }
}

fn is_symbol(node: &Sexpr) -> bool {
    node.tag() == Some("symbol")
}

/// Return the symbol name from a `(symbol "<name>" ...)` list.
pub fn symbol_name(symbol: &[Sexpr]) -> Option<String> {
    if symbol.first().and_then(Sexpr::as_sym) != Some("symbol") {
        return None;
    }
    symbol.get(1).and_then(Sexpr::as_text)
}

/// Rename a symbol and every nested unit whose name embeds the old name.
///
/// Unit blocks are named `<symbol>_<unit>_<style>`, so `R_0_1` becomes
/// `NEW_0_1` when `R` is renamed to `NEW`.
pub fn rename_symbol(symbol: &mut [Sexpr], new_name: &str) {
    let Some(old_name) = symbol_name(symbol) else {
        return;
    };
    symbol[1] = Sexpr::string(new_name);
    if old_name.is_empty() {
        return;
    }

    for child in symbol.iter_mut().skip(2) {
        let Some(unit) = child.as_list_mut() else {
            continue;
        };
        let Some(unit_name) = symbol_name(unit) else {
            continue;
        };
        if unit_name.contains(&old_name) {
            unit[1] = Sexpr::string(unit_name.replace(&old_name, new_name));
        }
    }
}

/// Remove and return the direct `(property ...)` children of a symbol, in order.
pub fn take_properties(symbol: &mut Vec<Sexpr>) -> Vec<Sexpr> {
    let mut taken = Vec::new();
    let mut kept = Vec::with_capacity(symbol.len());
    for node in symbol.drain(..) {
        if node.tag() == Some("property") {
            taken.push(node);
        } else {
            kept.push(node);
        }
    }
    *symbol = kept;
    taken
}

/// Insert property nodes after the symbol's header options and before its
/// pins or nested unit blocks.
pub fn insert_properties(symbol: &mut Vec<Sexpr>, properties: Vec<Sexpr>) {
    let insert_idx = symbol
        .iter()
        .enumerate()
        .skip(2)
        .find_map(|(idx, node)| {
            let tag = node.tag();
            (tag == Some("symbol") || tag == Some("pin")).then_some(idx)
        })
        .unwrap_or(symbol.len());
    symbol.splice(insert_idx..insert_idx, properties);
}

/// Key of a `(property "KEY" "VALUE" ...)` node.
pub fn property_key(node: &Sexpr) -> Option<String> {
    let items = node.as_list()?;
    (items.first()?.as_sym()? == "property")
        .then(|| items.get(1).and_then(Sexpr::as_text))
        .flatten()
}

/// Build `(property "KEY" "VALUE" (id ID) (at X Y ANGLE) EFFECTS)`.
pub fn property_node(
    key: &str,
    value: &str,
    id: i64,
    at: (f64, f64, f64),
    effects: Option<Sexpr>,
) -> Sexpr {
    let mut items = vec![
        Sexpr::symbol("property"),
        Sexpr::string(key),
        Sexpr::string(value),
        kv("id", Sexpr::int(id)),
        at_node(at),
    ];
    items.extend(effects);
    Sexpr::list(items)
}

/// Replace the value of a property node.
pub fn set_property_value(node: &mut Sexpr, value: &str) {
    if let Some(items) = node.as_list_mut() {
        while items.len() < 3 {
            items.push(Sexpr::string(""));
        }
        items[2] = Sexpr::string(value);
    }
}

/// Set or replace a property's `(id N)`.
pub fn set_property_id(node: &mut Sexpr, id: i64) {
    replace_or_push(node, "id", kv("id", Sexpr::int(id)));
}

/// Set or replace a property's `(at X Y ANGLE)` anchor.
pub fn set_property_at(node: &mut Sexpr, at: (f64, f64, f64)) {
    replace_or_push(node, "at", at_node(at));
}

/// The `(effects ...)` child of a property, if any.
pub fn property_effects(node: &Sexpr) -> Option<Sexpr> {
    node.as_list()?
        .iter()
        .find(|child| child.tag() == Some("effects"))
        .cloned()
}

/// Mark a property's text as hidden, creating default effects if needed.
pub fn hide_property(node: &mut Sexpr) {
    let Some(items) = node.as_list_mut() else {
        return;
    };
    match items.iter_mut().find(|child| child.tag() == Some("effects")) {
        Some(effects) => hide_effects(effects),
        None => items.push(hidden_effects(None)),
    }
}

/// Copy of `template` (or default text effects) with the hidden flag set.
pub fn hidden_effects(template: Option<Sexpr>) -> Sexpr {
    let mut effects = template.unwrap_or_else(|| {
        Sexpr::list(vec![
            Sexpr::symbol("effects"),
            Sexpr::list(vec![
                Sexpr::symbol("font"),
                Sexpr::list(vec![
                    Sexpr::symbol("size"),
                    Sexpr::float(1.27),
                    Sexpr::float(1.27),
                ]),
            ]),
        ])
    });
    hide_effects(&mut effects);
    effects
}

fn hide_effects(effects: &mut Sexpr) {
    let Some(items) = effects.as_list_mut() else {
        return;
    };
    // KiCad 6 writes a bare `hide`, KiCad 8 writes `(hide yes)`.
    if items.iter().any(|item| item.as_sym() == Some("hide")) {
        return;
    }
    if let Some(flag) = items.iter_mut().find(|item| item.tag() == Some("hide")) {
        *flag = kv("hide", Sexpr::symbol("yes"));
        return;
    }
    items.push(Sexpr::symbol("hide"));
}

fn at_node((x, y, angle): (f64, f64, f64)) -> Sexpr {
    Sexpr::list(vec![
        Sexpr::symbol("at"),
        Sexpr::float(x),
        Sexpr::float(y),
        Sexpr::float(angle),
    ])
}

fn replace_or_push(node: &mut Sexpr, tag: &str, replacement: Sexpr) {
    let Some(items) = node.as_list_mut() else {
        return;
    };
    match items.iter_mut().skip(1).find(|child| child.tag() == Some(tag)) {
        Some(existing) => *existing = replacement,
        None => items.push(replacement),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIB: &str = r#"(kicad_symbol_lib (version 20211014) (generator kicad_symbol_editor)
      (symbol "R_Small" (pin_numbers hide) (in_bom yes) (on_board yes)
        (property "Reference" "R" (id 0) (at 0.762 0.508 0) (effects (font (size 1.016 1.016)) (justify left)))
        (property "Value" "R_Small" (id 1) (at 0.762 -1.016 0) (effects (font (size 1.016 1.016)) (justify left)))
        (property "Footprint" "" (id 2) (at 0 0 0) (effects (font (size 1.27 1.27)) hide))
        (property "Datasheet" "~" (id 3) (at 0 0 0) (effects (font (size 1.27 1.27)) hide))
        (symbol "R_Small_0_1" (rectangle (start -0.762 1.778) (end 0.762 -1.778)))
        (symbol "R_Small_1_1" (pin passive line (at 0 2.54 270) (length 0.762) (name "~") (number "1")))
      )
    )"#;

    fn first_symbol() -> Vec<Sexpr> {
        let lib = SymbolLibrary::parse_str(LIB, Path::new("r.kicad_sym")).unwrap();
        let symbol = lib.into_symbols().remove(0);
        symbol.as_list().unwrap().to_vec()
    }

    #[test]
    fn reads_header_and_symbols() {
        let lib = SymbolLibrary::parse_str(LIB, Path::new("r.kicad_sym")).unwrap();
        assert_eq!(lib.version(), Some(20211014));
        assert_eq!(lib.symbol_names(), vec!["R_Small".to_string()]);
    }

    #[test]
    fn rename_propagates_to_units() {
        let mut symbol = first_symbol();
        rename_symbol(&mut symbol, "RES-0402-10K");
        assert_eq!(symbol_name(&symbol).as_deref(), Some("RES-0402-10K"));
        let units: Vec<_> = symbol
            .iter()
            .filter_map(Sexpr::as_list)
            .filter_map(symbol_name)
            .collect();
        assert_eq!(units, ["RES-0402-10K_0_1", "RES-0402-10K_1_1"]);
    }

    #[test]
    fn properties_are_taken_and_reinserted_before_units() {
        let mut symbol = first_symbol();
        let mut props = take_properties(&mut symbol);
        assert_eq!(props.len(), 4);
        assert_eq!(property_key(&props[1]).as_deref(), Some("Value"));

        set_property_value(&mut props[0], "U");
        hide_property(&mut props[1]);
        props.push(property_node("Internal Nr.", "R-100", 4, (0.0, 196.14, 0.0), None));
        insert_properties(&mut symbol, props);

        let tags: Vec<_> = symbol.iter().skip(2).filter_map(Sexpr::tag).collect();
        assert_eq!(
            tags,
            [
                "pin_numbers",
                "in_bom",
                "on_board",
                "property",
                "property",
                "property",
                "property",
                "property",
                "symbol",
                "symbol"
            ]
        );
        let text = Sexpr::list(symbol).to_string();
        assert!(text.contains("(property \"Reference\" \"U\""));
        assert!(text.contains("(justify left) hide)"));
        assert!(text.contains("(at 0 196.14 0)"));
    }

    #[test]
    fn hidden_effects_accepts_kicad8_flag() {
        let template = crate::parse("(effects (font (size 1 1)) (hide no))").unwrap();
        let hidden = hidden_effects(Some(template));
        assert_eq!(hidden.to_string(), "(effects\n\t(font\n\t\t(size 1 1)\n\t)\n\t(hide yes)\n)");
    }

    #[test]
    fn new_library_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo-symbols.kicad_sym");
        let mut lib = SymbolLibrary::new(20211014, "kitree_build_libs");
        lib.push_symbol(Sexpr::list(first_symbol()));
        lib.write(&path).unwrap();

        let reread = parse_symbol_library(&path).unwrap();
        assert_eq!(reread.version(), Some(20211014));
        assert_eq!(reread.symbol_names(), vec!["R_Small".to_string()]);
    }
}
