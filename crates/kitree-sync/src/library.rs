//! Build the project's symbol and footprint libraries from catalog attachments.
//!
//! Every registered part contributes one symbol to `<project>-symbols.kicad_sym`
//! and one footprint to `<project>-footprints.pretty`. Symbols are renamed to a
//! stable library id and carry the catalog's sourcing data as hidden
//! properties; footprints point at a project-local copy of the 3D model.
//!
//! Parts fail independently: a failure is recorded in the [`BuildReport`] and
//! the build moves on. Only the library directory refresh, the consolidated
//! symbol library write and the registry updates abort the whole build.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use kitree_catalog::{Attachment, CatalogError, CatalogGateway, PartId};
use kitree_sexpr::{Sexpr, SexprKind};
use kitree_sexpr::kicad::symbol::{
    hidden_effects, hide_property, insert_properties, property_effects, property_key,
    property_node, rename_symbol, set_property_at, set_property_id, set_property_value,
    take_properties,
};
use kitree_sexpr::kicad::{
    Footprint, LibraryTableKind, Model3d, SymbolLibrary, parse_footprint, parse_symbol_library,
};
use serde::{Deserialize, Serialize};

use crate::cache::{AssetCache, AssetKind, file_name_of};
use crate::error::PartFailure;
use crate::part::{PartFetcher, PartRecord, PartStore};
use crate::project::ProjectLayout;
use crate::registry::{RegistryOutcome, ensure_library_entry};
use crate::variant::{
    OFFSET_PARAMETER, ROTATION_PARAMETER, SCALE_PARAMETER, VariantResolver,
};

pub const SYMBOL_TAG: &str = "Symbol";
pub const FOOTPRINT_TAG: &str = "Footprint";
pub const MODEL_TAG: &str = "3D-Model";
pub const DATASHEET_TAG: &str = "Datasheet";
pub const SCHEMATIC_ID_PARAMETER: &str = "Schematic Identifier";
pub const PACKAGE_PROPERTY: &str = "Package";

/// Value written for sourcing fields the catalog has no data for.
pub const NOT_AVAILABLE: &str = "n/a";
pub const GENERATOR: &str = "kitree_build_libs";
pub const MIN_SYMBOL_LIB_VERSION: i64 = 20211014;

const FOOTPRINT_ANCHOR: (f64, f64, f64) = (0.0, 200.0, 0.0);
const DATASHEET_ANCHOR: (f64, f64, f64) = (0.0, 198.08, 0.0);
const FIRST_CATALOG_PROPERTY_ID: i64 = 4;
const CATALOG_PROPERTY_Y: [f64; 6] = [196.14, 194.21, 192.28, 190.35, 188.42, 186.49];
const PACKAGE_PROPERTY_ID: i64 = 10;

/// Property names used for catalog data in symbols and design files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub ipn: String,
    pub manufacturer: String,
    pub mpn: String,
    pub supplier: String,
    pub sku: String,
    pub link: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            ipn: "Internal Nr.".to_string(),
            manufacturer: "Manufacturer".to_string(),
            mpn: "Part Nr.".to_string(),
            supplier: "Supplier".to_string(),
            sku: "Order Nr.".to_string(),
            link: "Link".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPart {
    pub library_id: String,
    /// Footprint file name inside the generated `.pretty` folder.
    pub footprint: String,
    /// 3D model file name inside `3dmodels/`, if one was attached.
    pub model: Option<String>,
    /// Degradations that did not fail the part.
    pub notes: Vec<String>,
}

#[derive(Debug)]
pub struct PartResult {
    pub ipn: String,
    pub outcome: Result<BuiltPart, PartFailure>,
}

#[derive(Debug)]
pub struct BuildReport {
    pub parts: Vec<PartResult>,
    pub symbol_library: PathBuf,
    pub registries: Vec<(LibraryTableKind, RegistryOutcome)>,
}

impl BuildReport {
    pub fn built(&self) -> impl Iterator<Item = (&str, &BuiltPart)> {
        self.parts
            .iter()
            .filter_map(|p| p.outcome.as_ref().ok().map(|built| (p.ipn.as_str(), built)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &PartFailure)> {
        self.parts
            .iter()
            .filter_map(|p| p.outcome.as_ref().err().map(|err| (p.ipn.as_str(), err)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// State shared across the parts of one build.
struct BuildState<'g, G: CatalogGateway + ?Sized> {
    fetcher: PartFetcher<'g, G>,
    store: PartStore,
    /// Library id to the IPN that claimed it.
    library_ids: HashMap<String, String>,
    symbols: Vec<Sexpr>,
    version: i64,
}

pub struct LibraryBuilder<'g, G: CatalogGateway + ?Sized> {
    gateway: &'g G,
    layout: ProjectLayout,
    fields: FieldNames,
    cache: AssetCache,
}

impl<'g, G: CatalogGateway + ?Sized> LibraryBuilder<'g, G> {
    pub fn new(gateway: &'g G, layout: ProjectLayout, fields: FieldNames, cache: AssetCache) -> Self {
        Self {
            gateway,
            layout,
            fields,
            cache,
        }
    }

    /// Rebuild the generated libraries for `registered`, in list order.
    pub fn build(&self, registered: &[String]) -> anyhow::Result<BuildReport> {
        self.refresh_library_dir()?;

        let mut state = BuildState {
            fetcher: PartFetcher::new(self.gateway),
            store: PartStore::new(),
            library_ids: HashMap::new(),
            symbols: Vec::new(),
            version: MIN_SYMBOL_LIB_VERSION,
        };

        let mut parts = Vec::with_capacity(registered.len());
        for ipn in registered {
            log::info!("Processing {ipn}");
            let outcome = self.build_part(ipn, &mut state);
            match &outcome {
                Ok(built) => log::info!("Built {ipn} as {}", built.library_id),
                Err(err) => log::error!("Skipping part {ipn}: {err}"),
            }
            parts.push(PartResult {
                ipn: ipn.clone(),
                outcome,
            });
        }

        let symbol_library = self.layout.symbol_lib_path();
        let mut library = SymbolLibrary::new(state.version, GENERATOR);
        for symbol in state.symbols {
            library.push_symbol(symbol);
        }
        library.write(&symbol_library).with_context(|| {
            format!(
                "Could not write symbol library of project {} to {}",
                self.layout.name,
                symbol_library.display()
            )
        })?;

        let mut registries = Vec::new();
        for kind in [LibraryTableKind::Symbol, LibraryTableKind::Footprint] {
            let (name, uri) = self.layout.registry_entry(kind);
            let path = self.layout.registry_path(kind);
            let outcome = ensure_library_entry(&path, kind, &name, &uri)
                .with_context(|| format!("Could not update {}", path.display()))?;
            registries.push((kind, outcome));
        }

        Ok(BuildReport {
            parts,
            symbol_library,
            registries,
        })
    }

    fn refresh_library_dir(&self) -> anyhow::Result<()> {
        let lib_dir = self.layout.library_dir();
        if lib_dir.exists() {
            log::debug!("Removing {}", lib_dir.display());
            fs::remove_dir_all(&lib_dir)
                .with_context(|| format!("Could not remove {}", lib_dir.display()))?;
        }
        for dir in [self.layout.footprint_dir(), self.layout.model_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Could not create {}", dir.display()))?;
        }
        Ok(())
    }

    fn build_part(&self, ipn: &str, state: &mut BuildState<'g, G>) -> Result<BuiltPart, PartFailure> {
        let id = state.fetcher.fetch(ipn, &mut state.store)?;
        let resolver = VariantResolver::new(&state.store);
        let record = state
            .store
            .get(id)
            .ok_or_else(|| PartFailure::Catalog(CatalogError::not_found(ipn)))?;
        let mut notes = Vec::new();

        let mandatory = |tag: &'static str| {
            resolver
                .resolve_asset(id, tag)
                .map(|found| found.value)
                .map_err(|source| PartFailure::MissingAsset { tag, source })
        };
        let footprint_asset = mandatory(FOOTPRINT_TAG)?;
        let symbol_asset = mandatory(SYMBOL_TAG)?;

        let footprint_path = self.download(FOOTPRINT_TAG, AssetKind::Footprint, footprint_asset)?;
        let symbol_path = self.download(SYMBOL_TAG, AssetKind::Symbol, symbol_asset)?;
        let model_path = match resolver.resolve_asset(id, MODEL_TAG) {
            Ok(found) => match self.download(MODEL_TAG, AssetKind::Model, found.value) {
                Ok(path) => Some(path),
                Err(err) => {
                    log::warn!("{ipn}: {err}");
                    notes.push("3D model download failed".to_string());
                    None
                }
            },
            Err(err) => {
                log::warn!("No 3D model found for part {ipn}: {err}");
                notes.push("no 3D model".to_string());
                None
            }
        };

        // Symbol
        let symbol_lib = parse_symbol_library(&symbol_path).map_err(|source| {
            PartFailure::MalformedAsset {
                what: "symbol library",
                source,
            }
        })?;
        let symbol_version = symbol_lib.version().unwrap_or(MIN_SYMBOL_LIB_VERSION);
        let mut symbols = symbol_lib.into_symbols();
        if symbols.len() != 1 {
            return Err(match symbols.len() {
                0 => PartFailure::MalformedSymbol {
                    reason: "symbol file holds no symbol".to_string(),
                },
                count => PartFailure::MultipleSymbols { count },
            });
        }
        let symbol = symbols.remove(0);

        let library_id = match record.parameter(SCHEMATIC_ID_PARAMETER) {
            Some(schematic_id) if !schematic_id.trim().is_empty() => schematic_id.trim(),
            _ => {
                log::warn!("Part {ipn} has no schematic identifier set, using its IPN");
                notes.push("no schematic identifier, using IPN".to_string());
                record.ipn.as_str()
            }
        }
        .replace('/', "_");
        if let Some(owner) = state.library_ids.get(&library_id) {
            return Err(PartFailure::DuplicateLibraryId {
                id: library_id,
                owner: owner.clone(),
            });
        }

        let footprint_stem = footprint_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let datasheet = self.datasheet_url(record);
        let symbol = self.rewrite_symbol(symbol, &library_id, &footprint_stem, &datasheet, record)?;

        // Footprint
        let mut footprint = parse_footprint(&footprint_path).map_err(|source| {
            PartFailure::MalformedAsset {
                what: "footprint",
                source,
            }
        })?;
        footprint.clear_models();

        let mut model_name = None;
        if let Some(model_path) = &model_path {
            let name = file_name(model_path);
            let mut model = Model3d::new(self.layout.model_uri(&name));
            apply_transforms(&resolver, id, &mut model);
            log::info!("Path of 3D model for {ipn} is {}", model.path);
            footprint.add_model(&model);
            model_name = Some(name);
        }

        // Everything validated; write this part's files.
        let footprint_file = format!("{footprint_stem}.kicad_mod");
        let model_copy = model_path
            .as_deref()
            .zip(model_name.as_ref().map(|name| self.layout.model_dir().join(name)));
        install_part_files(
            &footprint,
            &self.layout.footprint_dir().join(&footprint_file),
            model_copy,
        )?;

        state.version = state.version.max(symbol_version);
        state.symbols.push(symbol);
        state
            .library_ids
            .insert(library_id.clone(), ipn.to_string());

        Ok(BuiltPart {
            library_id,
            footprint: footprint_file,
            model: model_name,
            notes,
        })
    }

    fn download(
        &self,
        tag: &'static str,
        kind: AssetKind,
        attachment: &Attachment,
    ) -> Result<PathBuf, PartFailure> {
        let reference = attachment.file.as_deref().unwrap_or_default();
        let url = self.gateway.resolve_url(reference);
        let bytes = self
            .gateway
            .download(&url)
            .map_err(|source| PartFailure::Download {
                tag,
                url: url.clone(),
                source,
            })?;

        let name = if attachment.filename.is_empty() {
            file_name_of(reference)
        } else {
            file_name_of(&attachment.filename)
        };
        let path = self
            .cache
            .store(kind, name, &bytes)
            .map_err(|e| PartFailure::Write {
                what: "asset cache",
                source: e.into(),
            })?;
        log::info!("Downloaded {tag} to {}", path.display());
        Ok(path)
    }

    /// Own `Datasheet` attachment, else the part's link, else empty.
    fn datasheet_url(&self, record: &PartRecord) -> String {
        match record
            .attachment(DATASHEET_TAG)
            .and_then(|a| a.file.as_deref())
        {
            Some(file) => self.gateway.resolve_url(file),
            None => record.link.clone(),
        }
    }

    /// Rename the symbol and replace its properties with the generated set.
    fn rewrite_symbol(
        &self,
        symbol: Sexpr,
        library_id: &str,
        footprint_stem: &str,
        datasheet: &str,
        record: &PartRecord,
    ) -> Result<Sexpr, PartFailure> {
        let SexprKind::List(mut items) = symbol.kind else {
            return Err(PartFailure::MalformedSymbol {
                reason: "symbol is not a list".to_string(),
            });
        };
        rename_symbol(&mut items, library_id);

        let mut properties = take_properties(&mut items);
        if properties.len() < 4 {
            return Err(PartFailure::MalformedSymbol {
                reason: format!(
                    "{} properties, expected at least reference, value, footprint and datasheet",
                    properties.len()
                ),
            });
        }
        let package = properties
            .iter()
            .skip(4)
            .position(|p| property_key(p).as_deref() == Some(PACKAGE_PROPERTY))
            .map(|idx| properties.remove(idx + 4));
        properties.truncate(4);

        set_property_value(&mut properties[1], library_id);
        hide_property(&mut properties[1]);

        let footprint_link = format!("{}:{footprint_stem}", self.layout.footprint_lib_name());
        set_property_value(&mut properties[2], &footprint_link);
        set_property_at(&mut properties[2], FOOTPRINT_ANCHOR);
        hide_property(&mut properties[2]);

        set_property_value(&mut properties[3], datasheet);
        set_property_at(&mut properties[3], DATASHEET_ANCHOR);
        hide_property(&mut properties[3]);

        let effects = hidden_effects(property_effects(&properties[2]));
        let values = self.catalog_values(record);
        for (idx, ((key, value), y)) in values.into_iter().zip(CATALOG_PROPERTY_Y).enumerate() {
            properties.push(property_node(
                key,
                &value,
                FIRST_CATALOG_PROPERTY_ID + idx as i64,
                (0.0, y, 0.0),
                Some(effects.clone()),
            ));
        }

        if let Some(mut package) = package {
            set_property_id(&mut package, PACKAGE_PROPERTY_ID);
            properties.push(package);
        }

        insert_properties(&mut items, properties);
        Ok(Sexpr::list(items))
    }

    fn catalog_values(&self, record: &PartRecord) -> [(&str, String); 6] {
        let manufacturer = record.first_manufacturer();
        let supplier = record.first_supplier();
        let or_na = |value: Option<&String>| {
            value
                .map(String::clone)
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };
        [
            (self.fields.ipn.as_str(), record.ipn.clone()),
            (self.fields.manufacturer.as_str(), or_na(manufacturer.map(|m| &m.name))),
            (self.fields.mpn.as_str(), or_na(manufacturer.map(|m| &m.mpn))),
            (self.fields.supplier.as_str(), or_na(supplier.map(|s| &s.name))),
            (self.fields.sku.as_str(), or_na(supplier.map(|s| &s.sku))),
            (self.fields.link.as_str(), or_na(supplier.map(|s| &s.link))),
        ]
    }
}

/// Overlay scale, rotation and offset found along the variant chain.
fn apply_transforms(resolver: &VariantResolver<'_>, id: PartId, model: &mut Model3d) {
    for (name, slot) in [
        (SCALE_PARAMETER, &mut model.scale),
        (ROTATION_PARAMETER, &mut model.rotate),
        (OFFSET_PARAMETER, &mut model.offset),
    ] {
        match resolver.resolve_parameter(id, name) {
            Ok(found) => {
                log::info!("Using {name} {:?} from part {}", found.value, found.owner);
                *slot = found.value;
            }
            Err(err) => log::debug!("{err}"),
        }
    }
}

/// Write the footprint, then copy its model. A failed copy removes the footprint again.
fn install_part_files(
    footprint: &Footprint,
    footprint_path: &Path,
    model: Option<(&Path, PathBuf)>,
) -> Result<(), PartFailure> {
    footprint
        .write(footprint_path)
        .map_err(|e| PartFailure::Write {
            what: "footprint",
            source: e.into(),
        })?;

    if let Some((source, target)) = model {
        if let Err(err) = fs::copy(source, &target) {
            if let Err(cleanup) = fs::remove_file(footprint_path) {
                log::warn!("Could not remove {}: {cleanup}", footprint_path.display());
            }
            return Err(PartFailure::Write {
                what: "3D model",
                source: err.into(),
            });
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_model_copy_leaves_no_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let footprint = Footprint::parse_str(
            "(footprint \"R_0402\" (layer \"F.Cu\") (attr smd))",
            Path::new("R_0402.kicad_mod"),
        )
        .unwrap();
        let footprint_path = dir.path().join("R_0402.kicad_mod");

        let err = install_part_files(
            &footprint,
            &footprint_path,
            Some((&dir.path().join("absent.step"), dir.path().join("R_0402.step"))),
        )
        .unwrap_err();

        assert!(matches!(err, PartFailure::Write { what: "3D model", .. }));
        assert!(!footprint_path.exists());
        assert!(!dir.path().join("R_0402.step").exists());
    }

    #[test]
    fn footprint_without_model_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let footprint =
            Footprint::parse_str("(footprint \"C_0402\" (layer \"F.Cu\"))", Path::new("C.kicad_mod"))
                .unwrap();
        let footprint_path = dir.path().join("C_0402.kicad_mod");

        install_part_files(&footprint, &footprint_path, None).unwrap();
        assert!(footprint_path.exists());
    }

    #[test]
    fn default_field_names() {
        let fields = FieldNames::default();
        assert_eq!(fields.ipn, "Internal Nr.");
        assert_eq!(fields.sku, "Order Nr.");
    }
}
