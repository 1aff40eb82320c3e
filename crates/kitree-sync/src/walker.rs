//! Map catalog IPNs to the design references that use them.
//!
//! Schematics are walked through the root's instance table, loading child
//! sheets on first use. Boards are flat and walked placement by placement.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

use kitree_sexpr::board::{BoardDocument, MountTechnology, Placement};
use kitree_sexpr::kicad::{SchematicDocument, parse_schematic};
use thiserror::Error;

/// IPN to references, in the order the design lists them.
pub type ReferenceMap = BTreeMap<String, Vec<String>>;

/// References starting with this prefix belong to power symbols.
pub const POWER_REFERENCE_PREFIX: &str = "#PWR";

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("{}: instance path {path:?} has no separator", file.display())]
    MalformedInstancePath { file: PathBuf, path: String },
}

/// Which mounting technologies a board walk accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountMask {
    pub smd: bool,
    pub through_hole: bool,
}

impl MountMask {
    pub const ALL: MountMask = MountMask {
        smd: true,
        through_hole: true,
    };
    pub const SMD_ONLY: MountMask = MountMask {
        smd: true,
        through_hole: false,
    };

    pub fn accepts(self, mount: Option<MountTechnology>) -> bool {
        match mount {
            Some(MountTechnology::Smd) => self.smd,
            Some(MountTechnology::ThroughHole) => self.through_hole,
            None => false,
        }
    }
}

enum Visit {
    Recorded,
    Excluded,
    Missing,
}

pub struct DesignWalker {
    allowed: BTreeSet<String>,
    ipn_key: String,
}

impl DesignWalker {
    /// Walker that only records IPNs from `allowed`, read from property `ipn_key`.
    pub fn new<I, S>(allowed: I, ipn_key: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            ipn_key: ipn_key.into(),
        }
    }

    /// Walk the sheet hierarchy below `root`.
    ///
    /// Missing components and unloadable sheets are logged and skipped; only
    /// a malformed instance path aborts the walk.
    pub fn walk(&self, root: &SchematicDocument) -> Result<ReferenceMap, WalkError> {
        let mut map = ReferenceMap::new();
        let mut sheets = SheetCache::new(root);

        for entry in &root.instances {
            let Some((sheet_path, component_id)) = entry.split() else {
                return Err(WalkError::MalformedInstancePath {
                    file: root.path.clone(),
                    path: entry.path.clone(),
                });
            };

            let visit = if sheet_path.is_empty() {
                self.visit(root, component_id, &entry.reference, &mut map)
            } else {
                match sheets.resolve(sheet_path) {
                    Some(sheet) => self.visit(&sheet, component_id, &entry.reference, &mut map),
                    None => continue,
                }
            };

            if let Visit::Missing = visit {
                log::error!(
                    "Could not find symbol {} ({}) in its schematic",
                    entry.path,
                    entry.reference
                );
            }
        }

        Ok(map)
    }

    fn visit(
        &self,
        doc: &SchematicDocument,
        component_id: &str,
        reference: &str,
        map: &mut ReferenceMap,
    ) -> Visit {
        let Some(component) = doc.component(component_id) else {
            return Visit::Missing;
        };
        let lib_id = component.lib_id.as_deref().unwrap_or("?");

        if !component.in_bom {
            log::info!("Symbol {lib_id} ({reference}) skipped as it is not marked in_bom");
            return Visit::Excluded;
        }
        if component.unit != 1 || reference.starts_with(POWER_REFERENCE_PREFIX) {
            log::info!("Skipping {reference} as it is either a power symbol or a secondary unit");
            return Visit::Excluded;
        }
        let Some(ipn) = component.property(&self.ipn_key) else {
            log::warn!("Skipping symbol {lib_id} ({reference}) as it has no IPN assigned");
            return Visit::Excluded;
        };
        if self.record(ipn, reference, map) {
            Visit::Recorded
        } else {
            Visit::Excluded
        }
    }

    fn record(&self, ipn: &str, reference: &str, map: &mut ReferenceMap) -> bool {
        if !self.allowed.contains(ipn) {
            log::info!("Skipping {ipn} ({reference}) as it is not on the project's part list");
            return false;
        }
        let references = map.entry(ipn.to_string()).or_default();
        if !references.iter().any(|r| r == reference) {
            references.push(reference.to_string());
            log::info!("Added {ipn} ({reference}) to the parts list");
        }
        true
    }

    /// Placements of `board` that pass the board filters and `mask`, paired
    /// with their allow-listed IPN.
    pub fn select_placements<'b>(
        &self,
        board: &'b BoardDocument,
        mask: MountMask,
    ) -> Vec<(&'b str, &'b Placement)> {
        let mut selected = Vec::new();
        for placement in &board.placements {
            let reference = placement.reference.as_str();
            if placement.board_only {
                log::info!("Skipping {reference} as it only exists on the board");
                continue;
            }
            if placement.exclude_from_bom {
                log::info!("Skipping {reference} as it is excluded from the BOM");
                continue;
            }
            if placement.exclude_from_pos_files {
                log::info!("Skipping {reference} as it is excluded from position files");
                continue;
            }
            if !mask.accepts(placement.mount) {
                log::info!(
                    "Skipping {reference} as its mounting technology ({:?}) is not selected",
                    placement.mount
                );
                continue;
            }
            let Some(ipn) = placement.property(&self.ipn_key) else {
                log::warn!("Skipping {reference} as it has no IPN assigned");
                continue;
            };
            if !self.allowed.contains(ipn) {
                log::info!("Skipping {ipn} ({reference}) as it is not on the project's part list");
                continue;
            }
            selected.push((ipn, placement));
        }
        selected
    }

    /// Flat walk over board placements.
    pub fn enumerate_board(&self, board: &BoardDocument, mask: MountMask) -> ReferenceMap {
        let mut map = ReferenceMap::new();
        for (ipn, placement) in self.select_placements(board, mask) {
            self.record(ipn, &placement.reference, &mut map);
        }
        map
    }
}

/// Child sheets loaded during one walk, keyed by sheet path (`/A`, `/A/B`).
struct SheetCache<'r> {
    root: &'r SchematicDocument,
    loaded: HashMap<String, Option<Rc<SchematicDocument>>>,
}

impl<'r> SheetCache<'r> {
    fn new(root: &'r SchematicDocument) -> Self {
        Self {
            root,
            loaded: HashMap::new(),
        }
    }

    /// Document at `sheet_path`, loading every sheet along the way once.
    /// `None` means the branch is unusable and has already been logged.
    fn resolve(&mut self, sheet_path: &str) -> Option<Rc<SchematicDocument>> {
        if let Some(hit) = self.loaded.get(sheet_path) {
            return hit.clone();
        }

        let (parent_path, sheet_id) = sheet_path.rsplit_once('/').unwrap_or(("", sheet_path));
        let loaded = if parent_path.is_empty() {
            load_child(self.root, sheet_path, sheet_id)
        } else {
            self.resolve(parent_path)
                .and_then(|parent| load_child(&parent, sheet_path, sheet_id))
        };

        self.loaded.insert(sheet_path.to_string(), loaded.clone());
        loaded
    }
}

fn load_child(
    parent: &SchematicDocument,
    sheet_path: &str,
    sheet_id: &str,
) -> Option<Rc<SchematicDocument>> {
    let Some(link) = parent.sheet(sheet_id) else {
        log::error!(
            "No sheet for {sheet_path} found in {}",
            parent.path.display()
        );
        return None;
    };
    let file = parent.sheet_file_path(link);
    match parse_schematic(&file) {
        Ok(doc) => {
            log::debug!("Loaded sheet {sheet_path} from {}", file.display());
            Some(Rc::new(doc))
        }
        Err(err) => {
            log::error!("Skipping every component below sheet {sheet_path}: {err}");
            None
        }
    }
}
