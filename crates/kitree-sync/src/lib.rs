//! Resolve KiCad designs against the parts catalog.
//!
//! The crate is built from four pieces that the `kitree` CLI wires together:
//!
//! - [`VariantResolver`] looks up assets and parameters along a part's
//!   `variant_of` chain.
//! - [`DesignWalker`] maps allow-listed IPNs to the references that use them,
//!   over a hierarchical schematic or a flat board.
//! - [`LibraryBuilder`] turns catalog attachments into project-local symbol
//!   and footprint libraries and registers them with KiCad.
//! - [`BomSynchronizer`] rewrites the master part's BOM from the schematic.
//!
//! JLCPCB assembly files are produced by the [`export`] module.

pub mod bom;
pub mod cache;
pub mod error;
pub mod export;
pub mod library;
pub mod part;
pub mod project;
pub mod registry;
pub mod variant;
pub mod walker;

pub use bom::{BomSynchronizer, LineResult, SyncReport};
pub use cache::{AssetCache, AssetKind};
pub use error::{PartFailure, ResolveError};
pub use export::{ExportReport, export_jlc_bom, export_jlc_xy};
pub use library::{BuildReport, BuiltPart, FieldNames, LibraryBuilder, PartResult};
pub use part::{ManufacturerLink, PartFetcher, PartRecord, PartStore, SupplierLink};
pub use project::ProjectLayout;
pub use registry::{RegistryOutcome, ensure_library_entry};
pub use variant::{Resolved, VariantResolver, parse_triple};
pub use walker::{DesignWalker, MountMask, ReferenceMap, WalkError};
