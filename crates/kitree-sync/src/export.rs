//! JLCPCB assembly exports: the BOM and the XY placement file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use kitree_catalog::CatalogGateway;
use kitree_sexpr::board::{BoardDocument, Placement, parse_board};

use crate::bom::REFERENCE_SEPARATOR;
use crate::part::{ManufacturerLink, PartFetcher, PartStore, SupplierLink};
use crate::project::ProjectLayout;
use crate::walker::{DesignWalker, MountMask};

/// Supplier names JLCPCB assembly can source from.
pub const JLC_SUPPLIERS: [&str; 2] = ["LCSC", "JLCPCB"];

const BOM_HEADER: [&str; 5] = ["MPN", "Comment", "Designator", "Footprint", "JLCPCB Part #"];
const XY_HEADER: [&str; 5] = ["Designator", "Mid X", "Mid Y", "Layer", "Rotation"];
const UNKNOWN_FOOTPRINT: &str = "n.a.";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
    /// IPNs or designators left out, with the reason.
    pub skipped: Vec<(String, String)>,
}

pub fn jlc_bom_path(layout: &ProjectLayout, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}_jlc_bom.csv", layout.name))
}

pub fn jlc_xy_path(layout: &ProjectLayout, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}_jlc_xy.csv", layout.name))
}

/// Write `<project>_jlc_bom.csv`: one row per SMD part with a JLC-sourceable
/// manufacturer part.
pub fn export_jlc_bom<G: CatalogGateway + ?Sized>(
    gateway: &G,
    layout: &ProjectLayout,
    walker: &DesignWalker,
    out_dir: &Path,
) -> anyhow::Result<ExportReport> {
    let path = jlc_bom_path(layout, out_dir);
    log::info!("Starting JLCPCB BOM export to {}", path.display());

    let board = load_board(layout)?;
    let placements = walker.select_placements(&board, MountMask::SMD_ONLY);
    let references = walker.enumerate_board(&board, MountMask::SMD_ONLY);

    let mut fetcher = PartFetcher::new(gateway);
    let mut store = PartStore::new();
    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (ipn, designators) in &references {
        let fetched = fetcher
            .fetch(ipn, &mut store)
            .map_err(|err| err.to_string())
            .and_then(|id| {
                store
                    .get(id)
                    .ok_or_else(|| format!("record of part {id} missing after fetch"))
            });
        let record = match fetched {
            Ok(record) => record,
            Err(reason) => {
                log::error!("Part {ipn} not usable from the catalog: {reason}");
                skipped.push((ipn.clone(), reason));
                continue;
            }
        };
        let Some((manufacturer, supplier)) = jlc_source(&record.manufacturers) else {
            log::warn!("No part with JLCPCB supplier found for {ipn}");
            skipped.push((ipn.clone(), "no LCSC or JLCPCB supplier".to_string()));
            continue;
        };

        let footprint = designators
            .first()
            .and_then(|first| placements.iter().find(|(_, p)| &p.reference == first))
            .and_then(|(_, p)| p.footprint_name())
            .unwrap_or(UNKNOWN_FOOTPRINT);

        let mut designators = designators.clone();
        designators.sort_by(|a, b| natord::compare(a, b));

        rows.push([
            manufacturer.mpn.clone(),
            record.name.clone(),
            designators.join(REFERENCE_SEPARATOR),
            footprint.to_string(),
            supplier.sku.clone(),
        ]);
    }

    write_csv(&path, &layout.name, BOM_HEADER, &rows)?;
    log::info!("Successfully exported JLCPCB BOM to {}", path.display());
    Ok(ExportReport {
        path,
        rows: rows.len(),
        skipped,
    })
}

/// Write `<project>_jlc_xy.csv`: one row per SMD placement of an allow-listed part.
pub fn export_jlc_xy(
    layout: &ProjectLayout,
    walker: &DesignWalker,
    out_dir: &Path,
) -> anyhow::Result<ExportReport> {
    let path = jlc_xy_path(layout, out_dir);
    log::info!("Starting JLCPCB XY position export to {}", path.display());

    let board = load_board(layout)?;
    let rows: Vec<_> = walker
        .select_placements(&board, MountMask::SMD_ONLY)
        .into_iter()
        .map(|(_, placement)| xy_row(placement))
        .collect();

    write_csv(&path, &layout.name, XY_HEADER, &rows)?;
    log::info!("Successfully exported JLCPCB XY data to {}", path.display());
    Ok(ExportReport {
        path,
        rows: rows.len(),
        skipped: Vec::new(),
    })
}

fn load_board(layout: &ProjectLayout) -> anyhow::Result<BoardDocument> {
    let path = layout.board();
    parse_board(&path).with_context(|| {
        format!(
            "Could not parse board of project {} at {}",
            layout.name,
            path.display()
        )
    })
}

/// First manufacturer part that has a supplier JLCPCB can order from.
fn jlc_source(manufacturers: &[ManufacturerLink]) -> Option<(&ManufacturerLink, &SupplierLink)> {
    manufacturers.iter().find_map(|manufacturer| {
        manufacturer
            .suppliers
            .iter()
            .find(|s| JLC_SUPPLIERS.contains(&s.name.as_str()))
            .map(|supplier| (manufacturer, supplier))
    })
}

fn xy_row(placement: &Placement) -> [String; 5] {
    let layer = if placement.is_top() { "Top" } else { "Bottom" };
    [
        placement.reference.clone(),
        placement.at.x.to_string(),
        placement.at.y.to_string(),
        layer.to_string(),
        placement.at.rot.to_string(),
    ]
}

fn write_csv(
    path: &Path,
    project: &str,
    header: [&str; 5],
    rows: &[[String; 5]],
) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .flexible(true)
        .from_writer(Vec::new());

    let exported = format!(
        ";Exported with KiTree {} at {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    writer.write_record([exported])?;
    writer.write_record([format!(";Project name: {project}")])?;
    writer.write_record(["sep=,"])?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().context("Could not flush CSV data")?;

    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| std::io::Write::write_all(f, &bytes))
        .with_context(|| format!("Could not write to CSV file {}", path.display()))?;
    Ok(())
}
