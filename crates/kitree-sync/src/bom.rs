//! Mirror a project's schematic into the BOM of its master part.
//!
//! The master BOM is owned by this synchronizer: every existing line is
//! deleted before the schematic is walked, then one line is created per IPN
//! with the number of references as quantity.

use std::path::Path;

use anyhow::Context;
use kitree_catalog::{CatalogError, CatalogGateway, PartId};
use kitree_sexpr::kicad::parse_schematic;

use crate::walker::{DesignWalker, ReferenceMap};

/// Separator between designators in a BOM line's reference field.
pub const REFERENCE_SEPARATOR: &str = ", ";

#[derive(Debug)]
pub struct LineResult {
    pub ipn: String,
    pub quantity: usize,
    pub reference: String,
    pub outcome: Result<(), CatalogError>,
}

#[derive(Debug)]
pub struct SyncReport {
    pub master: PartId,
    /// Lines removed from the master BOM before the walk.
    pub deleted: usize,
    pub references: ReferenceMap,
    pub lines: Vec<LineResult>,
}

impl SyncReport {
    pub fn failed(&self) -> impl Iterator<Item = &LineResult> {
        self.lines.iter().filter(|line| line.outcome.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

pub struct BomSynchronizer<'g, G: CatalogGateway + ?Sized> {
    gateway: &'g G,
    ipn_key: String,
}

impl<'g, G: CatalogGateway + ?Sized> BomSynchronizer<'g, G> {
    pub fn new(gateway: &'g G, ipn_key: impl Into<String>) -> Self {
        Self {
            gateway,
            ipn_key: ipn_key.into(),
        }
    }

    /// Replace the BOM of `master_ipn` with the parts used in `schematic`.
    ///
    /// Only IPNs in `registered` are written. Failing to create a single
    /// line is reported per IPN; every other failure aborts the sync.
    pub fn sync(
        &self,
        master_ipn: &str,
        schematic: &Path,
        registered: &[String],
    ) -> anyhow::Result<SyncReport> {
        let master = self
            .gateway
            .part_by_ipn(master_ipn)
            .with_context(|| format!("Master part {master_ipn} is not usable"))?;

        let existing = self
            .gateway
            .bom(master.pk)
            .with_context(|| format!("Could not read the BOM of {master_ipn}"))?;
        for line in &existing {
            self.gateway
                .delete_bom_line(line.pk)
                .with_context(|| format!("Could not delete BOM line {} of {master_ipn}", line.pk))?;
        }
        log::info!("Removed {} lines from the BOM of {master_ipn}", existing.len());

        let document = parse_schematic(schematic)?;
        let walker = DesignWalker::new(registered.iter().cloned(), self.ipn_key.as_str());
        let references = walker.walk(&document)?;

        let mut lines = Vec::with_capacity(references.len());
        for (ipn, refs) in &references {
            let reference = refs.join(REFERENCE_SEPARATOR);
            let outcome = self.create_line(master.pk, ipn, refs.len(), &reference);
            match &outcome {
                Ok(()) => log::info!("Added {} x {ipn} ({reference}) to the BOM", refs.len()),
                Err(err) => log::error!("Could not add {ipn} to the BOM: {err}"),
            }
            lines.push(LineResult {
                ipn: ipn.clone(),
                quantity: refs.len(),
                reference,
                outcome,
            });
        }

        Ok(SyncReport {
            master: master.pk,
            deleted: existing.len(),
            references,
            lines,
        })
    }

    fn create_line(
        &self,
        master: PartId,
        ipn: &str,
        quantity: usize,
        reference: &str,
    ) -> Result<(), CatalogError> {
        let sub_part = self.gateway.part_by_ipn(ipn)?;
        self.gateway
            .create_bom_line(master, sub_part.pk, quantity as f64, reference)
    }
}
