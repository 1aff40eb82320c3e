//! Access to the InvenTree parts catalog.
//!
//! The pipelines in `kitree-sync` only ever see the [`CatalogGateway`] trait;
//! [`InvenTreeClient`] is the production implementation and tests substitute
//! an in-memory double.

mod client;
mod error;
pub mod records;

pub use client::{Credentials, InvenTreeClient};
pub use error::CatalogError;
pub use records::{
    Attachment, BomLine, BomLineId, Company, CompanyId, ManufacturerPart, NewBomLine, Parameter,
    Part, PartId, SupplierPart,
};

/// Typed catalog operations used by the library build and BOM sync.
///
/// Lists that the server reports as absent are returned empty.
pub trait CatalogGateway {
    /// Server root, e.g. `https://parts.example.com`.
    fn base_url(&self) -> &str;

    /// The single active part with this IPN.
    ///
    /// Fails with [`CatalogError::NotFound`] for zero matches and
    /// [`CatalogError::Ambiguous`] for more than one.
    fn part_by_ipn(&self, ipn: &str) -> Result<Part, CatalogError>;

    fn part_by_id(&self, id: PartId) -> Result<Part, CatalogError>;

    fn attachments(&self, part: PartId) -> Result<Vec<Attachment>, CatalogError>;

    fn parameters(&self, part: PartId) -> Result<Vec<Parameter>, CatalogError>;

    fn bom(&self, part: PartId) -> Result<Vec<BomLine>, CatalogError>;

    fn manufacturer_parts(&self, part: PartId) -> Result<Vec<ManufacturerPart>, CatalogError>;

    fn supplier_parts(&self, mpn: &str) -> Result<Vec<SupplierPart>, CatalogError>;

    fn company(&self, id: CompanyId) -> Result<Company, CatalogError>;

    fn create_bom_line(
        &self,
        master: PartId,
        sub_part: PartId,
        quantity: f64,
        reference: &str,
    ) -> Result<(), CatalogError>;

    fn delete_bom_line(&self, id: BomLineId) -> Result<(), CatalogError>;

    fn download(&self, url: &str) -> Result<Vec<u8>, CatalogError>;

    /// Absolute URL for a stored file reference of this catalog.
    fn resolve_url(&self, reference: &str) -> String {
        join_url(self.base_url(), reference)
    }
}

/// Join a server-relative reference onto `base`. Absolute URLs pass through.
pub fn join_url(base: &str, reference: &str) -> String {
    if url::Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    let base = base.trim_end_matches('/');
    if reference.starts_with('/') {
        format!("{base}{reference}")
    } else {
        format!("{base}/{reference}")
    }
}
