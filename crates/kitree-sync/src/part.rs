//! Catalog part records assembled from several gateway calls.

use std::collections::HashMap;

use kitree_catalog::{
    Attachment, BomLine, CatalogError, CatalogGateway, CompanyId, Parameter, Part, PartId,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SupplierLink {
    pub name: String,
    pub sku: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManufacturerLink {
    pub name: String,
    pub mpn: String,
    pub suppliers: Vec<SupplierLink>,
}

/// Everything the pipelines need to know about one catalog part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRecord {
    pub id: PartId,
    pub ipn: String,
    pub name: String,
    pub link: String,
    pub variant_of: Option<PartId>,
    pub attachments: Vec<Attachment>,
    pub parameters: Vec<Parameter>,
    pub bom: Vec<BomLine>,
    pub manufacturers: Vec<ManufacturerLink>,
}

impl PartRecord {
    /// Bare record without any attached lists.
    pub fn new(part: Part) -> Self {
        Self {
            id: part.pk,
            ipn: part.ipn,
            name: part.name,
            link: part.link,
            variant_of: part.variant_of,
            attachments: Vec::new(),
            parameters: Vec::new(),
            bom: Vec::new(),
            manufacturers: Vec::new(),
        }
    }

    /// First attachment of this part (not its parents) tagged `tag` that has a stored file.
    pub fn attachment(&self, tag: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.tag == tag && a.file.is_some())
    }

    /// Raw value of this part's own parameter `name`. Parents are not consulted.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.data.as_str())
    }

    pub fn first_manufacturer(&self) -> Option<&ManufacturerLink> {
        self.manufacturers.first()
    }

    pub fn first_supplier(&self) -> Option<&SupplierLink> {
        self.first_manufacturer()?.suppliers.first()
    }
}

/// Records fetched during one pipeline run, keyed by catalog id.
///
/// Variant parents live next to their children so lookups can follow
/// `variant_of` without further catalog calls.
#[derive(Debug, Default)]
pub struct PartStore {
    parts: HashMap<PartId, PartRecord>,
}

impl PartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PartId) -> Option<&PartRecord> {
        self.parts.get(&id)
    }

    pub fn contains(&self, id: PartId) -> bool {
        self.parts.contains_key(&id)
    }

    pub fn insert(&mut self, record: PartRecord) {
        self.parts.insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Fetches part records with their variant parents, memoising company names.
pub struct PartFetcher<'g, G: CatalogGateway + ?Sized> {
    gateway: &'g G,
    companies: HashMap<CompanyId, String>,
}

impl<'g, G: CatalogGateway + ?Sized> PartFetcher<'g, G> {
    pub fn new(gateway: &'g G) -> Self {
        Self {
            gateway,
            companies: HashMap::new(),
        }
    }

    /// Look up the unique active part `ipn` and load it plus its variant chain
    /// into `store`. Returns the part's id.
    pub fn fetch(&mut self, ipn: &str, store: &mut PartStore) -> Result<PartId, CatalogError> {
        let part = self.gateway.part_by_ipn(ipn)?;
        let id = part.pk;
        if !store.contains(id) {
            let record = self.load(part)?;
            store.insert(record);
        }

        let mut next = store.get(id).and_then(|r| r.variant_of);
        while let Some(parent_id) = next {
            // Already loaded, either as an earlier part or through a cycle.
            if store.contains(parent_id) {
                break;
            }
            log::debug!("Fetching variant parent {parent_id} of {ipn}");
            let record = self.load(self.gateway.part_by_id(parent_id)?)?;
            next = record.variant_of;
            store.insert(record);
        }

        Ok(id)
    }

    fn load(&mut self, part: Part) -> Result<PartRecord, CatalogError> {
        let mut record = PartRecord::new(part);
        record.attachments = self.gateway.attachments(record.id)?;
        record.parameters = self.gateway.parameters(record.id)?;
        record.bom = self.gateway.bom(record.id)?;

        for mp in self.gateway.manufacturer_parts(record.id)? {
            let suppliers = self
                .gateway
                .supplier_parts(&mp.mpn)?
                .into_iter()
                .map(|sp| {
                    Ok(SupplierLink {
                        name: self.company_name(sp.supplier)?,
                        sku: sp.sku,
                        link: sp.link,
                    })
                })
                .collect::<Result<Vec<_>, CatalogError>>()?;
            record.manufacturers.push(ManufacturerLink {
                name: self.company_name(mp.manufacturer)?,
                mpn: mp.mpn,
                suppliers,
            });
        }

        Ok(record)
    }

    fn company_name(&mut self, id: CompanyId) -> Result<String, CatalogError> {
        if let Some(name) = self.companies.get(&id) {
            return Ok(name.clone());
        }
        let name = self.gateway.company(id)?.name;
        self.companies.insert(id, name.clone());
        Ok(name)
    }
}
