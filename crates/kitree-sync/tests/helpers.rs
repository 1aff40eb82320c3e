#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use kitree_catalog::{
    Attachment, BomLine, BomLineId, CatalogError, CatalogGateway, Company, CompanyId,
    ManufacturerPart, NewBomLine, Parameter, Part, PartId, SupplierPart,
    records::ParameterTemplate,
};

pub const BASE_URL: &str = "https://parts.test";

/// In-memory catalog that records every write made through it.
#[derive(Default)]
pub struct FakeCatalog {
    pub parts: Vec<Part>,
    pub attachments: HashMap<PartId, Vec<Attachment>>,
    pub parameters: HashMap<PartId, Vec<Parameter>>,
    pub boms: RefCell<HashMap<PartId, Vec<BomLine>>>,
    pub manufacturer_parts: HashMap<PartId, Vec<ManufacturerPart>>,
    pub supplier_parts: HashMap<String, Vec<SupplierPart>>,
    pub companies: HashMap<CompanyId, String>,
    /// File contents served by `download`, keyed by absolute URL.
    pub files: HashMap<String, Vec<u8>>,

    pub created: RefCell<Vec<NewBomLine>>,
    pub deleted: RefCell<Vec<BomLineId>>,
    pub downloads: RefCell<Vec<String>>,
    /// Sub-part ids whose BOM line creation is rejected.
    pub reject_lines_for: Vec<PartId>,
    /// BOM line ids whose deletion is rejected.
    pub reject_deletes_of: Vec<BomLineId>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(&mut self, pk: PartId, ipn: &str, variant_of: Option<PartId>) -> &mut Self {
        self.parts.push(Part {
            pk,
            ipn: ipn.to_string(),
            name: format!("{ipn} name"),
            link: String::new(),
            variant_of,
            active: true,
        });
        self
    }

    /// Attach a file tagged `tag` to part `pk` and serve `contents` for it.
    pub fn attach(&mut self, pk: PartId, tag: &str, file_name: &str, contents: &str) -> &mut Self {
        let reference = format!("/media/attachments/part/{pk}/{file_name}");
        self.files
            .insert(format!("{BASE_URL}{reference}"), contents.as_bytes().to_vec());
        let attachments = self.attachments.entry(pk).or_default();
        attachments.push(Attachment {
            pk: pk * 100 + attachments.len() as u64,
            file: Some(reference),
            filename: file_name.to_string(),
            tag: tag.to_string(),
        });
        self
    }

    pub fn parameter(&mut self, pk: PartId, name: &str, data: &str) -> &mut Self {
        let parameters = self.parameters.entry(pk).or_default();
        parameters.push(Parameter {
            pk: pk * 100 + parameters.len() as u64,
            template_detail: ParameterTemplate {
                name: name.to_string(),
                units: String::new(),
            },
            data: data.to_string(),
        });
        self
    }

    pub fn bom_line(&mut self, master: PartId, pk: BomLineId, sub_part: PartId) -> &mut Self {
        self.boms.get_mut().entry(master).or_default().push(BomLine {
            pk,
            sub_part,
            quantity: 1.0,
            reference: String::new(),
        });
        self
    }

    /// Manufacturer part `mpn` of `part`, sold by each `(supplier, sku)`.
    pub fn sourcing(
        &mut self,
        part: PartId,
        manufacturer: (CompanyId, &str),
        mpn: &str,
        suppliers: &[(CompanyId, &str, &str)],
    ) -> &mut Self {
        self.companies
            .insert(manufacturer.0, manufacturer.1.to_string());
        let mps = self.manufacturer_parts.entry(part).or_default();
        mps.push(ManufacturerPart {
            pk: part * 10 + mps.len() as u64,
            manufacturer: manufacturer.0,
            mpn: mpn.to_string(),
        });
        for (idx, (company, name, sku)) in suppliers.iter().enumerate() {
            self.companies.insert(*company, name.to_string());
            self.supplier_parts
                .entry(mpn.to_string())
                .or_default()
                .push(SupplierPart {
                    pk: idx as u64,
                    supplier: *company,
                    sku: sku.to_string(),
                    link: format!("https://{}.test/{sku}", name.to_lowercase()),
                });
        }
        self
    }
}

impl CatalogGateway for FakeCatalog {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn part_by_ipn(&self, ipn: &str) -> Result<Part, CatalogError> {
        let matches: Vec<_> = self
            .parts
            .iter()
            .filter(|p| p.ipn == ipn && p.active)
            .collect();
        match matches.as_slice() {
            [part] => Ok((*part).clone()),
            [] => Err(CatalogError::not_found(format!("part {ipn}"))),
            _ => Err(CatalogError::Ambiguous {
                ipn: ipn.to_string(),
                count: matches.len(),
            }),
        }
    }

    fn part_by_id(&self, id: PartId) -> Result<Part, CatalogError> {
        self.parts
            .iter()
            .find(|p| p.pk == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found(format!("part {id}")))
    }

    fn attachments(&self, part: PartId) -> Result<Vec<Attachment>, CatalogError> {
        Ok(self.attachments.get(&part).cloned().unwrap_or_default())
    }

    fn parameters(&self, part: PartId) -> Result<Vec<Parameter>, CatalogError> {
        Ok(self.parameters.get(&part).cloned().unwrap_or_default())
    }

    fn bom(&self, part: PartId) -> Result<Vec<BomLine>, CatalogError> {
        Ok(self.boms.borrow().get(&part).cloned().unwrap_or_default())
    }

    fn manufacturer_parts(&self, part: PartId) -> Result<Vec<ManufacturerPart>, CatalogError> {
        Ok(self
            .manufacturer_parts
            .get(&part)
            .cloned()
            .unwrap_or_default())
    }

    fn supplier_parts(&self, mpn: &str) -> Result<Vec<SupplierPart>, CatalogError> {
        Ok(self.supplier_parts.get(mpn).cloned().unwrap_or_default())
    }

    fn company(&self, id: CompanyId) -> Result<Company, CatalogError> {
        self.companies
            .get(&id)
            .map(|name| Company {
                pk: id,
                name: name.clone(),
            })
            .ok_or_else(|| CatalogError::not_found(format!("company {id}")))
    }

    fn create_bom_line(
        &self,
        master: PartId,
        sub_part: PartId,
        quantity: f64,
        reference: &str,
    ) -> Result<(), CatalogError> {
        if self.reject_lines_for.contains(&sub_part) {
            return Err(CatalogError::Http {
                status: 400,
                url: format!("{BASE_URL}/api/bom/"),
            });
        }
        let mut created = self.created.borrow_mut();
        created.push(NewBomLine {
            part: master,
            sub_part,
            quantity,
            reference: reference.to_string(),
        });
        self.boms.borrow_mut().entry(master).or_default().push(BomLine {
            pk: 1000 + created.len() as u64,
            sub_part,
            quantity,
            reference: reference.to_string(),
        });
        Ok(())
    }

    fn delete_bom_line(&self, id: BomLineId) -> Result<(), CatalogError> {
        if self.reject_deletes_of.contains(&id) {
            return Err(CatalogError::Http {
                status: 403,
                url: format!("{BASE_URL}/api/bom/{id}/"),
            });
        }
        for lines in self.boms.borrow_mut().values_mut() {
            lines.retain(|line| line.pk != id);
        }
        self.deleted.borrow_mut().push(id);
        Ok(())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.downloads.borrow_mut().push(url.to_string());
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::Http {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// A `.kicad_sym` file holding one symbol per name, each with the four
/// mandatory properties and a `Package` property.
pub fn symbol_file(names: &[&str]) -> String {
    let mut out = String::from("(kicad_symbol_lib (version 20211014) (generator kicad_symbol_editor)\n");
    for name in names {
        out.push_str(&format!(
            r#"  (symbol "{name}" (in_bom yes) (on_board yes)
    (property "Reference" "R" (id 0) (at 2.032 0 90) (effects (font (size 1.27 1.27))))
    (property "Value" "{name}" (id 1) (at 0 0 90) (effects (font (size 1.27 1.27))))
    (property "Footprint" "" (id 2) (at -1.778 0 90) (effects (font (size 1.27 1.27)) hide))
    (property "Datasheet" "~" (id 3) (at 0 0 0) (effects (font (size 1.27 1.27)) hide))
    (property "Package" "0402" (id 4) (at 0 0 0) (effects (font (size 1.27 1.27)) hide))
    (symbol "{name}_0_1" (rectangle (start -1.016 -2.54) (end 1.016 2.54)))
    (symbol "{name}_1_1" (pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1")))
  )
"#
        ));
    }
    out.push_str(")\n");
    out
}

pub fn footprint_file(name: &str) -> String {
    format!(
        r#"(footprint "{name}" (version 20211014) (generator pcbnew)
  (layer "F.Cu")
  (attr smd)
  (fp_text reference "REF**" (at 0 -1.17) (layer "F.SilkS"))
  (pad "1" smd roundrect (at -0.485 0) (size 0.59 0.64) (layers "F.Cu" "F.Paste" "F.Mask"))
  (model "${{KICAD6_3DMODEL_DIR}}/Resistor_SMD.3dshapes/{name}.wrl"
    (offset (xyz 0 0 0))
    (scale (xyz 1 1 1))
    (rotate (xyz 0 0 0))
  )
)
"#
    )
}

/// Create an empty KiCad project `name` inside `dir`.
pub fn write_project(dir: &Path, name: &str) {
    fs::write(dir.join(format!("{name}.kicad_pro")), "{}\n").unwrap();
}
