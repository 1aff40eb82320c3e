//! Typed catalog records as returned by the InvenTree REST API.
//!
//! InvenTree sends `null` for many string fields that are merely empty; those
//! are decoded to empty strings so callers never branch on both.

use serde::{Deserialize, Deserializer, Serialize};

pub type PartId = u64;
pub type CompanyId = u64;
pub type BomLineId = u64;

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub pk: PartId,
    #[serde(rename = "IPN", default, deserialize_with = "null_as_default")]
    pub ipn: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Free-text external link, used as a datasheet fallback.
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(default)]
    pub variant_of: Option<PartId>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub pk: u64,
    /// Stored file reference, usually a server-relative `/media/...` path.
    #[serde(rename = "attachment", default)]
    pub file: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    /// Attachment kind (`Symbol`, `Footprint`, `3D-Model`, `Datasheet`, ...).
    #[serde(rename = "comment", default, deserialize_with = "null_as_default")]
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTemplate {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub pk: u64,
    pub template_detail: ParameterTemplate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: String,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.template_detail.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    pub pk: BomLineId,
    pub sub_part: PartId,
    #[serde(deserialize_with = "quantity")]
    pub quantity: f64,
    /// Comma-joined design references.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reference: String,
}

// Older servers render decimals as strings ("2.00000").
fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Quantity {
        Number(f64),
        Text(String),
    }
    match Quantity::deserialize(deserializer)? {
        Quantity::Number(n) => Ok(n),
        Quantity::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Body of `POST bom/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBomLine {
    pub part: PartId,
    pub sub_part: PartId,
    pub quantity: f64,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerPart {
    pub pk: u64,
    pub manufacturer: CompanyId,
    #[serde(rename = "MPN", default, deserialize_with = "null_as_default")]
    pub mpn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPart {
    pub pk: u64,
    pub supplier: CompanyId,
    #[serde(rename = "SKU", default, deserialize_with = "null_as_default")]
    pub sku: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub pk: CompanyId,
    pub name: String,
}

/// List endpoints answer with a bare array, or a page object when a limit is set.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Plain(items) | Listing::Paged { results: items } => items,
        }
    }
}
