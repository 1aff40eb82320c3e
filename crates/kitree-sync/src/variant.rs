//! Waterfall lookups along the `variant_of` chain.
//!
//! A variant inherits every attachment and parameter it does not define
//! itself. Lookups start at the requested part and climb towards the root of
//! the variant tree, returning the first usable match.

use std::collections::HashSet;

use kitree_catalog::{Attachment, PartId};

use crate::error::ResolveError;
use crate::part::{PartRecord, PartStore};

pub const SCALE_PARAMETER: &str = "3DModel Scaling";
pub const ROTATION_PARAMETER: &str = "3DModel Rotation";
pub const OFFSET_PARAMETER: &str = "3DModel Offset";

/// A value found on `owner`, `hops` steps up from the requested part.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub owner: PartId,
    pub hops: usize,
}

pub struct VariantResolver<'s> {
    store: &'s PartStore,
}

impl<'s> VariantResolver<'s> {
    pub fn new(store: &'s PartStore) -> Self {
        Self { store }
    }

    /// First attachment tagged `tag` on the part or its nearest ancestor.
    pub fn resolve_asset(
        &self,
        start: PartId,
        tag: &str,
    ) -> Result<Resolved<&'s Attachment>, ResolveError> {
        self.waterfall(start, tag, |record| record.attachment(tag))
    }

    /// `x, y, z` parameter `name` from the part or its nearest ancestor.
    ///
    /// A parameter whose value is not exactly three numbers is skipped as if
    /// it were absent, so the search continues upwards.
    pub fn resolve_parameter(
        &self,
        start: PartId,
        name: &str,
    ) -> Result<Resolved<[f64; 3]>, ResolveError> {
        self.waterfall(start, name, |record| {
            let raw = record.parameter(name)?;
            let triple = parse_triple(raw);
            if triple.is_none() {
                log::debug!("Ignoring unusable {name} value {raw:?} on {}", record.ipn);
            }
            triple
        })
    }

    fn waterfall<T>(
        &self,
        start: PartId,
        name: &str,
        mut probe: impl FnMut(&'s PartRecord) -> Option<T>,
    ) -> Result<Resolved<T>, ResolveError> {
        let mut visited = HashSet::new();
        let mut current = start;
        let mut hops = 0;

        loop {
            let record = self
                .store
                .get(current)
                .ok_or(ResolveError::Unfetched { id: current })?;
            if !visited.insert(current) {
                return Err(ResolveError::Cycle {
                    ipn: record.ipn.clone(),
                });
            }

            if let Some(value) = probe(record) {
                if hops > 0 {
                    log::debug!("Using {name} of {} ({hops} hops up)", record.ipn);
                }
                return Ok(Resolved {
                    value,
                    owner: current,
                    hops,
                });
            }

            match record.variant_of {
                Some(parent) => {
                    current = parent;
                    hops += 1;
                }
                None => {
                    let ipn = self
                        .store
                        .get(start)
                        .map(|r| r.ipn.clone())
                        .unwrap_or_default();
                    return Err(ResolveError::NotFound {
                        ipn,
                        name: name.to_string(),
                    });
                }
            }
        }
    }
}

/// Parse `"x, y, z"` into three numbers.
pub fn parse_triple(raw: &str) -> Option<[f64; 3]> {
    let mut values = [0.0; 3];
    let mut tokens = raw.split(',');
    for slot in &mut values {
        *slot = tokens.next()?.trim().parse().ok()?;
    }
    tokens.next().is_none().then_some(values)
}

#[cfg(test)]
mod tests {
    use kitree_catalog::{Parameter, Part, records::ParameterTemplate};

    use super::*;

    fn record(id: PartId, ipn: &str, parent: Option<PartId>) -> PartRecord {
        PartRecord::new(Part {
            pk: id,
            ipn: ipn.to_string(),
            name: ipn.to_string(),
            link: String::new(),
            variant_of: parent,
            active: true,
        })
    }

    fn attachment(tag: &str, file: &str) -> Attachment {
        Attachment {
            pk: 0,
            file: Some(file.to_string()),
            filename: file.rsplit('/').next().unwrap_or(file).to_string(),
            tag: tag.to_string(),
        }
    }

    fn parameter(name: &str, data: &str) -> Parameter {
        Parameter {
            pk: 0,
            template_detail: ParameterTemplate {
                name: name.to_string(),
                units: String::new(),
            },
            data: data.to_string(),
        }
    }

    #[test]
    fn inherits_from_parent() {
        let mut store = PartStore::new();
        store.insert(record(2, "C-200", Some(1)));
        let mut base = record(1, "C-BASE", None);
        base.attachments.push(attachment("Footprint", "/media/fp_0402.kicad_mod"));
        store.insert(base);

        let found = VariantResolver::new(&store).resolve_asset(2, "Footprint").unwrap();
        assert_eq!(found.value.filename, "fp_0402.kicad_mod");
        assert_eq!(found.owner, 1);
        assert_eq!(found.hops, 1);
    }

    #[test]
    fn child_overrides_parent() {
        let mut store = PartStore::new();
        let mut child = record(2, "C-200", Some(1));
        child.attachments.push(attachment("Symbol", "/media/child.kicad_sym"));
        let mut base = record(1, "C-BASE", None);
        base.attachments.push(attachment("Symbol", "/media/base.kicad_sym"));
        store.insert(child);
        store.insert(base);

        let found = VariantResolver::new(&store).resolve_asset(2, "Symbol").unwrap();
        assert_eq!(found.value.filename, "child.kicad_sym");
        assert_eq!(found.hops, 0);
    }

    #[test]
    fn deep_chain_counts_hops() {
        let mut store = PartStore::new();
        let mut root = record(0, "ROOT", None);
        root.attachments.push(attachment("3D-Model", "/media/body.step"));
        store.insert(root);
        for id in 1..=5 {
            store.insert(record(id, &format!("V{id}"), Some(id - 1)));
        }

        let resolver = VariantResolver::new(&store);
        for id in 1..=5 {
            let found = resolver.resolve_asset(id, "3D-Model").unwrap();
            assert_eq!(found.hops, id as usize);
        }
        assert_eq!(
            resolver.resolve_asset(5, "Datasheet"),
            Err(ResolveError::NotFound {
                ipn: "V5".to_string(),
                name: "Datasheet".to_string()
            })
        );
    }

    #[test]
    fn cycle_fails_fast() {
        let mut store = PartStore::new();
        store.insert(record(1, "A", Some(2)));
        store.insert(record(2, "B", Some(1)));

        let err = VariantResolver::new(&store)
            .resolve_asset(1, "Footprint")
            .unwrap_err();
        assert_eq!(err, ResolveError::Cycle { ipn: "A".to_string() });
    }

    #[test]
    fn unusable_triple_continues_upwards() {
        let mut store = PartStore::new();
        let mut child = record(2, "C-200", Some(1));
        child.parameters.push(parameter(ROTATION_PARAMETER, "1, 2"));
        let mut base = record(1, "C-BASE", None);
        base.parameters.push(parameter(ROTATION_PARAMETER, "0, 0, 90"));
        store.insert(child);
        store.insert(base);

        let found = VariantResolver::new(&store)
            .resolve_parameter(2, ROTATION_PARAMETER)
            .unwrap();
        assert_eq!(found.value, [0.0, 0.0, 90.0]);
        assert_eq!(found.owner, 1);
    }

    #[test]
    fn triple_parsing() {
        assert_eq!(parse_triple("1, 2, 3"), Some([1.0, 2.0, 3.0]));
        assert_eq!(parse_triple("0.5,-1,2e-1"), Some([0.5, -1.0, 0.2]));
        assert_eq!(parse_triple("1, 2"), None);
        assert_eq!(parse_triple("1, 2, 3, 4"), None);
        assert_eq!(parse_triple("1, x, 3"), None);
        assert_eq!(parse_triple(""), None);
    }
}
