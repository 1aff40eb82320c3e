//! Common KiCad-ish S-expression query helpers.
//!
//! Many KiCad formats use small list nodes that behave like key/value properties:
//! `(tag "value")`, `(tag 123)`, `(tag yes)`, etc. These helpers standardize querying.

use std::collections::BTreeMap;

use crate::Sexpr;
use crate::find_child_list;

/// Find a direct child list `(tag ...)` within `list`.
pub fn child_list<'a>(list: &'a [Sexpr], tag: &str) -> Option<&'a [Sexpr]> {
    find_child_list(list, tag)
}

/// Find a textual property `(tag VALUE)`, quoted or bare.
pub fn text_prop(list: &[Sexpr], tag: &str) -> Option<String> {
    child_list(list, tag)?.get(1)?.as_text()
}

/// Find a boolean property that is represented as `(tag yes)` or `(tag no)`.
///
/// KiCad 8 also writes bare `(tag)` flags, which count as `yes`.
pub fn yes_no_prop(list: &[Sexpr], tag: &str) -> Option<bool> {
    let items = child_list(list, tag)?;
    match items.get(1).and_then(Sexpr::as_sym) {
        None => Some(true),
        Some("yes") => Some(true),
        Some("no") => Some(false),
        Some(_) => None,
    }
}

/// Find an integer property `(tag 123)` within `list`.
pub fn int_prop(list: &[Sexpr], tag: &str) -> Option<i64> {
    child_list(list, tag)?.get(1)?.as_int()
}

/// Extract all direct `(property "NAME" "VALUE" ...)` pairs of a node.
pub fn properties(node: &[Sexpr]) -> BTreeMap<String, String> {
    node.iter()
        .skip(1)
        .filter_map(Sexpr::as_list)
        .filter(|items| items.first().and_then(Sexpr::as_sym) == Some("property"))
        .filter_map(|items| {
            let name = items.get(1)?.as_text()?;
            let value = items.get(2).and_then(Sexpr::as_text).unwrap_or_default();
            Some((name, value))
        })
        .collect()
}

/// Value of the direct `(property "NAME" ...)` child called `name`.
pub fn property_value(node: &[Sexpr], name: &str) -> Option<String> {
    node.iter().skip(1).filter_map(Sexpr::as_list).find_map(|items| {
        let is_match = items.first().and_then(Sexpr::as_sym) == Some("property")
            && items.get(1).and_then(Sexpr::as_text).as_deref() == Some(name);
        if is_match {
            items.get(2).and_then(Sexpr::as_text)
        } else {
            None
        }
    })
}
