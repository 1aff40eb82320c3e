//! KiCad-style writer for S-expression trees.
//!
//! Trees are serialized compactly and then run through [`prettify`], a port of
//! KiCad's own character-stream `Prettify()`, so generated libraries diff
//! cleanly against files saved by KiCad itself.

use crate::{Sexpr, SexprKind};

/// Formatting modes matching `KICAD_FORMAT::FORMAT_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    /// Standard KiCad formatting.
    #[default]
    Normal,
    /// Keep font/stroke/transform lists on a single line (symbols, footprints).
    CompactTextProperties,
    /// Keep `(lib ...)` rows on a single line (`sym-lib-table`, `fp-lib-table`).
    LibraryTable,
}

const QUOTE_CHAR: u8 = b'"';
const INDENT_CHAR: u8 = b'\t';
const XY_SPECIAL_CASE_COLUMN_LIMIT: usize = 99;
const CONSECUTIVE_TOKEN_WRAP_THRESHOLD: usize = 72;
const SHORT_FORM_TOKENS: &[&[u8]] = &[
    b"font",
    b"stroke",
    b"fill",
    b"offset",
    b"rotate",
    b"scale",
];

/// Pretty-print raw S-expression text the way KiCad does.
///
/// Whitespace is normalized, indentation uses tabs, and the XY, short-form
/// and library-table special cases are applied depending on `mode`.
pub fn prettify(source: &str, mode: FormatMode) -> String {
    let text_special_case = mode == FormatMode::CompactTextProperties;
    let lib_special_case = mode == FormatMode::LibraryTable;

    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut list_depth = 0usize;
    let mut lib_depth = 0usize;
    let mut last_non_whitespace = 0u8;
    let mut in_quote = false;
    let mut has_inserted_space = false;
    let mut in_multi_line_list = false;
    let mut in_xy = false;
    let mut in_short_form = false;
    let mut in_lib_row = false;
    let mut short_form_depth = 0usize;
    let mut column = 0usize;
    let mut backslash_count = 0usize;

    for (i, &current) in bytes.iter().enumerate() {
        let next = next_non_whitespace(bytes, i + 1);

        if is_whitespace(current) && !in_quote {
            if !has_inserted_space
                && list_depth > 0
                && last_non_whitespace != b'('
                && next != b')'
                && next != b'('
            {
                if in_xy || column < CONSECUTIVE_TOKEN_WRAP_THRESHOLD {
                    out.push(b' ');
                    column += 1;
                } else if in_short_form || in_lib_row {
                    out.push(b' ');
                } else {
                    out.push(b'\n');
                    push_indent(&mut out, list_depth);
                    column = list_depth;
                    in_multi_line_list = true;
                }

                has_inserted_space = true;
            }
            continue;
        }

        has_inserted_space = false;

        if current == b'(' && !in_quote {
            let current_is_xy = is_xy(bytes, i);
            let current_is_short_form = text_special_case && is_short_form(bytes, i);
            let current_is_lib = lib_special_case && token_after_lparen(bytes, i) == b"lib";

            if out.is_empty() {
                out.push(b'(');
                column += 1;
            } else if (in_xy && current_is_xy && column < XY_SPECIAL_CASE_COLUMN_LIMIT)
                || in_short_form
                || in_lib_row
            {
                out.extend_from_slice(b" (");
                column += 2;
            } else {
                out.push(b'\n');
                push_indent(&mut out, list_depth);
                out.push(b'(');
                column = list_depth + 1;
            }

            in_xy = current_is_xy;

            if current_is_short_form {
                in_short_form = true;
                short_form_depth = list_depth;
            } else if current_is_lib {
                in_lib_row = true;
                lib_depth = list_depth;
            }

            list_depth += 1;
        } else if current == b')' && !in_quote {
            list_depth = list_depth.saturating_sub(1);

            if in_short_form {
                out.push(b')');
                column += 1;
            } else if in_lib_row && list_depth == lib_depth {
                out.push(b')');
                in_lib_row = false;
            } else if last_non_whitespace == b')' || in_multi_line_list {
                out.push(b'\n');
                push_indent(&mut out, list_depth);
                out.push(b')');
                column = list_depth + 1;
                in_multi_line_list = false;
            } else {
                out.push(b')');
                column += 1;
            }

            if short_form_depth == list_depth {
                in_short_form = false;
                short_form_depth = 0;
            }
        } else {
            if current == b'\\' {
                backslash_count += 1;
            } else if current == QUOTE_CHAR && (backslash_count & 1) == 0 {
                in_quote = !in_quote;
            }

            if current != b'\\' {
                backslash_count = 0;
            }

            out.push(current);
            column += 1;
        }

        last_non_whitespace = current;
    }

    // POSIX newline at EOF.
    out.push(b'\n');

    // Only ASCII bytes are inserted into valid UTF-8 input.
    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Format an S-expression tree through the KiCad-style prettifier.
///
/// The returned string includes a trailing newline.
pub fn format_tree(sexpr: &Sexpr, mode: FormatMode) -> String {
    let mut raw = String::new();
    write_compact(sexpr, &mut raw);
    prettify(&raw, mode)
}

fn write_compact(sexpr: &Sexpr, out: &mut String) {
    match &sexpr.kind {
        SexprKind::Symbol(s) => out.push_str(s),
        SexprKind::String(s) => {
            out.push('"');
            out.push_str(&escape_string(s));
            out.push('"');
        }
        SexprKind::Int(n) => match sexpr.raw_atom.as_deref() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&n.to_string()),
        },
        SexprKind::F64(f) => match sexpr.raw_atom.as_deref() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&trim_float(f.to_string())),
        },
        SexprKind::List(items) => {
            out.push('(');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(' ');
                }
                write_compact(item, out);
            }
            out.push(')');
        }
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(ch),
        }
    }
    result
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn next_non_whitespace(bytes: &[u8], idx: usize) -> u8 {
    bytes[idx..]
        .iter()
        .copied()
        .find(|&ch| !is_whitespace(ch))
        .unwrap_or(0)
}

fn token_after_lparen(bytes: &[u8], pos: usize) -> &[u8] {
    let start = pos.saturating_add(1).min(bytes.len());
    let len = bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    &bytes[start..start + len]
}

fn is_xy(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos + 1..pos + 4) == Some(b"xy ".as_slice())
}

fn is_short_form(bytes: &[u8], pos: usize) -> bool {
    SHORT_FORM_TOKENS.contains(&token_after_lparen(bytes, pos))
}

fn push_indent(out: &mut Vec<u8>, depth: usize) {
    out.extend(std::iter::repeat_n(INDENT_CHAR, depth));
}

fn trim_float(s: String) -> String {
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
