//! Placeholder scanning over SQL text.

use std::collections::BTreeSet;

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_name_continue(b: u8) -> bool {
    is_name_start(b) || b == b'$' || b == b'#'
}

/// Returns true if `name` is a valid placeholder name (without the `:`).
pub fn is_placeholder_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.split_first() {
        Some((first, rest)) => is_name_start(*first) && rest.iter().all(|b| is_name_continue(*b)),
        None => false,
    }
}

/// Returns every `:name` placeholder in `sql`, in order of appearance and with
/// repetitions.
///
/// Placeholders inside single-quoted literals, double-quoted identifiers,
/// `--` line comments and `/* */` block comments are ignored, and so is the
/// `::` cast operator.
pub fn scan_placeholders(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
                while i < bytes.len() && bytes[i] == b':' {
                    i += 1;
                }
            }
            b':' if bytes.get(i + 1).copied().is_some_and(is_name_start) => {
                let start = i + 1;
                let mut end = start + 1;
                while end < bytes.len() && is_name_continue(bytes[end]) {
                    end += 1;
                }
                found.push(&sql[start..end]);
                i = end;
            }
            _ => i += 1,
        }
    }
    found
}

/// Distinct placeholder names used by `sql`.
pub fn used_parameters(sql: &str) -> BTreeSet<String> {
    scan_placeholders(sql).into_iter().map(str::to_owned).collect()
}

/// Returns true when `text` looks like a tag-annotated template: its first
/// non-blank character opens an element.
pub fn is_template(text: &str) -> bool {
    let mut chars = text.trim_start().chars();
    chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '?' || c == '!')
}

/// Collapses whitespace runs to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
