//! Textual key/value property bags.
//!
//! The load side accepts the full line-oriented property syntax: `#`/`!`
//! comments, `=`/`:`/whitespace separators, backslash continuation lines and
//! `\t \n \r \f \uXXXX` escapes. The store side writes one escaped
//! `key=value` per line under a fixed header comment, keys sorted.

use std::collections::btree_map;
use std::collections::BTreeMap;

use super::DataSerializer;
use crate::constants::PROPERTIES_HEADER;
use crate::Result;
use crate::SerializationError;

/// Ordered string → string bag
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns the previous value, if any
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.entries.iter()
    }

    /// Parses property text. Later duplicates override earlier ones.
    pub fn load(text: &str) -> Result<Self> {
        let mut properties = Properties::new();
        for (line_no, logical) in logical_lines(text) {
            let (raw_key, raw_value) = split_key_value(&logical);
            let key = unescape(raw_key, line_no)?;
            let value = unescape(raw_value, line_no)?;
            properties.entries.insert(key, value);
        }
        Ok(properties)
    }

    /// Renders property text under the `#Serialized by ZKClient` header.
    pub fn store(&self) -> String {
        let mut out = String::new();
        out.push('#');
        out.push_str(PROPERTIES_HEADER);
        out.push('\n');
        for (key, value) in &self.entries {
            escape_into(&mut out, key, true);
            out.push('=');
            escape_into(&mut out, value, false);
            out.push('\n');
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Properties {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Property bag codec, charset fixed to UTF-8
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertiesSerializer;

impl DataSerializer<Properties> for PropertiesSerializer {
    fn serialize(
        &self,
        value: &Properties,
    ) -> Result<Vec<u8>> {
        Ok(value.store().into_bytes())
    }

    fn deserialize(
        &self,
        bytes: &[u8],
    ) -> Result<Properties> {
        let text = String::from_utf8(bytes.to_vec())?;
        Properties::load(&text)
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{000C}')
}

/// Joins continuation lines; yields (first natural line number, logical line)
/// with comments and blank lines removed. Escapes are left in place.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut natural = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).enumerate();

    while let Some((idx, line)) = natural.next() {
        let trimmed = line.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::new();
        let mut current = trimmed;
        loop {
            if ends_with_odd_backslashes(current) {
                logical.push_str(&current[..current.len() - 1]);
                match natural.next() {
                    Some((_, next)) => current = next.trim_start_matches(is_blank),
                    None => break,
                }
            } else {
                logical.push_str(current);
                break;
            }
        }
        lines.push((idx + 1, logical));
    }
    lines
}

fn ends_with_odd_backslashes(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Splits at the first unescaped `=`, `:` or blank
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    let mut separator = None;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                separator = Some(c);
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = &line[key_end..];
    if separator.is_some() {
        rest = &rest[1..];
        rest = rest.trim_start_matches(is_blank);
    } else {
        rest = rest.trim_start_matches(is_blank);
        if let Some(stripped) = rest.strip_prefix(['=', ':']) {
            rest = stripped.trim_start_matches(is_blank);
        }
    }
    (key, rest)
}

fn unescape(
    raw: &str,
    line: usize,
) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let well_formed = hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit());
                let code = well_formed
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .ok_or_else(|| SerializationError::Properties {
                        line,
                        message: format!("Malformed \\uxxxx encoding: \\u{hex}"),
                    })?;
                // Surrogates are not scalar values; keep a replacement char.
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn escape_into(
    out: &mut String,
    raw: &str,
    is_key: bool,
) {
    for (i, c) in raw.chars().enumerate() {
        match c {
            ' ' if i == 0 || is_key => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{000C}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
}
