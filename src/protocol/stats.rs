//! Stat block decoding.
//!
//! Stats and list commands answer with a declared-length text block in
//! the broker's simplified YAML subset: an optional `---` document
//! marker, flat `key: scalar` lines, and string lists written as
//! `- item` lines (either grouped under a key with no scalar, or as
//! the whole document for the list-tubes family). Nothing in the
//! protocol nests deeper, so this is a dedicated decoder for exactly
//! that subset rather than a general YAML dependency.

use std::collections::BTreeMap;

/// One decoded stat value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatValue {
    /// Scalar that parses as a base-10 integer.
    Int(i64),
    /// Any other scalar, kept verbatim (versions, tube names, ids).
    Str(String),
    /// Ordered list of strings, e.g. the watched-tube set.
    List(Vec<String>),
}

/// Decoded flat mapping from a stats/list reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatTable {
    entries: BTreeMap<String, StatValue>,
}

impl StatTable {
    /// Look up a field by name.
    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.entries.get(key)
    }

    /// Integer field, if present and integer-valued.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.entries.get(key) {
            Some(StatValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// String field, if present and string-valued.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(StatValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// List field, if present and list-valued. Order is exactly as the
    /// broker sent it.
    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key) {
            Some(StatValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no fields were decoded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn scalar(value: &str) -> StatValue {
    match value.parse::<i64>() {
        Ok(n) => StatValue::Int(n),
        Err(_) => StatValue::Str(value.to_string()),
    }
}

/// Decode a flat mapping document into a [`StatTable`].
pub fn parse_table(text: &str) -> StatTable {
    let mut entries = BTreeMap::new();
    let mut pending_list: Option<(String, Vec<String>)> = None;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if line == "---" || line.trim().is_empty() {
            continue;
        }

        if let Some(item) = line.trim_start().strip_prefix("- ") {
            if let Some((_, items)) = pending_list.as_mut() {
                items.push(item.to_string());
            }
            continue;
        }

        if let Some((key, items)) = pending_list.take() {
            entries.insert(key, StatValue::List(items));
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim();
            if value.is_empty() {
                // List entries follow on their own `- item` lines.
                pending_list = Some((key, Vec::new()));
            } else {
                entries.insert(key, scalar(value));
            }
        }
    }

    if let Some((key, items)) = pending_list {
        entries.insert(key, StatValue::List(items));
    }

    StatTable { entries }
}

/// Decode a document that is one top-level list of strings (the
/// list-tubes family), preserving the broker's ordering.
pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|raw| raw.trim_end_matches('\r'))
        .filter_map(|line| line.trim_start().strip_prefix("- "))
        .map(str::to_string)
        .collect()
}
