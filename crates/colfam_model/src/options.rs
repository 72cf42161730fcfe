//! Table-level options (`WITH ...` properties).

use colfam_protocol::exact_i64;
use colfam_protocol::ident::escape_string_literal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An option value as declared by a model or reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(i64),
    Float(f64),
    Text(String),
    Map(BTreeMap<String, String>),
}

impl OptionValue {
    pub fn map<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        OptionValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            OptionValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<BTreeMap<String, String>> for OptionValue {
    fn from(v: BTreeMap<String, String>) -> Self {
        OptionValue::Map(v)
    }
}

/// CQL literal rendering.
impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::Text(v) => write!(f, "{}", escape_string_literal(v)),
            OptionValue::Map(entries) => {
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", escape_string_literal(k), escape_string_literal(v)))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

/// Value shape each recognized option takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Int,
    Float,
    Text,
    Map,
}

/// Options a model may declare. Anything else is rejected at reconciliation.
pub const RECOGNIZED_OPTIONS: &[(&str, OptionKind)] = &[
    ("bloom_filter_fp_chance", OptionKind::Float),
    ("caching", OptionKind::Map),
    ("comment", OptionKind::Text),
    ("compaction", OptionKind::Map),
    ("compression", OptionKind::Map),
    ("crc_check_chance", OptionKind::Float),
    ("dclocal_read_repair_chance", OptionKind::Float),
    ("default_time_to_live", OptionKind::Int),
    ("gc_grace_seconds", OptionKind::Int),
    ("max_index_interval", OptionKind::Int),
    ("memtable_flush_period_in_ms", OptionKind::Int),
    ("min_index_interval", OptionKind::Int),
    ("read_repair_chance", OptionKind::Float),
    ("speculative_retry", OptionKind::Text),
];

pub fn option_kind(name: &str) -> Option<OptionKind> {
    RECOGNIZED_OPTIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, kind)| *kind)
}

impl OptionKind {
    /// Normalize a declared or catalog-reported value to this kind.
    ///
    /// Catalogs report everything as text (`'0.76328'`, `'2063'`, maps as
    /// JSON-ish strings), so text is parsed for every kind.
    pub fn coerce(self, value: &OptionValue) -> Option<OptionValue> {
        match (self, value) {
            (OptionKind::Int, OptionValue::Int(v)) => Some(OptionValue::Int(*v)),
            (OptionKind::Int, OptionValue::Float(v)) => exact_i64(*v).map(OptionValue::Int),
            (OptionKind::Int, OptionValue::Text(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| {
                        s.parse::<f64>().ok().and_then(exact_i64)
                    })
                    .map(OptionValue::Int)
            }
            (OptionKind::Float, OptionValue::Float(v)) => Some(OptionValue::Float(*v)),
            (OptionKind::Float, OptionValue::Int(v)) => Some(OptionValue::Float(*v as f64)),
            (OptionKind::Float, OptionValue::Text(s)) => {
                s.trim().parse::<f64>().ok().map(OptionValue::Float)
            }
            (OptionKind::Text, OptionValue::Text(s)) => Some(OptionValue::Text(s.clone())),
            (OptionKind::Text, OptionValue::Int(v)) => Some(OptionValue::Text(v.to_string())),
            (OptionKind::Text, OptionValue::Float(v)) => Some(OptionValue::Text(v.to_string())),
            (OptionKind::Map, OptionValue::Map(m)) => Some(OptionValue::Map(m.clone())),
            (OptionKind::Map, OptionValue::Text(s)) => parse_text_map(s).map(OptionValue::Map),
            _ => None,
        }
    }
}

fn parse_text_map(raw: &str) -> Option<BTreeMap<String, String>> {
    let parsed: serde_json::Value = serde_json::from_str(raw)
        .or_else(|_| serde_json::from_str(&raw.replace('\'', "\"")))
        .ok()?;
    let object = parsed.as_object()?;
    Some(
        object
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
    )
}

/// Declared table options, keyed by option name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableOptions(BTreeMap<String, OptionValue>);

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Declared keys outside [`RECOGNIZED_OPTIONS`], in sorted order.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| option_kind(k).is_none())
            .collect()
    }

    /// `k = v AND k2 = v2`, the body of a `WITH` clause.
    pub fn to_cql(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{} = {}", k, v))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl FromIterator<(String, OptionValue)> for TableOptions {
    fn from_iter<I: IntoIterator<Item = (String, OptionValue)>>(iter: I) -> Self {
        TableOptions(iter.into_iter().collect())
    }
}
