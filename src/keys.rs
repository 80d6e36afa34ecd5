//! # Key Normalizer
//!
//! Derives, for every row, one normalized string per candidate key, or nothing
//! when any component is missing. Key strings are interned per key so the
//! engine groups rows by compact ids instead of strings.

use crate::config::defaults::KEY_SEPARATOR;
use crate::error::ResolveError;
use crate::model::{present, Column};
use crate::ontology::{KeyComponent, KeyDefinition, Ontology};
use crate::table::Table;
use rustc_hash::FxHashMap;

/// Interned id of a key string, local to one key.
pub type KeyValueId = u32;

/// Free-text normalization: uppercase, trim, keep ASCII alphanumerics only.
pub fn normalize_text(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    (!normalized.is_empty()).then_some(normalized)
}

/// Identifier normalization: uppercase, keep ASCII alphanumerics and hyphens.
pub fn normalize_identifier(raw: &str) -> Option<String> {
    let normalized: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    // A lone run of hyphens carries no identity.
    if normalized.chars().all(|c| c == '-') {
        return None;
    }
    Some(normalized)
}

/// Columns read once per run, shared by every key that references them.
struct ColumnCache {
    columns: FxHashMap<String, Column>,
}

impl ColumnCache {
    fn load(table: &dyn Table, ontology: &Ontology) -> Result<Self, ResolveError> {
        let mut columns = FxHashMap::default();
        let mut missing = Vec::new();
        for name in ontology
            .keys
            .iter()
            .flat_map(|key| key.components.iter())
            .flat_map(KeyComponent::columns)
        {
            if columns.contains_key(name) || missing.iter().any(|m| m == name) {
                continue;
            }
            match table.read_column(name) {
                Some(column) => {
                    columns.insert(name.to_string(), column);
                }
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(ResolveError::MissingColumns { columns: missing });
        }
        Ok(Self { columns })
    }

    fn cell(&self, column: &str, row: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|values| values.get(row))
            .and_then(|cell| present(cell.as_deref()))
    }
}

fn normalize_component(component: &KeyComponent, cache: &ColumnCache, row: usize) -> Option<String> {
    match component {
        KeyComponent::Name {
            surname,
            given_names,
        } => {
            let mut name = normalize_text(cache.cell(surname, row)?)?;
            if let Some(given) = cache.cell(given_names, row).and_then(normalize_text) {
                name.push_str(&given);
            }
            Some(name)
        }
        KeyComponent::Text(column) => normalize_text(cache.cell(column, row)?),
        KeyComponent::Identifier(column) => normalize_identifier(cache.cell(column, row)?),
    }
}

/// Compose the key string for one row, or `None` when any component is absent.
fn compose_key(key: &KeyDefinition, cache: &ColumnCache, row: usize) -> Option<String> {
    let mut parts = Vec::with_capacity(key.components.len());
    for component in &key.components {
        parts.push(normalize_component(component, cache, row)?);
    }
    Some(parts.join(KEY_SEPARATOR))
}

/// Interned values of one candidate key across all rows.
#[derive(Debug, Clone, Default)]
pub struct KeyColumn {
    /// Key name, as configured
    pub name: String,
    values: Vec<Option<KeyValueId>>,
    strings: Vec<String>,
}

impl KeyColumn {
    fn intern(name: &str, raw: Vec<Option<String>>) -> Self {
        let mut lookup: FxHashMap<String, KeyValueId> = FxHashMap::default();
        let mut strings = Vec::new();
        let values = raw
            .into_iter()
            .map(|value| {
                value.map(|value| {
                    if let Some(&id) = lookup.get(&value) {
                        return id;
                    }
                    let id = strings.len() as KeyValueId;
                    strings.push(value.clone());
                    lookup.insert(value, id);
                    id
                })
            })
            .collect();
        Self {
            name: name.to_string(),
            values,
            strings,
        }
    }

    /// Interned value for a row.
    pub fn value_id(&self, row: usize) -> Option<KeyValueId> {
        self.values.get(row).copied().flatten()
    }

    /// Key string for a row.
    pub fn value(&self, row: usize) -> Option<&str> {
        self.value_id(row).map(|id| self.strings[id as usize].as_str())
    }

    /// Number of distinct key strings.
    pub fn distinct(&self) -> usize {
        self.strings.len()
    }

    /// Number of rows carrying this key.
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }
}

/// Every candidate key of every row, in ontology key order.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: Vec<KeyColumn>,
    rows: usize,
}

impl KeyTable {
    /// Normalize identity fields and derive all keys.
    pub fn build(table: &dyn Table, ontology: &Ontology) -> Result<Self, ResolveError> {
        let cache = ColumnCache::load(table, ontology)?;
        let rows = table.row_count();
        let keys = ontology
            .keys
            .iter()
            .map(|key| {
                let raw = (0..rows).map(|row| compose_key(key, &cache, row)).collect();
                KeyColumn::intern(&key.name, raw)
            })
            .collect();
        Ok(Self { keys, rows })
    }

    pub fn key(&self, index: usize) -> &KeyColumn {
        &self.keys[index]
    }

    pub fn keys(&self) -> &[KeyColumn] {
        &self.keys
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}
