//! # Conflicts Module
//!
//! Strong identity checking: decides whether a set of records may live in one
//! cluster without two different values for any strong identifier.

use crate::error::ResolveError;
use crate::keys::normalize_identifier;
use crate::model::{present, RowIndex};
use crate::ontology::Ontology;
use crate::table::Table;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Two or more distinct values of one strong identifier within a member set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrongConflict {
    /// Name of the strong identifier
    pub attribute: String,
    /// Distinct normalized values, sorted
    pub values: Vec<String>,
}

impl std::fmt::Display for StrongConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} disagrees: {}", self.attribute, self.values.join(" vs "))
    }
}

/// One strong identifier, normalized and interned across all rows.
#[derive(Debug, Clone)]
struct StrongColumn {
    name: String,
    values: Vec<Option<u32>>,
    strings: Vec<String>,
}

impl StrongColumn {
    fn new(name: &str, column: &[Option<String>]) -> Self {
        let mut lookup: FxHashMap<String, u32> = FxHashMap::default();
        let mut strings = Vec::new();
        let values = column
            .iter()
            .map(|cell| {
                let normalized = present(cell.as_deref()).and_then(normalize_identifier)?;
                let id = *lookup.entry(normalized.clone()).or_insert_with(|| {
                    strings.push(normalized);
                    (strings.len() - 1) as u32
                });
                Some(id)
            })
            .collect();
        Self {
            name: name.to_string(),
            values,
            strings,
        }
    }

    fn value(&self, row: usize) -> Option<u32> {
        self.values.get(row).copied().flatten()
    }

    fn conflict<I>(&self, members: I) -> Option<StrongConflict>
    where
        I: IntoIterator<Item = usize>,
    {
        let distinct: BTreeSet<u32> = members
            .into_iter()
            .filter_map(|row| self.value(row))
            .collect();
        if distinct.len() < 2 {
            return None;
        }
        let mut values: Vec<String> = distinct
            .into_iter()
            .map(|id| self.strings[id as usize].clone())
            .collect();
        values.sort();
        Some(StrongConflict {
            attribute: self.name.clone(),
            values,
        })
    }
}

/// Pure strong identity checker over a fixed snapshot of the table.
#[derive(Debug, Clone)]
pub struct StrongIdentityChecker {
    columns: Vec<StrongColumn>,
}

impl StrongIdentityChecker {
    /// Read and normalize every strong identifier column of the ontology.
    pub fn load(table: &dyn Table, ontology: &Ontology) -> Result<Self, ResolveError> {
        let mut columns = Vec::with_capacity(ontology.strong_identifiers.len());
        let mut missing = Vec::new();
        for strong in &ontology.strong_identifiers {
            match table.read_column(&strong.column) {
                Some(values) => columns.push(StrongColumn::new(&strong.name, &values)),
                None => missing.push(strong.column.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(ResolveError::MissingColumns { columns: missing });
        }
        Ok(Self { columns })
    }

    /// Build a checker from named columns directly.
    pub fn from_columns(columns: &[(&str, Vec<Option<String>>)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, values)| StrongColumn::new(name, values))
                .collect(),
        }
    }

    /// Check a combined member set. `None` means the members may share a cluster.
    pub fn check(&self, members: &[RowIndex]) -> Option<StrongConflict> {
        self.columns
            .iter()
            .find_map(|column| column.conflict(members.iter().map(|row| row.as_usize())))
    }

    /// Check the union of two clusters without materializing it.
    pub fn check_union(&self, left: &[RowIndex], right: &[RowIndex]) -> Option<StrongConflict> {
        self.columns.iter().find_map(|column| {
            column.conflict(left.iter().chain(right.iter()).map(|row| row.as_usize()))
        })
    }

    /// Names of the checked identifiers.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    fn checker() -> StrongIdentityChecker {
        StrongIdentityChecker::from_columns(&[
            ("cin", cells(&["111", "", "222", "111 ", ""])),
            ("naissance_date", cells(&["2000-01-01", "2000-01-01", "", "", "1999-05-05"])),
        ])
    }

    fn rows(indices: &[u32]) -> Vec<RowIndex> {
        indices.iter().map(|&i| RowIndex(i)).collect()
    }

    #[test]
    fn test_missing_values_never_conflict() {
        let checker = checker();
        assert_eq!(checker.check(&rows(&[0, 1])), None);
        assert_eq!(checker.check(&rows(&[1, 2])), None);
        assert_eq!(checker.check(&[]), None);
    }

    #[test]
    fn test_normalized_values_compare_equal() {
        assert_eq!(checker().check(&rows(&[0, 3])), None);
    }

    #[test]
    fn test_differing_values_conflict() {
        let conflict = checker().check(&rows(&[0, 2])).unwrap();
        assert_eq!(conflict.attribute, "cin");
        assert_eq!(conflict.values, vec!["111".to_string(), "222".to_string()]);

        let conflict = checker().check(&rows(&[1, 4])).unwrap();
        assert_eq!(conflict.attribute, "naissance_date");
    }

    #[test]
    fn test_check_union_matches_check() {
        let checker = checker();
        for (left, right) in [(vec![0u32], vec![2u32]), (vec![0, 1], vec![3]), (vec![1], vec![4])] {
            let left = rows(&left);
            let right = rows(&right);
            let combined: Vec<_> = left.iter().chain(right.iter()).copied().collect();
            assert_eq!(checker.check_union(&left, &right), checker.check(&combined));
        }
    }
}
