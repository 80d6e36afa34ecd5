//! # Data Model
//!
//! Core data structures for student resolution: row indices, cluster labels,
//! and the consolidated student entities produced by a resolution run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable row-order index of an ingested record.
///
/// Assigned once upstream (position in the table) and used for every
/// deterministic tie-break in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowIndex(pub u32);

impl RowIndex {
    /// Position of the row in the table.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl From<usize> for RowIndex {
    fn from(value: usize) -> Self {
        RowIndex(value as u32)
    }
}

/// Cluster label. Always the minimum row index among the cluster's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl ClusterId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

impl From<RowIndex> for ClusterId {
    fn from(row: RowIndex) -> Self {
        ClusterId(row.0)
    }
}

/// A column of cells; `None` marks a missing cell.
pub type Column = Vec<Option<String>>;

/// Returns the cell value if it carries non-whitespace content.
pub fn present(cell: Option<&str>) -> Option<&str> {
    cell.filter(|value| !value.trim().is_empty())
}

/// One recognized physical student: a final cluster with its stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentEntity {
    /// Generated external identifier (e.g. `ETU2023_000001`)
    pub student_id: String,
    /// Cluster label the entity was built from
    pub cluster: ClusterId,
    /// 1-based position in the canonical ordering
    pub sequence: usize,
    /// Earliest academic-year start across members, `None` when no member had one
    pub earliest_year: Option<u32>,
    /// Member rows in ascending row order
    pub members: Vec<RowIndex>,
    /// Consolidated value per tracked attribute
    pub consolidated: BTreeMap<String, Option<String>>,
}

impl StudentEntity {
    /// Number of raw records folded into this entity.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether more than one raw record describes this student.
    pub fn is_duplicated(&self) -> bool {
        self.members.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_filters_blank_cells() {
        assert_eq!(present(Some("abc")), Some("abc"));
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(Some("")), None);
        assert_eq!(present(None), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(RowIndex(4).to_string(), "R4");
        assert_eq!(ClusterId(2).to_string(), "C2");
        assert_eq!(ClusterId::from(RowIndex(7)), ClusterId(7));
    }

    #[test]
    fn test_entity_duplication() {
        let entity = StudentEntity {
            student_id: "ETU000001".to_string(),
            cluster: ClusterId(0),
            sequence: 1,
            earliest_year: Some(2023),
            members: vec![RowIndex(0), RowIndex(3)],
            consolidated: BTreeMap::new(),
        };
        assert!(entity.is_duplicated());
        assert_eq!(entity.len(), 2);
    }
}
