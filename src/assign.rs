//! # Canonical Assigner
//!
//! Orders final clusters by their earliest academic year, then by smallest
//! member row, and issues one identifier per cluster through a pluggable
//! formatting policy.

use crate::dsu::Clusters;
use crate::model::{present, ClusterId, RowIndex};
use serde::{Deserialize, Serialize};

/// Formats the external student identifier.
pub trait IdentifierPolicy: Send + Sync {
    /// `sequence` is 1-based; `earliest_year` is `None` when no member had a
    /// parseable academic year.
    fn format(&self, sequence: usize, earliest_year: Option<u32>) -> String;
}

/// `PREFIX` + zero-padded sequence, e.g. `ETU000042`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainSequence {
    prefix: String,
    width: usize,
}

impl PlainSequence {
    pub fn new(prefix: &str, width: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            width,
        }
    }
}

impl IdentifierPolicy for PlainSequence {
    fn format(&self, sequence: usize, _earliest_year: Option<u32>) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = self.width)
    }
}

/// `PREFIX` + earliest year + `_` + zero-padded sequence, e.g. `ETU2023_000042`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSequence {
    prefix: String,
    width: usize,
    missing_year: u32,
}

impl YearSequence {
    pub fn new(prefix: &str, width: usize, missing_year: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            width,
            missing_year,
        }
    }
}

impl IdentifierPolicy for YearSequence {
    fn format(&self, sequence: usize, earliest_year: Option<u32>) -> String {
        format!(
            "{}{}_{:0width$}",
            self.prefix,
            earliest_year.unwrap_or(self.missing_year),
            sequence,
            width = self.width
        )
    }
}

/// First year of an academic-year range: `2023-2024` gives 2023.
///
/// Accepts `-` or `/` as the range separator and a bare year. Anything else
/// is treated as unknown.
pub fn academic_year_start(raw: &str) -> Option<u32> {
    let first = raw.trim().split(['-', '/']).next()?.trim();
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    first.parse().ok()
}

/// Identifier issued to one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub cluster: ClusterId,
    /// 1-based rank in the canonical order
    pub sequence: usize,
    pub earliest_year: Option<u32>,
    pub student_id: String,
    /// Member rows, ascending
    pub members: Vec<RowIndex>,
}

/// Order clusters canonically and issue identifiers.
///
/// `years` is the academic-year column, indexed by row. Clusters with no
/// parseable year sort as if their year were `missing_year`.
pub fn assign_identifiers(
    clusters: &Clusters,
    years: &[Option<String>],
    policy: &dyn IdentifierPolicy,
    missing_year: u32,
) -> Vec<Assignment> {
    let mut ranked: Vec<(u32, ClusterId, Option<u32>, &[RowIndex])> = clusters
        .iter()
        .map(|cluster| {
            let earliest = cluster
                .records
                .iter()
                .filter_map(|row| {
                    years
                        .get(row.as_usize())
                        .and_then(|cell| present(cell.as_deref()))
                        .and_then(academic_year_start)
                })
                .min();
            (
                earliest.unwrap_or(missing_year),
                cluster.id,
                earliest,
                cluster.records.as_slice(),
            )
        })
        .collect();

    // Cluster labels are their smallest member row, so this is the row tie-break.
    ranked.sort_by_key(|(year, label, _, _)| (*year, *label));

    ranked
        .into_iter()
        .enumerate()
        .map(|(idx, (_, cluster, earliest_year, members))| {
            let sequence = idx + 1;
            Assignment {
                cluster,
                sequence,
                earliest_year,
                student_id: policy.format(sequence, earliest_year),
                members: members.to_vec(),
            }
        })
        .collect()
}

/// Spread each cluster's identifier to every member row.
pub fn identifier_column(assignments: &[Assignment], rows: usize) -> Vec<Option<String>> {
    let mut column = vec![None; rows];
    for assignment in assignments {
        for row in &assignment.members {
            column[row.as_usize()] = Some(assignment.student_id.clone());
        }
    }
    column
}
