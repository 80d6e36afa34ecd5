//! # Field Consolidator
//!
//! For every tracked attribute, picks the first non-missing value of each
//! cluster in row order and writes it to every member.

use crate::dsu::Clusters;
use crate::error::ResolveError;
use crate::model::{present, Column};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-attribute result of consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedColumn {
    pub name: String,
    /// Representative value of each cluster, in `Clusters` order
    pub representatives: Vec<Option<String>>,
    /// Members that were missing a value and received one
    pub filled: usize,
    /// Members whose own value was replaced by a different one
    pub overwritten: usize,
}

/// Outcome of a consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consolidation {
    pub columns: Vec<ConsolidatedColumn>,
    /// Configured attributes the table does not have
    pub skipped: Vec<String>,
}

impl Consolidation {
    /// Consolidated value of `column` for the cluster at position `cluster_pos`.
    pub fn representative(&self, column: &str, cluster_pos: usize) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .and_then(|c| c.representatives.get(cluster_pos))
            .and_then(|value| value.as_deref())
    }
}

/// Pick the first present value among `members` (ascending row order).
fn representative<'a>(column: &'a [Option<String>], members: &[usize]) -> Option<&'a str> {
    members
        .iter()
        .find_map(|&row| present(column.get(row).and_then(|cell| cell.as_deref())))
}

fn consolidate_column(column: &mut Column, clusters: &Clusters, name: &str) -> ConsolidatedColumn {
    let mut representatives = Vec::with_capacity(clusters.len());
    let mut filled = 0;
    let mut overwritten = 0;

    for cluster in clusters.iter() {
        let members: Vec<usize> = cluster.records.iter().map(|row| row.as_usize()).collect();
        let chosen = representative(column, &members).map(str::to_string);
        for &row in &members {
            let Some(cell) = column.get_mut(row) else {
                continue;
            };
            match (present(cell.as_deref()), chosen.as_deref()) {
                (None, Some(_)) => filled += 1,
                (Some(own), Some(value)) if own != value => overwritten += 1,
                _ => {}
            }
            *cell = chosen.clone();
        }
        representatives.push(chosen);
    }

    ConsolidatedColumn {
        name: name.to_string(),
        representatives,
        filled,
        overwritten,
    }
}

/// Propagate one representative value per cluster for each listed attribute.
///
/// Attributes absent from the table are skipped. Columns not listed are left
/// untouched.
pub fn consolidate_fields(
    table: &mut dyn Table,
    clusters: &Clusters,
    columns: &[String],
) -> Result<Consolidation, ResolveError> {
    let mut outcome = Consolidation::default();
    for name in columns {
        if outcome.columns.iter().any(|c| &c.name == name) || outcome.skipped.contains(name) {
            continue;
        }
        let Some(mut column) = table.read_column(name) else {
            debug!(column = %name, "consolidation column absent from table; skipped");
            outcome.skipped.push(name.clone());
            continue;
        };
        let consolidated = consolidate_column(&mut column, clusters, name);
        debug!(
            column = %name,
            filled = consolidated.filled,
            overwritten = consolidated.overwritten,
            "column consolidated"
        );
        table.write_column(name, column)?;
        outcome.columns.push(consolidated);
    }
    Ok(outcome)
}
