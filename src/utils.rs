//! # Utilities Module
//!
//! Duplicate reports and graph exports built from a [`ResolutionReport`].

use crate::model::{ClusterId, RowIndex};
use crate::table::Table;
use crate::ResolutionReport;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// A student recognized across several rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub student_id: String,
    pub members: Vec<RowIndex>,
    /// Names of the keys whose merges built this group, sorted
    pub keys: Vec<String>,
}

/// Every entity backed by more than one row, in identifier order.
pub fn duplicate_groups(report: &ResolutionReport) -> Vec<DuplicateGroup> {
    let mut keys_by_cluster: BTreeMap<ClusterId, BTreeSet<&str>> = BTreeMap::new();
    for merge in &report.merges {
        if let Some(label) = report.assignment.get(merge.target.as_usize()) {
            keys_by_cluster
                .entry(*label)
                .or_default()
                .insert(merge.key.as_str());
        }
    }

    report
        .duplicated()
        .map(|entity| DuplicateGroup {
            student_id: entity.student_id.clone(),
            members: entity.members.clone(),
            keys: keys_by_cluster
                .get(&entity.cluster)
                .map(|keys| keys.iter().map(|key| key.to_string()).collect())
                .unwrap_or_default(),
        })
        .collect()
}

/// Write one CSV line per duplicated row: identifier, row number, then the
/// requested columns as they currently stand in `table`.
///
/// Returns the number of data lines written.
pub fn write_duplicates_csv<W: Write>(
    report: &ResolutionReport,
    table: &dyn Table,
    columns: &[String],
    writer: W,
) -> Result<usize> {
    let loaded: Vec<(&str, Vec<Option<String>>)> = columns
        .iter()
        .filter_map(|name| table.read_column(name).map(|column| (name.as_str(), column)))
        .collect();

    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["student_id", "row"];
    header.extend(loaded.iter().map(|(name, _)| *name));
    out.write_record(&header)?;

    let mut lines = 0;
    for group in duplicate_groups(report) {
        for row in &group.members {
            let mut record = vec![group.student_id.clone(), row.0.to_string()];
            for (_, column) in &loaded {
                record.push(
                    column
                        .get(row.as_usize())
                        .cloned()
                        .flatten()
                        .unwrap_or_default(),
                );
            }
            out.write_record(&record)?;
            lines += 1;
        }
    }
    out.flush()?;
    Ok(lines)
}

/// Export the merge graph to DOT format for visualization.
///
/// Only duplicated entities are drawn. Accepted merges are green edges
/// labelled with their key; blocked guarded merges are red dashed edges.
pub fn export_to_dot(report: &ResolutionReport) -> String {
    let mut dot = String::new();

    dot.push_str("digraph Students {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=filled];\n");
    dot.push_str("  edge [fontsize=10];\n\n");

    for entity in report.duplicated() {
        dot.push_str(&format!("  subgraph cluster_{} {{\n", entity.cluster.0));
        dot.push_str(&format!("    label=\"{}\";\n", entity.student_id));
        dot.push_str("    style=filled;\n");
        dot.push_str("    color=lightgray;\n");
        for row in &entity.members {
            dot.push_str(&format!(
                "    \"{}\" [label=\"{}\", fillcolor=lightblue];\n",
                row, row
            ));
        }
        dot.push_str("  }\n\n");
    }

    for merge in &report.merges {
        dot.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\\nround {}\", color=green, style=bold];\n",
            RowIndex(merge.target.0),
            RowIndex(merge.source.0),
            merge.key,
            merge.round
        ));
    }

    for blocked in &report.blocked {
        dot.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\\n{}\", color=red, style=dashed];\n",
            RowIndex(blocked.target.0),
            RowIndex(blocked.source.0),
            blocked.key,
            blocked.conflict.attribute
        ));
    }

    dot.push_str("}\n");
    dot
}

/// Plain-text overview of a resolution run.
pub fn export_to_text_summary(report: &ResolutionReport) -> String {
    let mut summary = String::new();

    summary.push_str("Resolution Summary\n");
    summary.push_str("==================\n\n");
    summary.push_str(&format!("Rows: {}\n", report.row_count()));
    summary.push_str(&format!("Students: {}\n", report.student_count()));
    summary.push_str(&format!(
        "Duplicated students: {}\n",
        report.duplicated().count()
    ));
    summary.push_str(&format!(
        "Rounds: {} ({})\n",
        report.convergence.rounds(),
        if report.converged() {
            "converged"
        } else {
            "incomplete"
        }
    ));
    summary.push_str(&format!("Merges: {}\n", report.merges.len()));
    summary.push_str(&format!("Blocked merges: {}\n", report.blocked.len()));

    if !report.consolidation.columns.is_empty() {
        summary.push_str("\nConsolidation:\n");
        for column in &report.consolidation.columns {
            summary.push_str(&format!(
                "  {}: {} filled, {} overwritten\n",
                column.name, column.filled, column.overwritten
            ));
        }
    }
    if !report.consolidation.skipped.is_empty() {
        summary.push_str(&format!(
            "  skipped (absent): {}\n",
            report.consolidation.skipped.join(", ")
        ));
    }

    summary
}

/// Save DOT content to file
pub fn save_dot_to_file(dot_content: &str, filename: &str) -> Result<()> {
    std::fs::write(filename, dot_content)?;
    Ok(())
}
