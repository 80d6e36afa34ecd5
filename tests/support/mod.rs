use std::collections::BTreeSet;
use unistudent::{Frame, ResolutionReport, Resolver, ResolverConfig};

#[allow(dead_code)]
pub fn resolve_default(frame: &mut Frame) -> ResolutionReport {
    Resolver::new(ResolverConfig::default())
        .unwrap()
        .resolve(frame)
        .unwrap()
}

/// Final clusters as sorted row sets, independent of labels and identifiers.
#[allow(dead_code)]
pub fn partition(report: &ResolutionReport) -> BTreeSet<Vec<usize>> {
    report
        .entities
        .iter()
        .map(|entity| entity.members.iter().map(|row| row.as_usize()).collect())
        .collect()
}

/// Rows grouped by a generating label (e.g. the person behind each row).
#[allow(dead_code)]
pub fn partition_by<T: Ord + Copy>(labels: &[T]) -> BTreeSet<Vec<usize>> {
    let mut groups: std::collections::BTreeMap<T, Vec<usize>> = Default::default();
    for (row, label) in labels.iter().enumerate() {
        groups.entry(*label).or_default().push(row);
    }
    groups.into_values().collect()
}
