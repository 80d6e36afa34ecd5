//! # Disjoint Set Union over Row Labels
//!
//! The clustering state is an explicit array mapping every row to its current
//! cluster label. A label is always the smallest row index in its cluster, so
//! labels only ever decrease as clusters merge.
//!
//! Merges accepted during one key pass are collected in a [`PassUnion`] and
//! applied to the label array in one step once the pass is fully evaluated.

use crate::conflicts::StrongConflict;
use crate::model::{ClusterId, RowIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// An accepted merge of two clusters through a candidate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeEvent {
    /// Round in which the merge happened (1-based)
    pub round: usize,
    /// Name of the key that proposed the merge
    pub key: String,
    /// Cluster that was absorbed, as labelled at the start of the pass
    pub source: ClusterId,
    /// Cluster that absorbed it, as labelled at the start of the pass
    pub target: ClusterId,
}

/// A proposed merge rejected by the strong identity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedMerge {
    /// Round in which the proposal was first rejected
    pub round: usize,
    pub key: String,
    pub source: ClusterId,
    pub target: ClusterId,
    /// The contradiction that blocked the merge
    pub conflict: StrongConflict,
}

/// Result of evaluating one merge proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// The clusters are now one
    Merged,
    /// Both sides were already in the same cluster
    AlreadyJoined,
    /// The strong identity check rejected the merge
    Blocked { conflict: StrongConflict },
}

/// Union-find over cluster labels for a single key pass.
///
/// The root of every set is its smallest label.
#[derive(Debug, Clone, Default)]
pub struct PassUnion {
    parent: FxHashMap<ClusterId, ClusterId>,
}

impl PassUnion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the representative of a label (path halving).
    pub fn find(&mut self, label: ClusterId) -> ClusterId {
        let mut current = label;
        loop {
            let Some(&parent) = self.parent.get(&current) else {
                return current;
            };
            if parent == current {
                return current;
            }
            let grandparent = self.parent.get(&parent).copied().unwrap_or(parent);
            self.parent.insert(current, grandparent);
            current = grandparent;
        }
    }

    /// Join the sets of `a` and `b`. Returns the surviving root, or `None`
    /// when they were already joined.
    pub fn union(&mut self, a: ClusterId, b: ClusterId) -> Option<ClusterId> {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return None;
        }
        let (root, child) = if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent.insert(child, root);
        Some(root)
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

/// Row-to-label array owned by one resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDsu {
    labels: Vec<ClusterId>,
}

impl LabelDsu {
    /// Every row starts as its own singleton cluster.
    pub fn new(rows: usize) -> Self {
        Self {
            labels: (0..rows).map(|row| ClusterId(row as u32)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn label(&self, row: usize) -> ClusterId {
        self.labels[row]
    }

    pub fn labels(&self) -> &[ClusterId] {
        &self.labels
    }

    pub fn same_cluster(&self, a: usize, b: usize) -> bool {
        self.labels[a] == self.labels[b]
    }

    /// Members of every current cluster, in row order.
    pub fn members_by_label(&self) -> FxHashMap<ClusterId, Vec<RowIndex>> {
        let mut members: FxHashMap<ClusterId, Vec<RowIndex>> = FxHashMap::default();
        for (row, label) in self.labels.iter().enumerate() {
            members.entry(*label).or_default().push(RowIndex::from(row));
        }
        members
    }

    /// Relabel every row through the pass unions. Returns the number of rows
    /// whose label changed.
    pub fn apply(&mut self, pass: &mut PassUnion) -> usize {
        if pass.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for label in &mut self.labels {
            let root = pass.find(*label);
            if root != *label {
                debug_assert!(root < *label);
                *label = root;
                changed += 1;
            }
        }
        changed
    }

    /// Number of distinct clusters.
    pub fn cluster_count(&self) -> usize {
        self.labels
            .iter()
            .enumerate()
            .filter(|(row, label)| label.as_usize() == *row)
            .count()
    }

    /// All clusters ordered by label, members in row order.
    pub fn clusters(&self) -> Clusters {
        let mut members = self.members_by_label();
        let mut labels: Vec<ClusterId> = members.keys().copied().collect();
        labels.sort_unstable();
        let clusters = labels
            .into_iter()
            .map(|label| Cluster::new(label, members.remove(&label).unwrap_or_default()))
            .collect();
        Clusters { clusters }
    }
}

/// A cluster of records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Label of this cluster (its smallest member row)
    pub id: ClusterId,
    /// All records in this cluster, ascending
    pub records: Vec<RowIndex>,
}

impl Cluster {
    pub fn new(id: ClusterId, records: Vec<RowIndex>) -> Self {
        Self { id, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, record: RowIndex) -> bool {
        self.records.binary_search(&record).is_ok()
    }
}

/// Collection of all clusters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clusters {
    pub clusters: Vec<Cluster>,
}

impl Clusters {
    pub fn get_cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters
            .binary_search_by_key(&id, |cluster| cluster.id)
            .ok()
            .map(|idx| &self.clusters[idx])
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }
}
