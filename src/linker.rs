//! # Linker Module
//!
//! Runs the guarded clustering to a fixed point. A round processes every
//! candidate key once, in ontology order. For each key, rows sharing a value
//! propose to join the smallest label in their group; proposals are evaluated
//! against the labels as they stood at the start of the pass and applied only
//! once the whole pass is decided.

use crate::conflicts::StrongIdentityChecker;
use crate::dsu::{BlockedMerge, LabelDsu, MergeEvent, MergeResult, PassUnion};
use crate::keys::{KeyColumn, KeyTable};
use crate::model::{ClusterId, RowIndex};
use crate::ontology::{KeyDefinition, Ontology};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// How a clustering run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Convergence {
    /// A full round produced no merge.
    Converged { rounds: usize },
    /// The round cap was reached while merges were still happening.
    Incomplete { rounds: usize },
}

impl Convergence {
    pub fn rounds(&self) -> usize {
        match self {
            Self::Converged { rounds } | Self::Incomplete { rounds } => *rounds,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }
}

/// Final state of a clustering run.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub dsu: LabelDsu,
    pub convergence: Convergence,
    /// Accepted inter-cluster merges, in the order they were decided
    pub merges: Vec<MergeEvent>,
    /// Distinct guarded proposals that were rejected
    pub blocked: Vec<BlockedMerge>,
}

/// Guarded fixed-point clustering over a precomputed key table.
pub struct ClusterEngine<'a> {
    ontology: &'a Ontology,
    keys: &'a KeyTable,
    checker: &'a StrongIdentityChecker,
    max_rounds: usize,
}

/// Mutable state carried across passes of one run.
struct RunState {
    dsu: LabelDsu,
    merges: Vec<MergeEvent>,
    blocked: Vec<BlockedMerge>,
    blocked_seen: FxHashSet<(usize, ClusterId, ClusterId)>,
}

impl<'a> ClusterEngine<'a> {
    pub fn new(
        ontology: &'a Ontology,
        keys: &'a KeyTable,
        checker: &'a StrongIdentityChecker,
        max_rounds: usize,
    ) -> Self {
        Self {
            ontology,
            keys,
            checker,
            max_rounds: max_rounds.max(1),
        }
    }

    /// Cluster every row. Always returns the best clustering reached, even
    /// when the round cap cuts the run short.
    pub fn run(&self) -> LinkOutcome {
        let mut state = RunState {
            dsu: LabelDsu::new(self.keys.row_count()),
            merges: Vec::new(),
            blocked: Vec::new(),
            blocked_seen: FxHashSet::default(),
        };

        for round in 1..=self.max_rounds {
            let mut round_merges = 0;
            for (key_index, definition) in self.ontology.keys.iter().enumerate() {
                round_merges += self.run_key_pass(round, key_index, definition, &mut state);
            }
            debug!(
                round,
                merges = round_merges,
                clusters = state.dsu.cluster_count(),
                "clustering round finished"
            );
            if round_merges == 0 {
                return state.finish(Convergence::Converged { rounds: round });
            }
        }

        warn!(
            rounds = self.max_rounds,
            clusters = state.dsu.cluster_count(),
            "clustering did not converge within the round cap; returning partial clustering"
        );
        state.finish(Convergence::Incomplete {
            rounds: self.max_rounds,
        })
    }

    /// Process one key: propose, evaluate, then apply. Returns accepted merges.
    fn run_key_pass(
        &self,
        round: usize,
        key_index: usize,
        definition: &KeyDefinition,
        state: &mut RunState,
    ) -> usize {
        let proposals = propose(self.keys.key(key_index), &state.dsu);
        if proposals.is_empty() {
            return 0;
        }

        let mut pass = PassUnion::new();
        // Snapshot membership only when the guard needs it.
        let mut members = if definition.guarded {
            state.dsu.members_by_label()
        } else {
            FxHashMap::default()
        };

        let mut accepted = 0;
        for &(target, source) in &proposals {
            let result = if definition.guarded {
                self.evaluate_guarded(&mut pass, &mut members, source, target)
            } else {
                match pass.union(source, target) {
                    Some(_) => MergeResult::Merged,
                    None => MergeResult::AlreadyJoined,
                }
            };

            match result {
                MergeResult::Merged => {
                    accepted += 1;
                    state.merges.push(MergeEvent {
                        round,
                        key: definition.name.clone(),
                        source,
                        target,
                    });
                }
                MergeResult::AlreadyJoined => {}
                MergeResult::Blocked { conflict } => {
                    if state.blocked_seen.insert((key_index, source, target)) {
                        debug!(
                            key = %definition.name,
                            %source,
                            %target,
                            %conflict,
                            "guarded merge rejected"
                        );
                        state.blocked.push(BlockedMerge {
                            round,
                            key: definition.name.clone(),
                            source,
                            target,
                            conflict,
                        });
                    }
                }
            }
        }

        let relabelled = state.dsu.apply(&mut pass);
        if accepted > 0 {
            debug!(
                round,
                key = %definition.name,
                proposals = proposals.len(),
                accepted,
                relabelled,
                "key pass applied"
            );
        }
        accepted
    }

    /// Check the accumulated membership of both sides before joining them.
    fn evaluate_guarded(
        &self,
        pass: &mut PassUnion,
        members: &mut FxHashMap<ClusterId, Vec<RowIndex>>,
        source: ClusterId,
        target: ClusterId,
    ) -> MergeResult {
        let root_source = pass.find(source);
        let root_target = pass.find(target);
        if root_source == root_target {
            return MergeResult::AlreadyJoined;
        }

        let empty = Vec::new();
        let left = members.get(&root_source).unwrap_or(&empty);
        let right = members.get(&root_target).unwrap_or(&empty);
        if let Some(conflict) = self.checker.check_union(left, right) {
            return MergeResult::Blocked { conflict };
        }

        let Some(root) = pass.union(root_source, root_target) else {
            return MergeResult::AlreadyJoined;
        };
        let absorbed = if root == root_source {
            root_target
        } else {
            root_source
        };
        let moved = members.remove(&absorbed).unwrap_or_default();
        let survivor = members.entry(root).or_default();
        survivor.extend(moved);
        MergeResult::Merged
    }
}

impl RunState {
    fn finish(self, convergence: Convergence) -> LinkOutcome {
        LinkOutcome {
            dsu: self.dsu,
            convergence,
            merges: self.merges,
            blocked: self.blocked,
        }
    }
}

/// Distinct `(target, source)` proposals for one key, sorted.
///
/// The target of a group is the smallest current label among rows sharing
/// the key value; every row with a larger label proposes to join it.
fn propose(column: &KeyColumn, dsu: &LabelDsu) -> BTreeSet<(ClusterId, ClusterId)> {
    let mut canonical: Vec<Option<ClusterId>> = vec![None; column.distinct()];
    for row in 0..dsu.len() {
        let Some(value) = column.value_id(row) else {
            continue;
        };
        let label = dsu.label(row);
        let slot = &mut canonical[value as usize];
        *slot = Some(slot.map_or(label, |current| current.min(label)));
    }

    let mut proposals = BTreeSet::new();
    for row in 0..dsu.len() {
        let Some(value) = column.value_id(row) else {
            continue;
        };
        let label = dsu.label(row);
        if let Some(target) = canonical[value as usize] {
            if label > target {
                proposals.insert((target, label));
            }
        }
    }
    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::{KeyComponent, KeyStrength};
    use crate::table::Frame;

    /// Two keys over plain text columns: `a` strong, `b` weak and guarded,
    /// with `id` as the strong identifier.
    fn ontology(guarded: bool) -> Ontology {
        let mut ontology = Ontology::new("year");
        ontology.add_key(KeyDefinition::new(
            "a",
            vec![KeyComponent::Text("a".into())],
            KeyStrength::Strong,
        ));
        let mut weak = KeyDefinition::new("b", vec![KeyComponent::Text("b".into())], KeyStrength::Weak);
        weak.guarded = guarded;
        ontology.add_key(weak);
        ontology.add_strong_identifier(crate::ontology::StrongIdentifier::new("id", "id"));
        ontology
    }

    fn run(frame: &Frame, ontology: &Ontology, max_rounds: usize) -> LinkOutcome {
        let keys = KeyTable::build(frame, ontology).unwrap();
        let checker = StrongIdentityChecker::load(frame, ontology).unwrap();
        ClusterEngine::new(ontology, &keys, &checker, max_rounds).run()
    }

    #[test]
    fn test_chain_across_keys_converges() {
        // 0-1 via a, 1-2 via b, 2-3 via a
        let frame = Frame::from_records(
            &["a", "b", "id", "year"],
            &[
                vec!["x", "", "", ""],
                vec!["x", "p", "", ""],
                vec!["y", "p", "", ""],
                vec!["y", "", "", ""],
            ],
        )
        .unwrap();
        let outcome = run(&frame, &ontology(true), 10);
        assert!(outcome.convergence.is_converged());
        assert_eq!(outcome.dsu.cluster_count(), 1);
        assert!(outcome.blocked.is_empty());
        assert_eq!(outcome.merges.len(), 3);
    }

    #[test]
    fn test_guard_blocks_contradicting_clusters() {
        let frame = Frame::from_records(
            &["a", "b", "id", "year"],
            &[vec!["", "p", "111", ""], vec!["", "p", "222", ""]],
        )
        .unwrap();

        let guarded = run(&frame, &ontology(true), 10);
        assert_eq!(guarded.dsu.cluster_count(), 2);
        assert_eq!(guarded.blocked.len(), 1);
        assert_eq!(guarded.blocked[0].key, "b");
        assert_eq!(guarded.blocked[0].conflict.attribute, "id");

        let unguarded = run(&frame, &ontology(false), 10);
        assert_eq!(unguarded.dsu.cluster_count(), 1);
    }

    #[test]
    fn test_guard_sees_accumulated_membership() {
        // Rows 1 and 2 each agree with row 0 alone, but not with each other.
        let frame = Frame::from_records(
            &["a", "b", "id", "year"],
            &[
                vec!["", "p", "", ""],
                vec!["", "p", "111", ""],
                vec!["", "p", "222", ""],
            ],
        )
        .unwrap();
        let outcome = run(&frame, &ontology(true), 10);
        assert!(outcome.dsu.same_cluster(0, 1));
        assert!(!outcome.dsu.same_cluster(0, 2));
        assert_eq!(outcome.blocked.len(), 1);
        assert_eq!(outcome.blocked[0].source, ClusterId(2));
    }

    #[test]
    fn test_strong_key_merges_despite_contradiction() {
        let frame = Frame::from_records(
            &["a", "b", "id", "year"],
            &[vec!["x", "", "111", ""], vec!["x", "", "222", ""]],
        )
        .unwrap();
        let outcome = run(&frame, &ontology(true), 10);
        assert_eq!(outcome.dsu.cluster_count(), 1);
    }

    #[test]
    fn test_round_cap_reports_incomplete() {
        let frame = Frame::from_records(
            &["a", "b", "id", "year"],
            &[vec!["x", "", "", ""], vec!["x", "", "", ""]],
        )
        .unwrap();
        let outcome = run(&frame, &ontology(true), 1);
        assert_eq!(outcome.convergence, Convergence::Incomplete { rounds: 1 });
        // The partial clustering is still returned.
        assert_eq!(outcome.dsu.cluster_count(), 1);

        let outcome = run(&frame, &ontology(true), 2);
        assert_eq!(outcome.convergence, Convergence::Converged { rounds: 2 });
    }

    #[test]
    fn test_absent_keys_never_link() {
        let frame = Frame::from_records(
            &["a", "b", "id", "year"],
            &[vec!["", "", "1", ""], vec!["", "", "1", ""]],
        )
        .unwrap();
        let outcome = run(&frame, &ontology(true), 10);
        assert_eq!(outcome.dsu.cluster_count(), 2);
        assert_eq!(outcome.convergence, Convergence::Converged { rounds: 1 });
    }
}
