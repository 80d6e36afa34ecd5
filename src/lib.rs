//! # Unistudent
//!
//! Student entity resolution for enrollment tables assembled from many
//! independently produced spreadsheets.
//!
//! Rows describing the same person are clustered through candidate keys
//! (name + birthdate, name + national id, ...). Merges through the weak
//! organizational key are guarded by a strong identity check. Every cluster
//! receives a stable identifier and one consolidated value per tracked
//! attribute.
//!
//! ```no_run
//! use unistudent::{Frame, Resolver, ResolverConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut table = Frame::from_csv_path("inscriptions.csv")?;
//! let resolver = Resolver::new(ResolverConfig::default())?;
//! let report = resolver.resolve(&mut table)?;
//! println!("{} students", report.student_count());
//! # Ok(())
//! # }
//! ```

pub mod assign;
pub mod config;
pub mod conflicts;
pub mod consolidate;
pub mod dsu;
pub mod error;
pub mod keys;
pub mod linker;
pub mod model;
pub mod ontology;
pub mod table;
#[doc(hidden)]
pub mod test_support;
pub mod utils;

// Re-export main types for convenience
pub use assign::{IdentifierPolicy, PlainSequence, YearSequence};
pub use config::{IdentifierStyle, ResolverConfig};
pub use conflicts::{StrongConflict, StrongIdentityChecker};
pub use consolidate::Consolidation;
pub use dsu::{BlockedMerge, MergeEvent};
pub use error::ResolveError;
pub use linker::{Convergence, LinkOutcome};
pub use model::{ClusterId, RowIndex, StudentEntity};
pub use ontology::{KeyComponent, KeyDefinition, KeyStrength, Ontology, StrongIdentifier};
pub use table::{Frame, Table};

use crate::assign::{assign_identifiers, identifier_column};
use crate::consolidate::consolidate_fields;
use crate::dsu::Clusters;
use crate::keys::KeyTable;
use crate::linker::ClusterEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Everything a resolution run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// One entity per final cluster, in identifier sequence order
    pub entities: Vec<StudentEntity>,
    /// Final cluster label of every row
    pub assignment: Vec<ClusterId>,
    pub convergence: Convergence,
    /// Accepted inter-cluster merges
    pub merges: Vec<MergeEvent>,
    /// Guarded merges rejected by the strong identity check
    pub blocked: Vec<BlockedMerge>,
    pub consolidation: Consolidation,
}

impl ResolutionReport {
    /// False when the round cap was hit; the clustering is then best-effort.
    pub fn converged(&self) -> bool {
        self.convergence.is_converged()
    }

    pub fn student_count(&self) -> usize {
        self.entities.len()
    }

    pub fn row_count(&self) -> usize {
        self.assignment.len()
    }

    /// The entity a row was folded into.
    pub fn entity_for_row(&self, row: usize) -> Option<&StudentEntity> {
        let label = *self.assignment.get(row)?;
        self.entities.iter().find(|entity| entity.cluster == label)
    }

    pub fn student_id(&self, row: usize) -> Option<&str> {
        self.entity_for_row(row)
            .map(|entity| entity.student_id.as_str())
    }

    /// Entities backed by more than one row.
    pub fn duplicated(&self) -> impl Iterator<Item = &StudentEntity> {
        self.entities.iter().filter(|entity| entity.is_duplicated())
    }
}

/// Main API for student resolution.
pub struct Resolver {
    config: ResolverConfig,
    policy: Box<dyn IdentifierPolicy>,
}

impl Resolver {
    /// Create a resolver using the identifier policy selected in `config`.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        let policy = config.identifier.policy();
        Self::with_policy(config, policy)
    }

    /// Create a resolver with a custom identifier policy.
    pub fn with_policy(
        config: ResolverConfig,
        policy: Box<dyn IdentifierPolicy>,
    ) -> Result<Self, ResolveError> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn ontology(&self) -> &Ontology {
        &self.config.ontology
    }

    /// Check every required column up front, before any clustering work.
    pub fn validate_schema(&self, table: &dyn Table) -> Result<(), ResolveError> {
        let missing: Vec<String> = self
            .config
            .ontology
            .required_columns()
            .into_iter()
            .filter(|column| !table.has_column(column))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ResolveError::MissingColumns { columns: missing })
        }
    }

    /// Cluster the table without modifying it.
    pub fn cluster(&self, table: &dyn Table) -> Result<LinkOutcome, ResolveError> {
        self.validate_schema(table)?;
        let ontology = &self.config.ontology;
        let keys = KeyTable::build(table, ontology)?;
        let checker = StrongIdentityChecker::load(table, ontology)?;
        let max_rounds = self.config.engine.round_cap(ontology.keys.len());
        Ok(ClusterEngine::new(ontology, &keys, &checker, max_rounds).run())
    }

    /// Cluster, assign identifiers and consolidate fields in place.
    ///
    /// Adds the identifier column (and the cluster column when configured)
    /// and overwrites the consolidation columns. On error the table is left
    /// untouched.
    #[instrument(skip_all, fields(rows = table.row_count()))]
    pub fn resolve(&self, table: &mut dyn Table) -> Result<ResolutionReport, ResolveError> {
        let link = self.cluster(&*table)?;
        let rows = table.row_count();
        let clusters = link.dsu.clusters();

        let ontology = &self.config.ontology;
        let years = table
            .read_column(&ontology.academic_year)
            .ok_or_else(|| ResolveError::MissingColumns {
                columns: vec![ontology.academic_year.clone()],
            })?;
        let identifier = &self.config.identifier;
        let assignments = assign_identifiers(
            &clusters,
            &years,
            self.policy.as_ref(),
            identifier.missing_year_sentinel,
        );

        let consolidation =
            consolidate_fields(table, &clusters, &self.config.consolidation.columns)?;
        table.write_column(&identifier.column, identifier_column(&assignments, rows))?;
        if let Some(cluster_column) = &identifier.cluster_column {
            let labels = link
                .dsu
                .labels()
                .iter()
                .map(|label| Some(label.0.to_string()))
                .collect();
            table.write_column(cluster_column, labels)?;
        }

        let entities = assignments
            .into_iter()
            .map(|assignment| {
                let consolidated = consolidated_values(&consolidation, &clusters, assignment.cluster);
                StudentEntity {
                    student_id: assignment.student_id,
                    cluster: assignment.cluster,
                    sequence: assignment.sequence,
                    earliest_year: assignment.earliest_year,
                    members: assignment.members,
                    consolidated,
                }
            })
            .collect::<Vec<_>>();

        if !link.convergence.is_converged() {
            warn!(
                rounds = link.convergence.rounds(),
                "resolution incomplete: round cap reached"
            );
        }
        if !link.blocked.is_empty() {
            warn!(
                blocked = link.blocked.len(),
                "guarded merges rejected on strong identity conflicts"
            );
        }
        info!(
            rows,
            students = entities.len(),
            rounds = link.convergence.rounds(),
            merges = link.merges.len(),
            "resolution finished"
        );

        Ok(ResolutionReport {
            entities,
            assignment: link.dsu.labels().to_vec(),
            convergence: link.convergence,
            merges: link.merges,
            blocked: link.blocked,
            consolidation,
        })
    }
}

fn consolidated_values(
    consolidation: &Consolidation,
    clusters: &Clusters,
    label: ClusterId,
) -> BTreeMap<String, Option<String>> {
    let Ok(position) = clusters
        .clusters
        .binary_search_by_key(&label, |cluster| cluster.id)
    else {
        return BTreeMap::new();
    };
    consolidation
        .columns
        .iter()
        .map(|column| {
            (
                column.name.clone(),
                column.representatives.get(position).cloned().flatten(),
            )
        })
        .collect()
}
