//! # Ontology Module
//!
//! Defines the resolution rules: which candidate keys link records, which of
//! them are trusted, and which attributes form the strong identity that a
//! guarded merge must not contradict.

use crate::config::defaults::*;
use crate::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One component of a candidate key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyComponent {
    /// Surname (required) followed by given names (optional), free-text normalized.
    Name {
        surname: String,
        given_names: String,
    },
    /// Free-text column: uppercased, only ASCII alphanumerics kept.
    Text(String),
    /// Raw identifier column (dates, id numbers, phones): alphanumerics and hyphens kept.
    Identifier(String),
}

impl KeyComponent {
    /// Columns this component reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Name {
                surname,
                given_names,
            } => vec![surname.as_str(), given_names.as_str()],
            Self::Text(column) | Self::Identifier(column) => vec![column.as_str()],
        }
    }
}

/// Whether a key's merges are trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrength {
    /// Backed by an authoritative field; merges are always accepted.
    Strong,
    /// Backed by circumstantial data.
    Weak,
}

/// A named candidate key: a set of identity fields that must all be present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyDefinition {
    /// Human-readable name for this key
    pub name: String,
    /// Components concatenated, in order, to form the key string
    pub components: Vec<KeyComponent>,
    pub strength: KeyStrength,
    /// Inter-cluster merges through this key must pass the strong identity check
    #[serde(default)]
    pub guarded: bool,
}

impl KeyDefinition {
    pub fn new(name: &str, components: Vec<KeyComponent>, strength: KeyStrength) -> Self {
        Self {
            name: name.to_string(),
            components,
            strength,
            guarded: false,
        }
    }

    /// Require the strong identity check for merges across clusters.
    pub fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }

    pub fn is_strong(&self) -> bool {
        self.strength == KeyStrength::Strong
    }
}

/// An attribute that must not hold two different values inside a cluster
/// formed through a guarded key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrongIdentifier {
    /// The column holding the identity value
    pub column: String,
    pub name: String,
}

impl StrongIdentifier {
    pub fn new(column: &str, name: &str) -> Self {
        Self {
            column: column.to_string(),
            name: name.to_string(),
        }
    }
}

/// The complete rule set for one resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ontology {
    /// Candidate keys, in per-round processing order
    pub keys: Vec<KeyDefinition>,
    /// Attributes checked before accepting a guarded merge
    pub strong_identifiers: Vec<StrongIdentifier>,
    /// Column holding the academic year range (e.g. `2023-2024`)
    pub academic_year: String,
}

impl Ontology {
    /// Create an ontology with no keys.
    pub fn new(academic_year: &str) -> Self {
        Self {
            keys: Vec::new(),
            strong_identifiers: Vec::new(),
            academic_year: academic_year.to_string(),
        }
    }

    pub fn add_key(&mut self, key: KeyDefinition) {
        self.keys.push(key);
    }

    pub fn add_strong_identifier(&mut self, strong_identifier: StrongIdentifier) {
        self.strong_identifiers.push(strong_identifier);
    }

    /// The six enrollment keys: two strong (birthdate, national id), four weak,
    /// with the organizational-unit + track key guarded.
    pub fn student_default() -> Self {
        let name = || KeyComponent::Name {
            surname: COL_SURNAME.to_string(),
            given_names: COL_GIVEN_NAMES.to_string(),
        };
        let text = |column: &str| KeyComponent::Text(column.to_string());
        let ident = |column: &str| KeyComponent::Identifier(column.to_string());

        let mut ontology = Self::new(COL_ACADEMIC_YEAR);
        ontology.add_key(KeyDefinition::new(
            "np_naissance",
            vec![name(), ident(COL_BIRTHDATE)],
            KeyStrength::Strong,
        ));
        ontology.add_key(KeyDefinition::new(
            "np_cin",
            vec![name(), ident(COL_NATIONAL_ID)],
            KeyStrength::Strong,
        ));
        ontology.add_key(KeyDefinition::new(
            "np_cin_lieu",
            vec![name(), text(COL_NATIONAL_ID_PLACE)],
            KeyStrength::Weak,
        ));
        ontology.add_key(KeyDefinition::new(
            "np_telephone",
            vec![name(), ident(COL_PHONE)],
            KeyStrength::Weak,
        ));
        ontology.add_key(KeyDefinition::new(
            "np_mail",
            vec![name(), text(COL_EMAIL)],
            KeyStrength::Weak,
        ));
        ontology.add_key(
            KeyDefinition::new(
                "np_composante_mention",
                vec![name(), text(COL_UNIT), text(COL_TRACK)],
                KeyStrength::Weak,
            )
            .guarded(),
        );

        ontology.add_strong_identifier(StrongIdentifier::new(COL_NATIONAL_ID, "cin"));
        ontology.add_strong_identifier(StrongIdentifier::new(COL_BIRTHDATE, "naissance_date"));
        ontology
    }

    /// Every column the engine reads, deduplicated, in first-use order.
    pub fn required_columns(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut columns = Vec::new();
        let key_columns = self
            .keys
            .iter()
            .flat_map(|key| key.components.iter())
            .flat_map(|component| component.columns());
        let strong_columns = self.strong_identifiers.iter().map(|s| s.column.as_str());

        for column in key_columns
            .chain(strong_columns)
            .chain(std::iter::once(self.academic_year.as_str()))
        {
            if seen.insert(column) {
                columns.push(column.to_string());
            }
        }
        columns
    }

    /// Reject rule sets the engine cannot run.
    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.keys.is_empty() {
            return Err(ResolveError::InvalidConfig(
                "at least one candidate key is required".to_string(),
            ));
        }
        let mut names = BTreeSet::new();
        for key in &self.keys {
            if key.components.is_empty() {
                return Err(ResolveError::InvalidConfig(format!(
                    "key '{}' has no components",
                    key.name
                )));
            }
            if !names.insert(key.name.as_str()) {
                return Err(ResolveError::InvalidConfig(format!(
                    "duplicate key name '{}'",
                    key.name
                )));
            }
            if key.guarded && key.is_strong() {
                return Err(ResolveError::InvalidConfig(format!(
                    "key '{}' is strong and cannot be guarded",
                    key.name
                )));
            }
            if key.guarded && self.strong_identifiers.is_empty() {
                return Err(ResolveError::InvalidConfig(format!(
                    "key '{}' is guarded but no strong identifiers are configured",
                    key.name
                )));
            }
        }
        Ok(())
    }

    pub fn strong_keys(&self) -> impl Iterator<Item = &KeyDefinition> {
        self.keys.iter().filter(|key| key.is_strong())
    }
}

impl Default for Ontology {
    fn default() -> Self {
        Self::student_default()
    }
}
