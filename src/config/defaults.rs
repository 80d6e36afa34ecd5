//! Default constants for unistudent configuration.
//!
//! Column names follow the cleaned enrollment export.

// =============================================================================
// Identity Columns
// =============================================================================

pub const COL_SURNAME: &str = "nom";
pub const COL_GIVEN_NAMES: &str = "prenoms";
pub const COL_BIRTHDATE: &str = "naissance_date";
/// National identity card number
pub const COL_NATIONAL_ID: &str = "cin";
/// Place where the national identity card was issued
pub const COL_NATIONAL_ID_PLACE: &str = "cin_lieu";
pub const COL_PHONE: &str = "telephone";
pub const COL_EMAIL: &str = "mail";
/// Organizational unit (faculty / school)
pub const COL_UNIT: &str = "composante";
/// Track within the unit
pub const COL_TRACK: &str = "mention";
/// Academic year range, e.g. `2023-2024`
pub const COL_ACADEMIC_YEAR: &str = "annee_universitaire";

// =============================================================================
// Key Normalization
// =============================================================================

/// Separator between key components
pub const KEY_SEPARATOR: &str = "_";

// =============================================================================
// Cluster Engine
// =============================================================================

/// Rounds allowed per candidate key before the engine gives up.
/// The round cap is `key_count * DEFAULT_ROUNDS_PER_KEY` unless set explicitly.
pub const DEFAULT_ROUNDS_PER_KEY: usize = 4;

// =============================================================================
// Identifier Policy
// =============================================================================

pub const DEFAULT_ID_PREFIX: &str = "ETU";

/// Zero-padding width of the sequence number
pub const DEFAULT_ID_WIDTH: usize = 6;

/// Academic-year start used when no member has a parseable year.
/// Sorts incomplete clusters after every real year.
pub const DEFAULT_MISSING_YEAR: u32 = 9999;

pub const DEFAULT_ID_COLUMN: &str = "code_etudiant";

// =============================================================================
// Consolidation
// =============================================================================

/// Student-level attributes propagated across every record of a cluster.
/// Enrollment-level fields (unit, track, level, year) stay per-row.
pub const DEFAULT_CONSOLIDATION_COLUMNS: &[&str] = &[
    "nom",
    "prenoms",
    "cin",
    "cin_date",
    "cin_lieu",
    "nationalite",
    "naissance_lieu",
    "mail",
    "telephone",
    "adresse",
    "sexe",
    "bacc_annee",
    "bacc_serie",
    "bacc_numero",
    "bacc_centre",
    "bacc_mention",
    "naissance_date",
    "numero_inscription",
];

pub fn default_consolidation_columns() -> Vec<String> {
    DEFAULT_CONSOLIDATION_COLUMNS
        .iter()
        .map(|column| column.to_string())
        .collect()
}
