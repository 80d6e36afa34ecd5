use std::fmt;

use crate::config::ConfigError;

/// Errors that abort a resolution run before any clustering work happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Required input columns are absent from the table.
    MissingColumns { columns: Vec<String> },
    /// The key set, identifier policy or engine settings are unusable.
    InvalidConfig(String),
    /// Reading or writing the underlying table failed.
    Table(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns { columns } => {
                write!(f, "missing required column(s): {}", columns.join(", "))
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Table(msg) => write!(f, "table error: {msg}"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<ConfigError> for ResolveError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig(e.message)
    }
}

impl From<csv::Error> for ResolveError {
    fn from(e: csv::Error) -> Self {
        Self::Table(e.to_string())
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(e: std::io::Error) -> Self {
        Self::Table(e.to_string())
    }
}
