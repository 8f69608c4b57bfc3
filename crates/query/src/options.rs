//! Backend options.
//!
//! Options arrive as `key=value` pairs (`-O table=events`) or from a
//! config file. Only the keys listed in [`OPTIONS`] are accepted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder table name used when none is configured.
pub const DEFAULT_TABLE: &str = "<org>";

/// Recognised option keys with their descriptions.
pub const OPTIONS: &[(&str, &str, &str)] = &[
    ("table", DEFAULT_TABLE, "Table the query reads from"),
    ("select", "", "Comma separated fields to select; enables field selection"),
    ("selection", "false", "Enable field selection from rule 'fields'"),
    ("type1", "", "Comma separated type fields (reserved)"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Unknown backend option: {0}")]
    UnknownOption(String),
    #[error("Invalid value '{value}' for backend option '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Configuration of the SQL backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendOptions {
    /// Table name
    pub table: String,

    /// Fields selected in addition to those declared by the rule
    pub select_fields: Vec<String>,

    /// Honor the resolved field list instead of selecting `*`
    pub selection_enabled: bool,

    /// Type fields, kept for collaborators
    pub type1_fields: Vec<String>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            select_fields: Vec::new(),
            selection_enabled: false,
            type1_fields: Vec::new(),
        }
    }
}

impl BackendOptions {
    /// Parse `key=value` pairs. A pair without `=` is a key with an empty value.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();

        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (key, value) = (key.trim(), value.trim());

            match key {
                "table" if !value.is_empty() => options.table = value.to_string(),
                "table" => {}
                "select" => options.select_fields = split_list(value),
                "selection" => options.selection_enabled = parse_flag(key, value)?,
                "type1" => options.type1_fields = split_list(value),
                _ => return Err(OptionsError::UnknownOption(key.to_string())),
            }
        }

        Ok(options)
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Whether the resolved field list is used for the SELECT clause.
    ///
    /// Configuring `select` fields turns selection on as well.
    pub fn selects_fields(&self) -> bool {
        self.selection_enabled || !self.select_fields.is_empty()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A present key enables the flag unless explicitly disabled.
fn parse_flag(key: &str, value: &str) -> Result<bool, OptionsError> {
    match value.to_lowercase().as_str() {
        "" | "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(OptionsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
