//! Field name mapping.
//!
//! Rule field names are translated to backend column names by a
//! `FieldMapping`. A mapping may expand one rule field into several
//! backend fields.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sigsql_model::Leaf;
use thiserror::Error;

use crate::QueryError;

/// Errors raised by a field mapping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("No field mapping for '{0}'")]
    NotFound(String),
}

/// Result of resolving a rule field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappedField {
    Single(String),
    Multiple(Vec<String>),
}

impl MappedField {
    /// The backend names this field resolves to.
    pub fn names(&self) -> &[String] {
        match self {
            Self::Single(name) => std::slice::from_ref(name),
            Self::Multiple(names) => names,
        }
    }
}

/// Trait for field name translation.
pub trait FieldMapping {
    /// Resolve `field` to backend field name(s).
    ///
    /// `value` is the constrained value when the field appears in a
    /// field/value condition, `None` for aggregation and output fields.
    fn resolve(&self, field: &str, value: Option<&Leaf>) -> Result<MappedField, MappingError>;
}

impl<T: FieldMapping + ?Sized> FieldMapping for &T {
    fn resolve(&self, field: &str, value: Option<&Leaf>) -> Result<MappedField, MappingError> {
        (**self).resolve(field, value)
    }
}

/// Mapping that keeps every field name as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapping;

impl FieldMapping for IdentityMapping {
    fn resolve(&self, field: &str, _value: Option<&Leaf>) -> Result<MappedField, MappingError> {
        Ok(MappedField::Single(field.to_string()))
    }
}

/// Table-driven mapping, usually loaded from a JSON file:
///
/// ```json
/// { "strict": false, "fields": { "Image": "process_path", "User": ["user", "target_user"] } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticFieldMap {
    /// Fail on fields missing from the table instead of passing them through
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub fields: HashMap<String, MappedField>,
}

impl StaticFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with(mut self, field: impl Into<String>, mapped: MappedField) -> Self {
        self.fields.insert(field.into(), mapped);
        self
    }
}

impl FieldMapping for StaticFieldMap {
    fn resolve(&self, field: &str, _value: Option<&Leaf>) -> Result<MappedField, MappingError> {
        match self.fields.get(field) {
            Some(mapped) => Ok(mapped.clone()),
            None if self.strict => Err(MappingError::NotFound(field.to_string())),
            None => Ok(MappedField::Single(field.to_string())),
        }
    }
}

/// Resolve a field that may expand to several backend fields.
pub(crate) fn resolve_names<M: FieldMapping + ?Sized>(
    mapping: &M,
    field: &str,
    value: Option<&Leaf>,
) -> Result<Vec<String>, QueryError> {
    let names = mapping.resolve(field, value)?.names().to_vec();
    if names.is_empty() {
        return Err(QueryError::InvalidFieldMappingResult(field.to_string()));
    }
    Ok(names)
}

/// Resolve a field that must map to exactly one backend field.
pub(crate) fn resolve_single<M: FieldMapping + ?Sized>(
    mapping: &M,
    field: &str,
) -> Result<String, QueryError> {
    match mapping.resolve(field, None)? {
        MappedField::Single(name) => Ok(name),
        MappedField::Multiple(mut names) if names.len() == 1 => Ok(names.remove(0)),
        MappedField::Multiple(_) => Err(QueryError::InvalidFieldMappingResult(field.to_string())),
    }
}
