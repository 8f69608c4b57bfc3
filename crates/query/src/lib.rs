//! Query translation for parsed detection rules.
//!
//! Converts a rule's condition tree into a SQL-like query string:
//! - `escape`: rule wildcards to dialect wildcards
//! - `generate`: condition tree to WHERE text
//! - `fts`: rejection of full-text search
//! - `aggregate`: aggregation rewritten into a derived table
//! - `SqlDialect`: assembly of the final query

pub mod aggregate;
mod classify;
pub mod escape;
pub mod fts;
pub mod generate;
pub mod mapping;
pub mod options;

use sigsql_model::{ConditionGroup, Node, ParsedRule};
use thiserror::Error;

pub use aggregate::{translate_aggregation, AggregateFunction, Source};
pub use escape::{escape_value, has_wildcard};
pub use fts::has_bare_value;
pub use generate::{render_leaf, NodeGenerator};
pub use mapping::{FieldMapping, IdentityMapping, MappedField, MappingError, StaticFieldMap};
pub use options::{BackendOptions, OptionsError};

/// Time window placeholders, substituted by the caller.
pub const TIME_RANGE: &str = "Timestamp BETWEEN '<time_a>' AND '<time_b>'";

/// Source-type restriction applied to every non-aggregated query.
pub const TYPE_FILTER: &str = "type IN ('windows','agent_os')";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("List values must be strings or numbers")]
    InvalidListType,
    #[error("Unsupported {kind} value for field '{field}'")]
    UnsupportedValueType { field: String, kind: &'static str },
    #[error("For {0} aggregation a field name needs to be specified")]
    AggregationFieldMissing(String),
    #[error("{0} aggregation not implemented in SQL backend")]
    UnsupportedAggregation(String),
    #[error("Full-text search not implemented in SQL backend")]
    UnsupportedFullTextSearch,
    #[error(transparent)]
    FieldMapping(#[from] MappingError),
    #[error("Field mapping for '{0}' must yield a field name or a list of field names")]
    InvalidFieldMappingResult(String),
    #[error("Rule has no condition")]
    EmptyRule,
}

/// Trait for translating rules to backend-specific syntax.
pub trait QueryDialect {
    /// The output type (usually String or a structured query)
    type Output;

    /// Translate a parsed rule to this dialect
    fn translate(&self, rule: &ParsedRule) -> Result<Self::Output, QueryError>;
}

/// SQL dialect generator.
#[derive(Debug, Default)]
pub struct SqlDialect<M = IdentityMapping> {
    options: BackendOptions,
    mapping: M,
}

impl<M: FieldMapping> SqlDialect<M> {
    pub fn new(options: BackendOptions, mapping: M) -> Self {
        Self { options, mapping }
    }

    /// Translate every condition group of the rule, one query each.
    pub fn translate_all(&self, rule: &ParsedRule) -> Result<Vec<String>, QueryError> {
        if rule.conditions.is_empty() {
            return Err(QueryError::EmptyRule);
        }
        let fields = self.select_list(rule)?;
        rule.conditions
            .iter()
            .map(|group| self.translate_group(group, &fields))
            .collect()
    }

    /// Fields for the SELECT clause.
    ///
    /// Rule fields are resolved through the mapping, followed by the
    /// configured `select` fields. Unless selection is enabled, or nothing
    /// was resolved, every field is selected.
    pub fn select_list(&self, rule: &ParsedRule) -> Result<Vec<String>, QueryError> {
        let mut fields = Vec::new();
        for field in &rule.fields {
            fields.extend(mapping::resolve_names(&self.mapping, field, None)?);
        }
        fields.extend(self.options.select_fields.iter().cloned());

        if fields.is_empty() || !self.options.selects_fields() {
            return Ok(vec!["*".to_string()]);
        }
        Ok(fields)
    }

    fn translate_group(
        &self,
        group: &ConditionGroup,
        fields: &[String],
    ) -> Result<String, QueryError> {
        let condition = NodeGenerator::new(&self.mapping).generate(&group.search)?;

        if has_bare_value(&group.search) {
            return Err(QueryError::UnsupportedFullTextSearch);
        }

        let source = translate_aggregation(
            group.aggregation.as_ref(),
            &self.options.table,
            condition,
            &self.mapping,
        )?;

        let mut conjuncts = Vec::new();
        if let Source::Table { .. } = source {
            conjuncts.push(TIME_RANGE.to_string());
            conjuncts.push(TYPE_FILTER.to_string());
        }
        match source.where_clause() {
            // Keep a top-level OR from escaping the time and type filters.
            Some(condition) if !conjuncts.is_empty() && needs_grouping(&group.search) => {
                conjuncts.push(format!("({})", condition))
            }
            Some(condition) => conjuncts.push(condition.to_string()),
            None => {}
        }

        let mut sql = format!("SELECT {} FROM {}", fields.join(", "), source.from_clause());
        if !conjuncts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conjuncts.join(" AND "));
        }

        tracing::debug!(sql = %sql, "Generated query");
        Ok(sql)
    }
}

/// Whether the generated text can hold top-level AND/OR tokens.
fn needs_grouping(node: &Node) -> bool {
    matches!(node, Node::And(_) | Node::Or(_) | Node::Not(_))
}

impl<M: FieldMapping> QueryDialect for SqlDialect<M> {
    type Output = String;

    /// Only the query of the last condition group is returned; use
    /// `translate_all` to get one query per group.
    fn translate(&self, rule: &ParsedRule) -> Result<String, QueryError> {
        let mut queries = self.translate_all(rule)?;
        if queries.len() > 1 {
            tracing::warn!(
                title = rule.title.as_deref().unwrap_or_default(),
                discarded = queries.len() - 1,
                "Rule has several conditions, keeping the last one"
            );
        }
        queries.pop().ok_or(QueryError::EmptyRule)
    }
}
