//! Aggregation translation.
//!
//! An aggregated condition is evaluated in two steps: a derived table
//! computes the aggregate over the matching rows, and the outer query
//! filters on its value.

use std::fmt;
use std::str::FromStr;

use sigsql_model::AggregationDescriptor;

use crate::mapping::{resolve_single, FieldMapping};
use crate::QueryError;

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl AggregateFunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for AggregateFunction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "COUNT" => Ok(Self::Count),
            "MIN" => Ok(Self::Min),
            "MAX" => Ok(Self::Max),
            "SUM" => Ok(Self::Sum),
            "AVG" => Ok(Self::Avg),
            _ => Err(QueryError::UnsupportedAggregation(s.to_string())),
        }
    }
}

/// Where the outer query reads from, and what it filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Plain table; the condition applies directly
    Table {
        table: String,
        condition: Option<String>,
    },
    /// Aggregating subquery with its threshold filter
    Derived { query: String, post_filter: String },
}

impl Source {
    /// Text following `FROM`.
    pub fn from_clause(&self) -> String {
        match self {
            Self::Table { table, .. } => table.clone(),
            Self::Derived { query, .. } => format!("({})", query),
        }
    }

    /// Condition for the outer `WHERE`.
    pub fn where_clause(&self) -> Option<&str> {
        match self {
            Self::Table { condition, .. } => condition.as_deref(),
            Self::Derived { post_filter, .. } => Some(post_filter),
        }
    }
}

/// Rewrite a condition and optional aggregation into a query source.
pub fn translate_aggregation<M: FieldMapping + ?Sized>(
    descriptor: Option<&AggregationDescriptor>,
    table: &str,
    condition: Option<String>,
    mapping: &M,
) -> Result<Source, QueryError> {
    let Some(agg) = descriptor else {
        return Ok(Source::Table {
            table: table.to_string(),
            condition,
        });
    };

    let function: AggregateFunction = agg.aggfunc.parse()?;

    let select = match (&agg.aggfield, function) {
        (Some(field), _) => format!("*,{}({}) AS agg", function, resolve_single(mapping, field)?),
        (None, AggregateFunction::Count) => format!("*,{}(*) AS agg", function),
        (None, _) => return Err(QueryError::AggregationFieldMissing(function.to_string())),
    };

    let mut query = format!("SELECT {} FROM {}", select, table);
    if let Some(condition) = condition {
        query.push_str(" WHERE ");
        query.push_str(&condition);
    }
    if let Some(group) = &agg.groupfield {
        query.push_str(" GROUP BY ");
        query.push_str(&resolve_single(mapping, group)?);
    }

    tracing::debug!(derived = %query, "Built aggregation subquery");

    Ok(Source::Derived {
        query,
        post_filter: format!("agg {} {}", agg.cond_op, agg.condition),
    })
}
